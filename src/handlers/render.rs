use crate::models::{ItemOutcome, ItemReport, NutritionRow, OutputFormat};

/// Render analysis results as markdown for display.
pub fn render_reports(reports: &[ItemReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Prose => render_prose(reports),
        OutputFormat::Table => render_table(reports),
    }
}

fn render_prose(reports: &[ItemReport]) -> String {
    reports
        .iter()
        .map(|report| match &report.outcome {
            ItemOutcome::Resolved(result) => {
                format!("### 💠 {} ({}g)\n\n{}\n", report.name, report.grams, result.text)
            }
            ItemOutcome::Failed { error } => failure_section(report, error),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn failure_section(report: &ItemReport, error: &str) -> String {
    format!(
        "### ❌ Gagal menganalisis {} ({}g)\n\nDetail error: {}\n",
        report.name, report.grams, error
    )
}

#[derive(Default)]
struct Totals {
    grams: u64,
    kcal: f64,
    protein: f64,
    carb: f64,
    fat: f64,
}

impl Totals {
    fn add(&mut self, grams: u32, row: &NutritionRow) {
        self.grams += u64::from(grams);
        self.kcal += row.kcal_value().unwrap_or(0.0);
        self.protein += row.protein_value().unwrap_or(0.0);
        self.carb += row.carb_value().unwrap_or(0.0);
        self.fat += row.fat_value().unwrap_or(0.0);
    }
}

fn render_table(reports: &[ItemReport]) -> String {
    let mut rows = Vec::new();
    let mut notes = Vec::new();
    let mut totals = Totals::default();

    for report in reports {
        match &report.outcome {
            ItemOutcome::Resolved(result) => match result.row() {
                Some(Ok(row)) => {
                    totals.add(report.grams, &row);
                    rows.push(format!(
                        "| {} | {} | {} | {} | {} | {} | {} |",
                        row.name, row.grams, row.kcal, row.protein_g, row.carb_g, row.fat_g, row.micronutrients
                    ));
                }
                Some(Err(malformed)) => {
                    log::warn!("⚠️ Unexpected table shape for {}: {}", report.name, malformed);
                    notes.push(format!("### 💠 {} ({}g)\n\n{}\n", report.name, report.grams, malformed.raw));
                }
                // Prose answer inside a table view: show it verbatim.
                None => notes.push(format!("### 💠 {} ({}g)\n\n{}\n", report.name, report.grams, result.text)),
            },
            ItemOutcome::Failed { error } => notes.push(failure_section(report, error)),
        }
    }

    let mut out = String::new();
    if !rows.is_empty() {
        out.push_str("| Makanan | Berat (g) | Kalori (kkal) | Protein (g) | Karbohidrat (g) | Lemak (g) | Mikronutrien |\n");
        out.push_str("|---|---|---|---|---|---|---|\n");
        for row in &rows {
            out.push_str(row);
            out.push('\n');
        }
        out.push_str(&format!(
            "| **Total** | {} | {:.1} | {:.1} | {:.1} | {:.1} | |\n",
            totals.grams, totals.kcal, totals.protein, totals.carb, totals.fat
        ));
    }

    for note in notes {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&note);
    }

    out
}
