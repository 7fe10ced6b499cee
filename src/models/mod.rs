use serde::{Deserialize, Serialize};

use crate::error::{MalformedRow, SessionError};

pub const MIN_GRAMS: u32 = 1;
pub const MAX_GRAMS: u32 = 1000;
pub const DEFAULT_GRAMS: u32 = 100;

/// Raw bytes of one user-supplied photograph. Lives for a single detection.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A detected food name plus the user's pending corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    pub detected: String, // as returned by the vision model
    pub name: String,
    pub grams: u32,
}

impl DraftItem {
    pub fn new(detected: String) -> Self {
        Self {
            name: detected.clone(),
            detected,
            grams: DEFAULT_GRAMS,
        }
    }
}

/// A confirmed (name, weight) pair ready for nutrition lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub name: String,
    pub grams: u32,
}

impl FoodEntry {
    pub fn new(name: &str, grams: u32) -> Result<Self, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        Ok(Self {
            name: name.to_string(),
            grams: clamp_grams(grams),
        })
    }
}

/// Clamp a user-entered weight to the accepted range.
pub fn clamp_grams(grams: u32) -> u32 {
    grams.clamp(MIN_GRAMS, MAX_GRAMS)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Prose,
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Prose => "prose",
            OutputFormat::Table => "table",
        };
        write!(f, "{}", s)
    }
}

/// Nutrition facts for one entry, exactly as the text model produced them
/// (trimmed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionResult {
    pub text: String,
    pub format: OutputFormat,
}

impl NutritionResult {
    /// Split a table-shaped answer into columns. `None` for prose answers.
    pub fn row(&self) -> Option<Result<NutritionRow, MalformedRow>> {
        match self.format {
            OutputFormat::Table => Some(NutritionRow::parse(&self.text)),
            OutputFormat::Prose => None,
        }
    }
}

/// One `name | grams | kcal | protein_g | carb_g | fat_g | key_micronutrients` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRow {
    pub name: String,
    pub grams: String,
    pub kcal: String,
    pub protein_g: String,
    pub carb_g: String,
    pub fat_g: String,
    pub micronutrients: String,
}

impl NutritionRow {
    pub const COLUMNS: usize = 7;

    pub fn parse(text: &str) -> Result<Self, MalformedRow> {
        // Models sometimes add a header line before or a note after the row:
        // prefer the last line with the full column count, else the last piped one.
        let candidates: Vec<Vec<String>> = text
            .lines()
            .map(str::trim)
            .filter(|l| l.contains('|') && !is_separator_line(l))
            .map(split_cells)
            .collect();

        let fields = match candidates.iter().rposition(|cells| cells.len() == Self::COLUMNS) {
            Some(pos) => candidates[pos].clone(),
            None => candidates
                .last()
                .cloned()
                .unwrap_or_else(|| split_cells(text.trim())),
        };

        let [name, grams, kcal, protein_g, carb_g, fat_g, micronutrients]: [String; Self::COLUMNS] =
            fields.try_into().map_err(|fields: Vec<String>| MalformedRow {
                expected: Self::COLUMNS,
                found: fields.len(),
                raw: text.trim().to_string(),
            })?;

        Ok(Self {
            name,
            grams,
            kcal,
            protein_g,
            carb_g,
            fat_g,
            micronutrients,
        })
    }

    pub fn kcal_value(&self) -> Option<f64> {
        parse_amount(&self.kcal)
    }

    pub fn protein_value(&self) -> Option<f64> {
        parse_amount(&self.protein_g)
    }

    pub fn carb_value(&self) -> Option<f64> {
        parse_amount(&self.carb_g)
    }

    pub fn fat_value(&self) -> Option<f64> {
        parse_amount(&self.fat_g)
    }
}

fn split_cells(line: &str) -> Vec<String> {
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|f| f.trim().to_string()).collect()
}

fn is_separator_line(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Pull a number out of a cell such as `130 kcal` or `2,7 g`.
fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    cleaned.replace(',', ".").parse::<f64>().ok()
}

/// Result of resolving one draft item. A failure here never affects siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemOutcome {
    Resolved(NutritionResult),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub index: usize,
    pub name: String,
    pub grams: u32,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Resolved(_))
    }
}
