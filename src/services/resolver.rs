use std::sync::Arc;

use super::ai_service::{CompletionRequest, InferenceService};
use crate::config::SamplingParams;
use crate::error::ProviderError;
use crate::models::{NutritionResult, OutputFormat};

const SYSTEM_PROMPT: &str = "Anda adalah ahli gizi. Berikan informasi nutrisi secara langsung dan akurat \
sesuai format yang diminta, tanpa tambahan kalimat atau penjelasan yang tidak perlu.";

/// Asks a text model for the nutrition facts of one food entry.
pub struct NutritionResolver {
    inference: Arc<dyn InferenceService>,
    model: String,
    sampling: SamplingParams,
}

impl NutritionResolver {
    pub fn new(inference: Arc<dyn InferenceService>, model: String, sampling: SamplingParams) -> Self {
        Self {
            inference,
            model,
            sampling,
        }
    }

    /// One streamed call, returned only once fully assembled. `grams` is
    /// passed through unchecked; range limits belong to the caller.
    pub async fn resolve(
        &self,
        food_name: &str,
        grams: u32,
        format: OutputFormat,
    ) -> Result<NutritionResult, ProviderError> {
        log::info!("🤖 Requesting nutrition facts for {}g {} ({})", grams, food_name, format);

        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_prompt(food_name, grams, format),
            image_data_url: None,
            sampling: self.sampling,
        };

        let text = self.inference.complete_streamed(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::Empty);
        }

        log::info!("✅ Received nutrition facts for {} ({} chars)", food_name, text.len());
        Ok(NutritionResult {
            text: text.to_string(),
            format,
        })
    }
}

fn build_prompt(food_name: &str, grams: u32, format: OutputFormat) -> String {
    match format {
        OutputFormat::Prose => format!(
            "Berikan analisis nutrisi untuk {}g {}.\n\n\
             Format yang diinginkan:\n\
             1. Kalori: [jumlah] kkal\n\
             2. Protein: [jumlah]g\n\
             3. Lemak: [jumlah]g\n\
             4. Karbohidrat: [jumlah]g\n\
             5. Vitamin dan mineral utama\n\n\
             Berikan dalam format yang singkat dan jelas dalam Bahasa Indonesia.",
            grams, food_name
        ),
        OutputFormat::Table => format!(
            "Berikan analisis nutrisi untuk {}g {}.\n\n\
             Jawab dengan TEPAT SATU baris, tanpa judul kolom, dengan format:\n\
             nama | berat_g | kalori_kkal | protein_g | karbohidrat_g | lemak_g | mikronutrien utama\n\n\
             Contoh: nasi | 100 | 130 | 2.7 | 28.6 | 0.3 | Fosfor, Mangan, Vitamin B6",
            grams, food_name
        ),
    }
}
