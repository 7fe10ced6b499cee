use std::sync::Arc;

use super::ai_service::{CompletionRequest, InferenceService};
use super::encoding::to_jpeg_data_url;
use crate::config::SamplingParams;
use crate::error::DetectionError;
use crate::models::ImageInput;

const SYSTEM_PROMPT: &str = "Berikan daftar makanan yang terdeteksi dalam format sederhana. \
Langsung sebutkan makanannya saja tanpa kata pengantar atau kalimat tambahan. \
Contoh format jawaban yang diinginkan:\n\
makanan 1: nasi\n\
makanan 2: ayam goreng\n\
makanan 3: sayur bayam";

const USER_PROMPT: &str = "Apa saja makanan yang ada dalam gambar ini? \
Berikan dalam format sederhana, langsung sebutkan makanannya saja.";

/// Asks a vision model which foods are on a photo.
pub struct VisionDetector {
    inference: Arc<dyn InferenceService>,
    model: String,
    sampling: SamplingParams,
}

impl VisionDetector {
    pub fn new(inference: Arc<dyn InferenceService>, model: String, sampling: SamplingParams) -> Self {
        Self {
            inference,
            model,
            sampling,
        }
    }

    /// One vision call. Never retries; `DetectionError::Empty` only when the
    /// call succeeded but named nothing.
    pub async fn detect(&self, image: &ImageInput) -> Result<Vec<String>, DetectionError> {
        log::debug!("📸 Starting food detection on {} byte image", image.len());

        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: USER_PROMPT.to_string(),
            image_data_url: Some(to_jpeg_data_url(image)?),
            sampling: self.sampling,
        };

        let response = self.inference.complete(&request).await?;
        log::info!("💬 Vision model response: {}", response);

        let items = parse_detection(&response);
        if items.is_empty() {
            log::warn!("⚠️ Vision model named no food items");
            return Err(DetectionError::Empty);
        }

        log::info!("🍽️ Detected {} food item(s): {:?}", items.len(), items);
        Ok(items)
    }
}

/// Extract food names from a vision answer.
///
/// Lines shaped `label: value` yield their trimmed value; lines without a
/// colon are skipped. When the answer has no colon at all it is treated as
/// a comma list (one or more lines), so a bare single name comes back as a
/// one-element list. Blank fragments are dropped and order is preserved.
pub fn parse_detection(response: &str) -> Vec<String> {
    let fragments: Vec<&str> = if response.contains(':') {
        response
            .lines()
            .filter_map(|line| line.split_once(':').map(|(_, value)| value))
            .collect()
    } else {
        response.lines().flat_map(|line| line.split(',')).collect()
    };

    fragments
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::services::ai_service::mock::ScriptedInference;

    fn detector(inference: Arc<ScriptedInference>) -> VisionDetector {
        VisionDetector::new(inference, "vision-model".to_string(), SamplingParams::default())
    }

    fn jpeg_image() -> ImageInput {
        // SOI marker is enough for format sniffing; the bytes are passed through.
        ImageInput::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    #[test]
    fn test_parse_label_value_lines() {
        let response = "makanan 1: nasi\nmakanan 2:  ayam goreng \nmakanan 3: sayur bayam";
        assert_eq!(parse_detection(response), vec!["nasi", "ayam goreng", "sayur bayam"]);
    }

    #[test]
    fn test_parse_skips_empty_values_and_unlabelled_lines() {
        let response = "Berikut hasilnya\nmakanan 1: nasi\nmakanan 2:   \n\nmakanan 3: tempe";
        assert_eq!(parse_detection(response), vec!["nasi", "tempe"]);
    }

    #[test]
    fn test_parse_takes_text_after_first_colon() {
        assert_eq!(parse_detection("makanan 1: teh: manis"), vec!["teh: manis"]);
    }

    #[test]
    fn test_parse_comma_fallback() {
        assert_eq!(
            parse_detection("nasi, ayam goreng,, sambal ,"),
            vec!["nasi", "ayam goreng", "sambal"]
        );
    }

    #[test]
    fn test_parse_single_bare_name() {
        assert_eq!(parse_detection("  rendang \n"), vec!["rendang"]);
    }

    #[test]
    fn test_parse_blank_response() {
        assert!(parse_detection("").is_empty());
        assert!(parse_detection(" \n\t \n").is_empty());
        assert!(parse_detection(" , ,").is_empty());
    }

    #[tokio::test]
    async fn test_detect_sends_image_and_parses() {
        let inference = Arc::new(
            ScriptedInference::new().otherwise(Ok("makanan 1: nasi\nmakanan 2: ayam goreng")),
        );

        let items = detector(inference.clone()).detect(&jpeg_image()).await.unwrap();
        assert_eq!(items, vec!["nasi", "ayam goreng"]);

        let calls = inference.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "vision-model");
        assert!(calls[0]
            .image_data_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_detect_empty_answer_is_detection_empty() {
        let inference = Arc::new(ScriptedInference::new().otherwise(Ok("   ")));
        let err = detector(inference).detect(&jpeg_image()).await.unwrap_err();
        assert_eq!(err, DetectionError::Empty);
    }

    #[tokio::test]
    async fn test_detect_provider_failure_is_not_empty() {
        let inference = Arc::new(ScriptedInference::new().otherwise(Err(ProviderError::Timeout)));
        let err = detector(inference).detect(&jpeg_image()).await.unwrap_err();
        assert_eq!(err, DetectionError::Provider(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_detect_rejects_undecodable_image_without_calling_provider() {
        let inference = Arc::new(ScriptedInference::new().otherwise(Ok("makanan 1: nasi")));
        let err = detector(inference.clone())
            .detect(&ImageInput::new(b"GIF?".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::InvalidImage(_)));
        assert!(inference.calls().is_empty());
    }
}
