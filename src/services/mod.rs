pub mod ai_service;
pub mod detector;
pub mod encoding;
pub mod groq; // Groq OpenAI-compatible client
pub mod resolver;

pub use ai_service::InferenceService;
pub use detector::VisionDetector;
pub use groq::GroqService;
pub use resolver::NutritionResolver;
