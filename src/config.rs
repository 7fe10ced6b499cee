use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "GROQ_API_KEY";
const DEFAULT_SECRETS_PATH: &str = "secrets.toml";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_VISION_MODEL: &str = "llama-3.2-90b-vision-preview";
const DEFAULT_TEXT_MODEL: &str = "llama-3.2-90b-text-preview";

/// Sampling parameters shared by both inference stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub request_timeout: Duration,
    pub resolve_concurrency: usize,
    pub max_upload_bytes: usize,
    pub max_sessions: usize,
    pub bind_addr: String,
    pub sampling: SamplingParams,
}

// Hand-written so the credential never reaches the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("vision_model", &self.vision_model)
            .field("text_model", &self.text_model)
            .field("request_timeout", &self.request_timeout)
            .field("resolve_concurrency", &self.resolve_concurrency)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_sessions", &self.max_sessions)
            .field("bind_addr", &self.bind_addr)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl Config {
    /// Load configuration from the secrets file and the process environment.
    ///
    /// The API key is taken from the secrets file first and falls back to
    /// `GROQ_API_KEY` in the environment. Call after `dotenv()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let secrets_path = env
            .get("SECRETS_PATH")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SECRETS_PATH.to_string());
        let secrets = load_secrets(Path::new(&secrets_path))?;

        Self::from_sources(&secrets, &env)
    }

    /// Build a configuration from explicit maps (useful for testing).
    pub fn from_sources(
        secrets: &HashMap<String, String>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        // A blank entry counts as absent, so a blank secret still falls back to env.
        let non_blank = |source: &HashMap<String, String>| {
            source
                .get(API_KEY_VAR)
                .map(|key| key.trim())
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        };
        let api_key = non_blank(secrets)
            .or_else(|| non_blank(env))
            .ok_or(ConfigError::MissingApiKey)?;

        let text = |key: &str, default: &str| {
            env.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let timeout_secs: u64 = parse_positive(env, "REQUEST_TIMEOUT_SECS", 60)?;

        Ok(Self {
            api_key,
            base_url: text("INFERENCE_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            vision_model: text("VISION_MODEL", DEFAULT_VISION_MODEL),
            text_model: text("TEXT_MODEL", DEFAULT_TEXT_MODEL),
            request_timeout: Duration::from_secs(timeout_secs),
            resolve_concurrency: parse_positive(env, "RESOLVE_CONCURRENCY", 1)?,
            max_upload_bytes: parse_positive(env, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_sessions: parse_positive(env, "MAX_SESSIONS", 256)?,
            bind_addr: text("BIND_ADDR", "0.0.0.0:8080"),
            sampling: SamplingParams::default(),
        })
    }
}

fn parse_positive<T>(env: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Read top-level string keys from a TOML secrets file. A missing file
/// yields an empty map.
fn load_secrets(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        log::debug!("No secrets file at {}, using environment only", path.display());
        return Ok(HashMap::new());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Secrets(format!("{}: {}", path.display(), e)))?;
    parse_secrets(&contents)
}

fn parse_secrets(contents: &str) -> Result<HashMap<String, String>, ConfigError> {
    let table: toml::Table =
        toml::from_str(contents).map_err(|e| ConfigError::Secrets(e.to_string()))?;

    Ok(table
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect())
}
