pub mod busy;
pub mod learner;
pub mod lenient;
pub mod transcript;

pub mod settings {
    use serde::{Deserialize, Serialize};

    pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
    pub const DEFAULT_MODEL: &str = "gemma3:4b";
    pub const DEFAULT_TEMPERATURE: f64 = 0.3;
    pub const MIN_TEMPERATURE: f64 = 0.1;
    pub const MAX_TEMPERATURE: f64 = 1.0;
    pub const DEFAULT_KNOWN_LANG: &str = "english";

    fn default_true() -> bool {
        true
    }

    /// Connection and sampling options for the Ollama generation endpoint
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct OllamaSettings {
        /// Full generation URL, e.g. "http://localhost:11434/api/generate"
        pub endpoint: String,
        pub model: String,
        pub temperature: f64,
        #[serde(default = "default_true")]
        pub stream_responses: bool,
        /// Upper bound for a single generation request
        pub request_timeout_secs: u64,
        /// Extra attempts after a retryable failure (0 disables retries)
        pub max_retries: u32,
    }

    impl Default for OllamaSettings {
        fn default() -> Self {
            Self {
                endpoint: DEFAULT_ENDPOINT.into(),
                model: DEFAULT_MODEL.into(),
                temperature: DEFAULT_TEMPERATURE,
                stream_responses: true,
                request_timeout_secs: 120,
                max_retries: 2,
            }
        }
    }

    impl OllamaSettings {
        /// Temperature actually sent to the model, always inside the accepted range.
        pub fn effective_temperature(&self) -> f64 {
            if self.temperature.is_finite() {
                clamp_temperature(self.temperature)
            } else {
                DEFAULT_TEMPERATURE
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AppSettings {
        pub ollama: OllamaSettings,
        /// The learner's own language, used as the other half of a lesson pair
        pub known_lang: String,
        /// Seconds between background reachability checks
        pub probe_interval_secs: u64,
        /// Optional exported transcript preferred over the stored one on startup
        pub chat_history_import: Option<String>,
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                ollama: OllamaSettings::default(),
                known_lang: DEFAULT_KNOWN_LANG.into(),
                probe_interval_secs: 60,
                chat_history_import: None,
            }
        }
    }

    pub fn clamp_temperature(value: f64) -> f64 {
        value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }

    /// Parse a user-entered temperature. Accepts a decimal comma ("0,7").
    /// Returns None for text that is not a number at all.
    pub fn parse_temperature(raw: &str) -> Option<f64> {
        let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
        if value.is_nan() {
            return None;
        }
        Some(clamp_temperature(value))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_temperature_accepts_comma() {
            assert_eq!(parse_temperature("0,7"), Some(0.7));
            assert_eq!(parse_temperature(" 0.4 "), Some(0.4));
        }

        #[test]
        fn test_parse_temperature_clamps() {
            assert_eq!(parse_temperature("0"), Some(MIN_TEMPERATURE));
            assert_eq!(parse_temperature("3.5"), Some(MAX_TEMPERATURE));
            assert_eq!(parse_temperature("warm"), None);
        }

        #[test]
        fn test_partial_settings_fill_defaults() {
            let settings: AppSettings =
                serde_json::from_str(r#"{"ollama": {"model": "llama3.2:3b"}}"#).unwrap();
            assert_eq!(settings.ollama.model, "llama3.2:3b");
            assert_eq!(settings.ollama.endpoint, DEFAULT_ENDPOINT);
            assert!(settings.ollama.stream_responses);
            assert_eq!(settings.known_lang, DEFAULT_KNOWN_LANG);
        }

        #[test]
        fn test_effective_temperature_guards_bad_values() {
            let mut ollama = OllamaSettings::default();
            ollama.temperature = 9.0;
            assert_eq!(ollama.effective_temperature(), MAX_TEMPERATURE);
            ollama.temperature = f64::NAN;
            assert_eq!(ollama.effective_temperature(), DEFAULT_TEMPERATURE);
        }
    }
}
