use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The chat completion backends reachable through the OpenAI-compatible client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub scenarios_path: PathBuf,
    pub max_turns: u32,
    pub max_tool_rounds: usize,
    pub pause_poll_interval: Duration,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub audio_dir: PathBuf,
    pub google_tts_api_key: Option<String>,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_optional<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        _ => Ok(None),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:5001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{other}' is not one of: openai, gemini"),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let scenarios_path = std::env::var("SCENARIOS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./scenarios"));

        let max_turns: u32 = parse_var("MAX_TURNS", 18)?;
        if max_turns == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_TURNS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_tool_rounds: usize = parse_var("MAX_TOOL_ROUNDS", 10)?;
        let pause_poll_ms: u64 = parse_var("PAUSE_POLL_MS", 500)?;
        if pause_poll_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "PAUSE_POLL_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        let temperature = parse_optional::<f32>("TEMPERATURE")?;
        let top_p = parse_optional::<f32>("TOP_P")?;

        let audio_dir = std::env::var("AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static/audio"));
        let google_tts_api_key = std::env::var("GOOGLE_TTS_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
            scenarios_path,
            max_turns,
            max_tool_rounds,
            pause_poll_interval: Duration::from_millis(pause_poll_ms),
            temperature,
            top_p,
            audio_dir,
            google_tts_api_key,
        })
    }

    /// Turn budget for one run: `requested` when given, `MAX_TURNS` otherwise.
    pub fn turn_budget(&self, requested: Option<u32>) -> Result<u32, ConfigError> {
        match requested {
            Some(0) => Err(ConfigError::InvalidValue(
                "--max-turns".to_string(),
                "must be at least 1".to_string(),
            )),
            Some(n) => Ok(n),
            None => Ok(self.max_turns),
        }
    }

    /// API key for the selected provider.
    pub fn provider_api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }

    /// Base URL of the provider's OpenAI-compatible endpoint.
    pub fn provider_api_base(&self) -> &'static str {
        match self.provider {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const VARS: &[&str] = &[
        "BIND_ADDRESS",
        "LLM_PROVIDER",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "CHAT_MODEL",
        "RUST_LOG",
        "SCENARIOS_PATH",
        "MAX_TURNS",
        "MAX_TOOL_ROUNDS",
        "PAUSE_POLL_MS",
        "TEMPERATURE",
        "TOP_P",
        "AUDIO_DIR",
        "GOOGLE_TTS_API_KEY",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env_openai() {
        unsafe {
            env::set_var("LLM_PROVIDER", "openai");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    fn expect_invalid(var: &str) {
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(name, _) => assert_eq!(name, var),
            other => panic!("Expected InvalidValue for {var}, got {other:?}"),
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();
        set_minimal_env_openai();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:5001");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.provider_api_key(), Some("test-openai-key"));
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.scenarios_path, PathBuf::from("./scenarios"));
        assert_eq!(config.max_turns, 18);
        assert_eq!(config.max_tool_rounds, 10);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(500));
        assert_eq!(config.temperature, None);
        assert_eq!(config.top_p, None);
        assert_eq!(config.audio_dir, PathBuf::from("static/audio"));
        assert_eq!(config.google_tts_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_gemini_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "Gemini");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.provider_api_key(), Some("test-gemini-key"));
        assert!(config.provider_api_base().contains("generativelanguage"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env_openai();
        unsafe {
            env::set_var("BIND_ADDRESS", "0.0.0.0:8080");
            env::set_var("CHAT_MODEL", "gpt-4.1-mini");
            env::set_var("RUST_LOG", "debug");
            env::set_var("SCENARIOS_PATH", "/srv/scenarios");
            env::set_var("MAX_TURNS", "6");
            env::set_var("MAX_TOOL_ROUNDS", "2");
            env::set_var("PAUSE_POLL_MS", "50");
            env::set_var("TEMPERATURE", "0.4");
            env::set_var("TOP_P", "0.9");
            env::set_var("AUDIO_DIR", "/tmp/audio");
            env::set_var("GOOGLE_TTS_API_KEY", "tts-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.chat_model, "gpt-4.1-mini");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.scenarios_path, PathBuf::from("/srv/scenarios"));
        assert_eq!(config.max_turns, 6);
        assert_eq!(config.max_tool_rounds, 2);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(50));
        assert_eq!(config.temperature, Some(0.4));
        assert_eq!(config.top_p, Some(0.9));
        assert_eq!(config.audio_dir, PathBuf::from("/tmp/audio"));
        assert_eq!(config.google_tts_api_key.as_deref(), Some("tts-key"));
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("BIND_ADDRESS", "not-a-valid-address") };
        expect_invalid("BIND_ADDRESS");

        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("RUST_LOG", "not-a-level") };
        expect_invalid("RUST_LOG");

        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("PAUSE_POLL_MS", "0") };
        expect_invalid("PAUSE_POLL_MS");

        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("MAX_TURNS", "many") };
        expect_invalid("MAX_TURNS");

        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("TEMPERATURE", "warm") };
        expect_invalid("TEMPERATURE");

        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "anthropic");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
        expect_invalid("LLM_PROVIDER");
    }

    #[test]
    #[serial]
    fn test_turn_budget_override() {
        clear_env_vars();
        set_minimal_env_openai();
        unsafe { env::set_var("MAX_TURNS", "6") };
        let config = Config::from_env().unwrap();

        assert_eq!(config.turn_budget(None).unwrap(), 6);
        assert_eq!(config.turn_budget(Some(3)).unwrap(), 3);
        match config.turn_budget(Some(0)).unwrap_err() {
            ConfigError::InvalidValue(name, _) => assert_eq!(name, "--max-turns"),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "openai");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "gemini");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("GEMINI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }
}
