use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Shared secret expected in the `x-api-token` header
    pub api_auth_token: String,

    /// Plex server base URL (e.g. http://192.168.1.10:32400)
    #[serde(default)]
    pub plex_url: Option<String>,

    #[serde(default)]
    pub plex_token: Option<String>,

    /// Name of the Plex library section holding the movies
    #[serde(default = "default_plex_library_name")]
    pub plex_library_name: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    /// Used to name the vector store holding the library corpus
    #[serde(default = "default_openai_assistant_name")]
    pub openai_assistant_name: String,

    #[serde(default)]
    pub enable_telegram: bool,

    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    #[serde(default)]
    pub enable_plex_playlist: bool,

    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    /// Serve the catalog from a local JSON file instead of Plex
    #[serde(default)]
    pub use_sample_data: bool,

    #[serde(default = "default_sample_data_path")]
    pub sample_data_path: PathBuf,

    /// Number of recently watched movies used as the history sample
    #[serde(default = "default_history_lookback")]
    pub history_lookback: usize,

    /// Default number of recommendations returned
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Timeout applied to every outbound HTTP call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional Redis mirror for the catalog snapshot
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_plex_library_name() -> String {
    "Movies".to_string()
}

fn default_openai_api_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_assistant_name() -> String {
    "Plex AI Curator".to_string()
}

fn default_playlist_name() -> String {
    "Recommended by AI".to_string()
}

fn default_sample_data_path() -> PathBuf {
    PathBuf::from("samples/movies_library.json")
}

fn default_history_lookback() -> usize {
    10
}

fn default_recommendation_count() -> usize {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_auth_token: String::new(),
            plex_url: None,
            plex_token: None,
            plex_library_name: default_plex_library_name(),
            openai_api_key: None,
            openai_api_url: default_openai_api_url(),
            openai_assistant_name: default_openai_assistant_name(),
            enable_telegram: false,
            telegram_bot_token: None,
            telegram_chat_id: None,
            enable_plex_playlist: false,
            playlist_name: default_playlist_name(),
            use_sample_data: false,
            sample_data_path: default_sample_data_path(),
            history_lookback: default_history_lookback(),
            recommendation_count: default_recommendation_count(),
            request_timeout_secs: default_request_timeout_secs(),
            redis_url: None,
            log_level: default_log_level(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    pub fn has_telegram(&self) -> bool {
        self.enable_telegram
            && self.telegram_bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.telegram_chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Sample data is used when requested explicitly or when Plex credentials are missing
    pub fn should_use_sample(&self) -> bool {
        let has_plex = self.plex_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.plex_token.as_deref().is_some_and(|t| !t.is_empty());
        self.use_sample_data || !has_plex
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
