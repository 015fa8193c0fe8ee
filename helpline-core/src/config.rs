use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct HelplineConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Install the role gate in front of the dashboard routes
    pub enforce_roles: bool,
}

/// Development-only signing secret shipped in the defaults and the sample config.
pub const DEFAULT_JWT_SECRET: &str = "change-me-helpline-dev-secret";

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            enforce_roles: false,
        }
    }
}

/// ElevenLabs Conversational AI settings. Both values are optional so the
/// dashboard API can run without a voice agent configured.
#[derive(Debug, Deserialize, Clone)]
pub struct VoiceConfig {
    pub api_key: Option<String>,
    pub agent_id: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_id: None,
            base_url: "https://api.elevenlabs.io".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    pub sla_threshold_secs: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sla_threshold_secs: 300,
        }
    }
}

impl HelplineConfig {
    /// Load from a TOML file, then apply `HELPLINE__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("HELPLINE").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
