use crate::providers::{deepgram, speechmatics, ProviderKind};
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub cors: CorsConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticFilesConfig {
    /// Directory served under `/static`, if it exists
    pub dir: Option<String>,
}

/// Vendor endpoints, one per known provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub deepgram: EndpointConfig,
    pub speechmatics: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
}

impl ProvidersConfig {
    pub fn endpoint(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Deepgram => &self.deepgram.url,
            ProviderKind::Speechmatics => &self.speechmatics.url,
        }
    }
}

impl Config {
    /// Load built-in defaults, then `path` (any format `config` knows, optional),
    /// then `STT_COMPARE__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "stt-compare")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8000)?
            .set_default(
                "cors.allowed_origins",
                vec!["http://localhost:5173", "http://127.0.0.1:5173"],
            )?
            .set_default("providers.deepgram.url", deepgram::DEFAULT_URL)?
            .set_default("providers.speechmatics.url", speechmatics::DEFAULT_URL)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("STT_COMPARE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
