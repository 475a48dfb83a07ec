use cdn_experiment::{ExperimentError, ExperimentSettings};
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Page cache capacity cannot be 0")]
    InvalidCacheCapacity,

    #[error("CDN experiment: {0}")]
    Experiment(#[from] ExperimentError),
}

/// Edge service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for page requests
    pub listener: Listener,
    /// Admin listener for health and readiness endpoints
    pub admin_listener: Listener,
    /// Take the client IP from `X-Forwarded-For` instead of the socket peer.
    /// Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default)]
    pub cdn_experiment: ExperimentSettings,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.cache.validate()?;
        self.cdn_experiment.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// What the rendered pages reference
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Script bundles, loaded in order
    #[serde(default = "default_scripts")]
    pub scripts: Vec<String>,
    /// Stylesheet targets, e.g. `desktop`
    #[serde(default = "default_stylesheets")]
    pub stylesheets: Vec<String>,
    pub color_scheme_id: Option<u32>,
    pub theme_id: Option<u32>,
    /// Raw HTML per theme field (`head_tag`, `body_tag`, ...), emitted verbatim
    #[serde(default)]
    pub theme_fields: IndexMap<String, String>,
}

fn default_title() -> String {
    "Discourse".to_string()
}

fn default_scripts() -> Vec<String> {
    vec!["vendor".to_string(), "discourse".to_string()]
}

fn default_stylesheets() -> Vec<String> {
    vec!["desktop".to_string()]
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            scripts: default_scripts(),
            stylesheets: default_stylesheets(),
            color_scheme_id: None,
            theme_id: None,
            theme_fields: IndexMap::new(),
        }
    }
}

/// Anonymous page cache
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            ttl_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_capacity == 0 {
            return Err(ValidationError::InvalidCacheCapacity);
        }
        Ok(())
    }
}
