use crate::errors::{ExperimentError, Result};
use crate::origin::{Origin, OriginPool};
use serde::Deserialize;

/// Experiment settings as an operator writes them
///
/// Alternates are pipe-separated, e.g.
/// `app_cdns: "https://cdn-b.example.com|https://cdn-c.example.com"`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ExperimentSettings {
    /// Master switch. When off, the experiment does not touch any output.
    #[serde(default)]
    pub enabled: bool,
    /// Default application CDN origin, the one the host emits
    pub cdn_url: Option<String>,
    /// Default S3 CDN origin, the one the host emits
    pub s3_cdn_url: Option<String>,
    /// Alternate application CDN origins
    #[serde(default)]
    pub app_cdns: String,
    /// Alternate S3 CDN origins
    #[serde(default)]
    pub s3_cdns: String,
}

impl ExperimentSettings {
    /// Checks that an enabled experiment has both default origins and only valid URLs
    ///
    /// A disabled experiment is always valid; none of its settings are read.
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            self.app_pool()?;
            self.s3_pool()?;
        }
        Ok(())
    }

    pub fn app_pool(&self) -> Result<OriginPool> {
        build_pool("app", self.cdn_url.as_deref(), &self.app_cdns)
    }

    pub fn s3_pool(&self) -> Result<OriginPool> {
        build_pool("s3", self.s3_cdn_url.as_deref(), &self.s3_cdns)
    }

    /// Builds the per-request configuration
    pub fn to_config(&self) -> Result<ExperimentConfig> {
        if !self.enabled {
            return Ok(ExperimentConfig::disabled());
        }
        Ok(ExperimentConfig::new(self.app_pool()?, self.s3_pool()?))
    }
}

fn build_pool(name: &'static str, default: Option<&str>, alternates: &str) -> Result<OriginPool> {
    let default = default
        .filter(|d| !d.trim().is_empty())
        .ok_or(ExperimentError::MissingDefaultOrigin(name))?;

    let alternates = split_origins(alternates)
        .map(Origin::parse)
        .collect::<Result<Vec<_>>>()?;

    Ok(OriginPool::with_default(Origin::parse(default)?, alternates))
}

/// Splits a pipe-separated origin list, skipping blank segments
pub fn split_origins(list: &str) -> impl Iterator<Item = &str> {
    list.split('|').map(str::trim).filter(|s| !s.is_empty())
}

/// Immutable experiment configuration handed to the decorators for a request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExperimentConfig {
    pub enabled: bool,
    pub app_pool: OriginPool,
    pub s3_pool: OriginPool,
}

impl ExperimentConfig {
    pub fn new(app_pool: OriginPool, s3_pool: OriginPool) -> Self {
        Self {
            enabled: true,
            app_pool,
            s3_pool,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}
