//! CDN origins and the ordered pools they are drawn from.
//!
//! A pool always lists the default origin first. Alternates follow in
//! configuration order, and that order is what bucket indexes refer to:
//!
//! ```text
//! app pool: [https://cdn.example.com, https://cdn-b.example.com, https://cdn-c.example.com]
//!  s3 pool: [https://s3.example.com,  https://s3-b.example.com]
//!
//! bucket 0 -> (cdn,   s3)    default pair
//! bucket 1 -> (cdn-b, s3-b)  first alternate pair
//! ```
//!
//! `cdn-c` is unreachable until the s3 pool grows a third entry, since a
//! bucket must be valid in both pools.

use crate::errors::{ExperimentError, Result};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Base URL of a CDN endpoint
///
/// The configured text is kept verbatim. Rewriting matches on the exact
/// string, so normalizing it (e.g. appending a trailing slash) would stop
/// matches against URLs the host emits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin(Arc<str>);

impl Origin {
    /// Parses a configured origin, rejecting empty and non-absolute URLs
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ExperimentError::InvalidOrigin {
                origin: raw.to_string(),
                reason: "origin is empty".to_string(),
            });
        }

        Url::parse(raw).map_err(|e| ExperimentError::InvalidOrigin {
            origin: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self(raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Origin {
    fn from(raw: &str) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered origins for one asset flavor, default first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OriginPool {
    origins: Vec<Origin>,
}

impl OriginPool {
    pub fn new(origins: Vec<Origin>) -> Self {
        Self { origins }
    }

    /// Builds a pool from a default origin followed by its alternates
    pub fn with_default(default: Origin, alternates: impl IntoIterator<Item = Origin>) -> Self {
        let mut origins = vec![default];
        origins.extend(alternates);
        Self { origins }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// The baseline origin the host emits, if the pool has one
    pub fn default_origin(&self) -> Option<&Origin> {
        self.origins.first()
    }

    /// Experimental origins, in configuration order
    pub fn alternates(&self) -> &[Origin] {
        self.origins.get(1..).unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&Origin> {
        self.origins.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Origin> {
        self.origins.iter()
    }
}
