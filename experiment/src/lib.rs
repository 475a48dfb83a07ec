//! CDN A/B experiment core.
//!
//! Each client is assigned a bucket, deterministically from its IP address
//! or explicitly through the `_cdn_index` request parameter. Every URL the
//! host emits during that request is rewritten to the bucket's origin pair,
//! while policy allowlists are extended with every candidate origin.

pub mod assets;
pub mod augment;
pub mod bucket;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics_defs;
pub mod origin;
pub mod rewrite;

pub use assets::{
    AssetHelper, Assignment, ExperimentAssets, ExperimentScriptSources, ScriptSources,
};
pub use augment::augment;
pub use bucket::{
    ASSIGNMENT_ALGORITHM, AssignmentSource, BucketDraw, BucketIndex, BucketSelector,
    OVERRIDE_PARAM, SeededDraw,
};
pub use config::{ExperimentConfig, ExperimentSettings};
pub use context::RequestContext;
pub use errors::ExperimentError;
pub use origin::{Origin, OriginPool};
pub use rewrite::{Markup, RewritableValue, Substitution, rewrite};
