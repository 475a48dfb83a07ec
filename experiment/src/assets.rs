//! Decorators over the host's URL-producing helpers.
//!
//! The host exposes its asset helpers through [`AssetHelper`] and its
//! script policy sources through [`ScriptSources`]. Wrapping them in
//! [`ExperimentAssets`] and [`ExperimentScriptSources`] applies the
//! experiment without the host knowing about it:
//!
//! ```text
//! host page renderer
//!   └─ ExperimentAssets ── rewrite(result, assigned pair) ──┐
//!        └─ host AssetHelper                                │  one bucket per
//!   └─ ExperimentScriptSources ── augment(result, pools)    │  RequestContext
//!        └─ host ScriptSources                              ┘
//! ```

use crate::augment::augment;
use crate::bucket::{BucketDraw, BucketIndex, BucketSelector};
use crate::config::ExperimentConfig;
use crate::context::RequestContext;
use crate::errors::{ExperimentError, Result};
use crate::origin::Origin;
use crate::rewrite::{RewritableValue, Substitution, rewrite};

/// Host helpers whose output may reference the default CDN origins
pub trait AssetHelper {
    /// URL of a compiled script bundle
    fn script_asset_path(&self, script: &str) -> RewritableValue;

    fn stylesheet_preload_tag(&self, target: &str) -> RewritableValue;

    fn stylesheet_link_tag(&self, target: &str) -> RewritableValue;

    /// A rendered theme field, e.g. `head_tag`
    fn theme_lookup(&self, field: &str) -> RewritableValue;

    fn theme_translations_lookup(&self) -> RewritableValue;

    fn theme_js_lookup(&self) -> RewritableValue;

    fn preload_color_scheme_stylesheets(&self) -> RewritableValue;

    fn color_scheme_stylesheets(&self) -> RewritableValue;

    /// Setup data handed to the client application
    fn client_side_setup_data(&self) -> RewritableValue;
}

impl<T: AssetHelper + ?Sized> AssetHelper for &T {
    fn script_asset_path(&self, script: &str) -> RewritableValue {
        (**self).script_asset_path(script)
    }

    fn stylesheet_preload_tag(&self, target: &str) -> RewritableValue {
        (**self).stylesheet_preload_tag(target)
    }

    fn stylesheet_link_tag(&self, target: &str) -> RewritableValue {
        (**self).stylesheet_link_tag(target)
    }

    fn theme_lookup(&self, field: &str) -> RewritableValue {
        (**self).theme_lookup(field)
    }

    fn theme_translations_lookup(&self) -> RewritableValue {
        (**self).theme_translations_lookup()
    }

    fn theme_js_lookup(&self) -> RewritableValue {
        (**self).theme_js_lookup()
    }

    fn preload_color_scheme_stylesheets(&self) -> RewritableValue {
        (**self).preload_color_scheme_stylesheets()
    }

    fn color_scheme_stylesheets(&self) -> RewritableValue {
        (**self).color_scheme_stylesheets()
    }

    fn client_side_setup_data(&self) -> RewritableValue {
        (**self).client_side_setup_data()
    }
}

/// Host helper listing the script sources a security policy must allow
pub trait ScriptSources {
    fn script_assets(&self) -> Vec<String>;
}

impl<T: ScriptSources + ?Sized> ScriptSources for &T {
    fn script_assets(&self) -> Vec<String> {
        (**self).script_assets()
    }
}

/// The origin pair a request was assigned
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assignment<'a> {
    pub bucket: BucketIndex,
    pub default_app_origin: &'a Origin,
    pub app_origin: &'a Origin,
    pub default_s3_origin: &'a Origin,
    pub s3_origin: &'a Origin,
}

impl<'a> Assignment<'a> {
    /// Resolves the bucket for `ctx` (memoizing it) and looks up both origins
    pub fn resolve<D: BucketDraw>(
        config: &'a ExperimentConfig,
        ctx: &RequestContext,
        selector: &BucketSelector<D>,
    ) -> Result<Self> {
        let (app, s3) = (&config.app_pool, &config.s3_pool);
        let bucket = selector.resolve_index(ctx, app.len(), s3.len())?;

        let lookup = |index: usize| -> Option<Assignment<'a>> {
            Some(Assignment {
                bucket,
                default_app_origin: app.get(0)?,
                app_origin: app.get(index)?,
                default_s3_origin: s3.get(0)?,
                s3_origin: s3.get(index)?,
            })
        };

        lookup(bucket.get()).ok_or(ExperimentError::EmptyOriginPool {
            app: app.len(),
            s3: s3.len(),
        })
    }

    fn apply(&self, value: RewritableValue) -> RewritableValue {
        if self.bucket.is_default() {
            return value;
        }
        rewrite(
            value,
            Substitution::new(self.default_app_origin.as_str(), self.app_origin.as_str()),
            Substitution::new(self.default_s3_origin.as_str(), self.s3_origin.as_str()),
        )
    }
}

/// Rewrites an [`AssetHelper`]'s output to the origins assigned to one request
pub struct ExperimentAssets<'a, H> {
    inner: H,
    assignment: Option<Assignment<'a>>,
}

impl<'a, H: AssetHelper> ExperimentAssets<'a, H> {
    pub fn new(inner: H, config: &'a ExperimentConfig, ctx: &RequestContext) -> Result<Self> {
        Self::with_selector(inner, config, ctx, &BucketSelector::new())
    }

    /// Like [`ExperimentAssets::new`], with a custom bucket selector
    ///
    /// Disabled experiments resolve nothing and leave `ctx` untouched.
    pub fn with_selector<D: BucketDraw>(
        inner: H,
        config: &'a ExperimentConfig,
        ctx: &RequestContext,
        selector: &BucketSelector<D>,
    ) -> Result<Self> {
        let assignment = match config.enabled {
            true => Some(Assignment::resolve(config, ctx, selector)?),
            false => None,
        };
        Ok(Self { inner, assignment })
    }

    pub fn assignment(&self) -> Option<&Assignment<'a>> {
        self.assignment.as_ref()
    }

    fn apply(&self, value: RewritableValue) -> RewritableValue {
        match &self.assignment {
            Some(assignment) => assignment.apply(value),
            None => value,
        }
    }
}

impl<H: AssetHelper> AssetHelper for ExperimentAssets<'_, H> {
    fn script_asset_path(&self, script: &str) -> RewritableValue {
        self.apply(self.inner.script_asset_path(script))
    }

    fn stylesheet_preload_tag(&self, target: &str) -> RewritableValue {
        self.apply(self.inner.stylesheet_preload_tag(target))
    }

    fn stylesheet_link_tag(&self, target: &str) -> RewritableValue {
        self.apply(self.inner.stylesheet_link_tag(target))
    }

    fn theme_lookup(&self, field: &str) -> RewritableValue {
        self.apply(self.inner.theme_lookup(field))
    }

    fn theme_translations_lookup(&self) -> RewritableValue {
        self.apply(self.inner.theme_translations_lookup())
    }

    fn theme_js_lookup(&self) -> RewritableValue {
        self.apply(self.inner.theme_js_lookup())
    }

    fn preload_color_scheme_stylesheets(&self) -> RewritableValue {
        self.apply(self.inner.preload_color_scheme_stylesheets())
    }

    fn color_scheme_stylesheets(&self) -> RewritableValue {
        self.apply(self.inner.color_scheme_stylesheets())
    }

    fn client_side_setup_data(&self) -> RewritableValue {
        self.apply(self.inner.client_side_setup_data())
    }
}

/// Adds every alternate origin to a [`ScriptSources`] list
pub struct ExperimentScriptSources<'a, S> {
    inner: S,
    config: &'a ExperimentConfig,
}

impl<'a, S: ScriptSources> ExperimentScriptSources<'a, S> {
    pub fn new(inner: S, config: &'a ExperimentConfig) -> Self {
        Self { inner, config }
    }
}

impl<S: ScriptSources> ScriptSources for ExperimentScriptSources<'_, S> {
    fn script_assets(&self) -> Vec<String> {
        let entries = self.inner.script_assets();
        if !self.config.enabled {
            return entries;
        }
        augment(entries, &self.config.app_pool, &self.config.s3_pool)
    }
}
