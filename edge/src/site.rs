//! The site's own asset helpers, unaware of any experiment.
//!
//! Everything here is emitted against the default origins. Scripts come
//! from the S3 CDN when one is configured, everything else from the
//! application CDN. An unset CDN falls back to root-relative URLs.

use crate::config::SiteConfig;
use cdn_experiment::{AssetHelper, ExperimentSettings, Markup, RewritableValue, ScriptSources};
use indexmap::IndexMap;
use serde_json::Value;

pub struct SiteAssets {
    cdn_url: String,
    s3_cdn_url: Option<String>,
    site: SiteConfig,
}

impl SiteAssets {
    pub fn new(settings: &ExperimentSettings, site: SiteConfig) -> Self {
        let non_empty = |url: &Option<String>| {
            url.as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
        };

        Self {
            cdn_url: non_empty(&settings.cdn_url).unwrap_or_default(),
            s3_cdn_url: non_empty(&settings.s3_cdn_url),
            site,
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn script_base(&self) -> &str {
        self.s3_cdn_url.as_deref().unwrap_or(&self.cdn_url)
    }

    fn link_tag(&self, href: &str, target: &str) -> String {
        format!(r#"<link href="{href}" media="all" rel="stylesheet" data-target="{target}">"#)
    }

    fn preload_tag(&self, href: &str) -> String {
        format!(r#"<link href="{href}" rel="preload" as="style">"#)
    }

    fn color_scheme_href(&self) -> Option<String> {
        self.site.color_scheme_id.map(|id| {
            format!(
                "{}/stylesheets/color_definitions_{id}.css",
                self.cdn_url
            )
        })
    }

    fn theme_script(&self, path: &str) -> RewritableValue {
        let tag = self
            .site
            .theme_id
            .map(|id| {
                format!(
                    r#"<script defer src="{}/theme-javascripts/{path}{id}.js"></script>"#,
                    self.cdn_url
                )
            })
            .unwrap_or_default();
        Markup::trusted(tag).into()
    }
}

impl AssetHelper for SiteAssets {
    fn script_asset_path(&self, script: &str) -> RewritableValue {
        Markup::plain(format!("{}/assets/{script}.js", self.script_base())).into()
    }

    fn stylesheet_preload_tag(&self, target: &str) -> RewritableValue {
        let href = format!("{}/stylesheets/{target}.css", self.cdn_url);
        Markup::trusted(self.preload_tag(&href)).into()
    }

    fn stylesheet_link_tag(&self, target: &str) -> RewritableValue {
        let href = format!("{}/stylesheets/{target}.css", self.cdn_url);
        Markup::trusted(self.link_tag(&href, target)).into()
    }

    fn theme_lookup(&self, field: &str) -> RewritableValue {
        let html = self.site.theme_fields.get(field).cloned().unwrap_or_default();
        Markup::trusted(html).into()
    }

    fn theme_translations_lookup(&self) -> RewritableValue {
        self.theme_script("translations/")
    }

    fn theme_js_lookup(&self) -> RewritableValue {
        self.theme_script("")
    }

    fn preload_color_scheme_stylesheets(&self) -> RewritableValue {
        let tag = self
            .color_scheme_href()
            .map(|href| self.preload_tag(&href))
            .unwrap_or_default();
        Markup::trusted(tag).into()
    }

    fn color_scheme_stylesheets(&self) -> RewritableValue {
        let tag = self
            .color_scheme_href()
            .map(|href| self.link_tag(&href, "color_definitions"))
            .unwrap_or_default();
        Markup::trusted(tag).into()
    }

    fn client_side_setup_data(&self) -> RewritableValue {
        let mut data = IndexMap::new();
        let text = |s: &str| RewritableValue::Text(Markup::plain(s));

        data.insert("cdn".to_string(), text(&self.cdn_url));
        data.insert("base-uri".to_string(), text(""));
        if let Some(s3_cdn_url) = &self.s3_cdn_url {
            data.insert("s3-cdn".to_string(), text(s3_cdn_url));
            data.insert(
                "s3-base-url".to_string(),
                text(&format!("{s3_cdn_url}/uploads")),
            );
        }
        data.insert(
            "theme-id".to_string(),
            RewritableValue::Opaque(self.site.theme_id.map(Value::from).unwrap_or(Value::Null)),
        );
        RewritableValue::Mapping(data)
    }
}

impl ScriptSources for SiteAssets {
    fn script_assets(&self) -> Vec<String> {
        let mut sources = Vec::new();
        if !self.script_base().is_empty() {
            sources.push(format!("{}/assets/", self.script_base()));
        }
        if !self.cdn_url.is_empty() && self.site.theme_id.is_some() {
            sources.push(format!("{}/theme-javascripts/", self.cdn_url));
        }
        sources
    }
}
