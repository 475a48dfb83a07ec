use crate::config::SiteConfig;
use cdn_experiment::{AssetHelper, RewritableValue};
use std::fmt::Write;

/// Renders the application shell through `assets`
///
/// Every URL on the page comes from an [`AssetHelper`] call, so wrapping the
/// helper is enough to move the whole page onto another CDN.
pub fn render_page<A: AssetHelper>(assets: &A, site: &SiteConfig) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(&site.title));

    push_markup(&mut html, assets.preload_color_scheme_stylesheets());
    for target in &site.stylesheets {
        push_markup(&mut html, assets.stylesheet_preload_tag(target));
    }
    push_markup(&mut html, assets.color_scheme_stylesheets());
    for target in &site.stylesheets {
        push_markup(&mut html, assets.stylesheet_link_tag(target));
    }
    push_markup(&mut html, assets.theme_lookup("head_tag"));

    push_setup_data(&mut html, assets.client_side_setup_data());

    for script in &site.scripts {
        if let RewritableValue::Text(src) = assets.script_asset_path(script) {
            let _ = writeln!(
                html,
                "<script defer src=\"{}\"></script>",
                escape(src.as_str())
            );
        }
    }
    push_markup(&mut html, assets.theme_translations_lookup());
    push_markup(&mut html, assets.theme_js_lookup());

    html.push_str("</head>\n<body>\n");
    push_markup(&mut html, assets.theme_lookup("body_tag"));
    html.push_str("</body>\n</html>\n");
    html
}

// Trusted markup is emitted verbatim, plain text is escaped. Other shapes
// have no sensible HTML form and are dropped.
fn push_markup(html: &mut String, value: RewritableValue) {
    let RewritableValue::Text(markup) = value else {
        return;
    };
    if markup.as_str().is_empty() {
        return;
    }
    match markup.is_trusted() {
        true => html.push_str(markup.as_str()),
        false => html.push_str(&escape(markup.as_str())),
    }
    html.push('\n');
}

fn push_setup_data(html: &mut String, data: RewritableValue) {
    html.push_str("<meta id=\"data-discourse-setup\"");
    if let RewritableValue::Mapping(attributes) = data {
        for (name, value) in attributes {
            let value = match value {
                RewritableValue::Text(markup) => markup.into_string(),
                RewritableValue::Opaque(serde_json::Value::Null) => continue,
                other => serde_json::Value::from(other).to_string(),
            };
            let _ = write!(html, " data-{}=\"{}\"", escape(&name), escape(&value));
        }
    }
    html.push_str(">\n");
}

/// Escapes text for use in HTML content and double-quoted attributes
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
