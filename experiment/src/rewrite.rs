//! Rewriting of emitted URLs to the origins a request was assigned.

use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Cow;

/// A string produced by the host, with its markup trust flag
///
/// `trusted` marks text the host already considers safe to emit as markup
/// (e.g. a rendered `<script>` tag). Rewriting never changes the flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Markup {
    content: String,
    trusted: bool,
}

impl Markup {
    /// Text that still needs escaping before it is emitted as markup
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            trusted: false,
        }
    }

    /// Text that is safe to emit as markup verbatim
    pub fn trusted(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            trusted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

/// Any value a host helper can produce
#[derive(Clone, Debug, PartialEq)]
pub enum RewritableValue {
    Text(Markup),
    Mapping(IndexMap<String, RewritableValue>),
    /// Anything else. Passed through untouched, arrays included.
    Opaque(Value),
}

impl RewritableValue {
    pub fn as_text(&self) -> Option<&Markup> {
        match self {
            RewritableValue::Text(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, RewritableValue>> {
        match self {
            RewritableValue::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}

impl From<Markup> for RewritableValue {
    fn from(markup: Markup) -> Self {
        RewritableValue::Text(markup)
    }
}

impl From<Value> for RewritableValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RewritableValue::Text(Markup::plain(s)),
            Value::Object(map) => RewritableValue::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, RewritableValue::from(value)))
                    .collect(),
            ),
            other => RewritableValue::Opaque(other),
        }
    }
}

impl From<RewritableValue> for Value {
    fn from(value: RewritableValue) -> Self {
        match value {
            RewritableValue::Text(markup) => Value::String(markup.into_string()),
            RewritableValue::Mapping(mapping) => Value::Object(
                mapping
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
            RewritableValue::Opaque(value) => value,
        }
    }
}

/// Default origin and the origin it is rewritten to, for one pool
#[derive(Clone, Copy, Debug)]
pub struct Substitution<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl<'a> Substitution<'a> {
    pub fn new(from: &'a str, to: &'a str) -> Self {
        Self { from, to }
    }

    /// Whether applying this substitution can change anything
    fn is_noop(&self) -> bool {
        self.from.is_empty() || self.from == self.to
    }

    fn apply<'s>(&self, text: Cow<'s, str>) -> Cow<'s, str> {
        if self.is_noop() || !text.contains(self.from) {
            return text;
        }
        Cow::Owned(text.replace(self.from, self.to))
    }
}

/// Rewrites every default app and s3 origin in `value` to the chosen ones
///
/// The app substitution is applied first, then the s3 one. Mapping keys are
/// kept as-is and in order, and values of any other shape are returned
/// unchanged.
pub fn rewrite(
    value: RewritableValue,
    app: Substitution<'_>,
    s3: Substitution<'_>,
) -> RewritableValue {
    match value {
        RewritableValue::Text(markup) => RewritableValue::Text(rewrite_markup(markup, app, s3)),
        RewritableValue::Mapping(mapping) => RewritableValue::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| (key, rewrite(value, app, s3)))
                .collect(),
        ),
        opaque @ RewritableValue::Opaque(_) => opaque,
    }
}

fn rewrite_markup(markup: Markup, app: Substitution<'_>, s3: Substitution<'_>) -> Markup {
    let rewritten = s3.apply(app.apply(Cow::Borrowed(markup.as_str())));
    match rewritten {
        Cow::Borrowed(_) => markup,
        Cow::Owned(content) => Markup {
            content,
            trusted: markup.trusted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const APP_FROM: &str = "https://a.example.com";
    const APP_TO: &str = "https://b.example.com";
    const S3_FROM: &str = "https://s3-a.example.com";
    const S3_TO: &str = "https://s3-b.example.com";

    fn rewrite_default(value: RewritableValue) -> RewritableValue {
        rewrite(
            value,
            Substitution::new(APP_FROM, APP_TO),
            Substitution::new(S3_FROM, S3_TO),
        )
    }

    #[test]
    fn test_rewrite_string() {
        let value = Markup::plain("https://a.example.com/assets/x.js").into();
        assert_eq!(
            rewrite_default(value),
            Markup::plain("https://b.example.com/assets/x.js").into()
        );

        let value = Markup::plain(
            "https://a.example.com/one.css https://s3-a.example.com/two.js https://a.example.com/three.css",
        )
        .into();
        assert_eq!(
            rewrite_default(value),
            Markup::plain(
                "https://b.example.com/one.css https://s3-b.example.com/two.js https://b.example.com/three.css"
            )
            .into()
        );
    }

    #[test]
    fn test_rewrite_mapping() {
        let value = RewritableValue::from(json!({
            "cdn": "https://a.example.com",
            "other": 42,
            "nested": {"s3_cdn": "https://s3-a.example.com", "list": ["https://a.example.com"]},
        }));

        let rewritten = rewrite_default(value);
        assert_eq!(
            Value::from(rewritten.clone()),
            json!({
                "cdn": "https://b.example.com",
                "other": 42,
                "nested": {"s3_cdn": "https://s3-b.example.com", "list": ["https://a.example.com"]},
            })
        );

        let keys: Vec<_> = rewritten.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["cdn", "other", "nested"]);
    }

    #[test]
    fn test_keys_are_not_rewritten() {
        let mut mapping = IndexMap::new();
        mapping.insert(
            APP_FROM.to_string(),
            RewritableValue::Text(Markup::plain(APP_FROM)),
        );
        let rewritten = rewrite_default(RewritableValue::Mapping(mapping));
        let (key, value) = rewritten.as_mapping().unwrap().first().unwrap();
        assert_eq!(key, APP_FROM);
        assert_eq!(value.as_text().unwrap().as_str(), APP_TO);
    }

    #[test]
    fn test_trust_flag_is_preserved() {
        let trusted = Markup::trusted(r#"<script src="https://a.example.com/x.js"></script>"#);
        let rewritten = rewrite_default(trusted.into());
        let markup = rewritten.as_text().unwrap();
        assert!(markup.is_trusted());
        assert_eq!(
            markup.as_str(),
            r#"<script src="https://b.example.com/x.js"></script>"#
        );

        let plain = Markup::plain("https://a.example.com/x.js");
        let rewritten = rewrite_default(plain.into());
        assert!(!rewritten.as_text().unwrap().is_trusted());

        // Untouched strings keep their flag too
        let untouched = Markup::trusted("<b>no urls</b>");
        assert_eq!(rewrite_default(untouched.clone().into()), untouched.into());
    }

    #[test]
    fn test_opaque_passthrough() {
        for value in [json!(42), json!(null), json!(true), json!(["https://a.example.com"])] {
            assert_eq!(
                rewrite_default(RewritableValue::Opaque(value.clone())),
                RewritableValue::Opaque(value)
            );
        }
    }

    #[test]
    fn test_noop_substitutions() {
        let value: RewritableValue = Markup::plain("https://a.example.com/x.js").into();

        let identity = rewrite(
            value.clone(),
            Substitution::new(APP_FROM, APP_FROM),
            Substitution::new(S3_FROM, S3_FROM),
        );
        assert_eq!(identity, value);

        let empty = rewrite(
            value.clone(),
            Substitution::new("", APP_TO),
            Substitution::new("", S3_TO),
        );
        assert_eq!(empty, value);
    }
}
