use scraper::node::Element;
use serde::Deserialize;

/// A declarative element predicate: tag name plus class/id substrings.
///
/// Every field that is set must match. A matcher with no field set matches nothing.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ElementMatcher {
    pub tag: Option<String>,
    pub class_contains: Option<String>,
    pub id_contains: Option<String>,
}

impl ElementMatcher {
    pub fn tag(name: &str) -> Self {
        Self {
            tag: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn class(fragment: &str) -> Self {
        Self {
            class_contains: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub fn id(fragment: &str) -> Self {
        Self {
            id_contains: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, name: &str) -> Self {
        self.tag = Some(name.to_string());
        self
    }

    pub fn matches(&self, element: &Element) -> bool {
        if self.tag.is_none() && self.class_contains.is_none() && self.id_contains.is_none() {
            return false;
        }

        let tag_ok = self
            .tag
            .as_deref()
            .map_or(true, |tag| element.name().eq_ignore_ascii_case(tag));
        let class_ok = self
            .class_contains
            .as_deref()
            .map_or(true, |fragment| element.classes().any(|class| class.contains(fragment)));
        let id_ok = self
            .id_contains
            .as_deref()
            .map_or(true, |fragment| element.id().is_some_and(|id| id.contains(fragment)));

        tag_ok && class_ok && id_ok
    }
}

pub fn matches_any(matchers: &[ElementMatcher], element: &Element) -> bool {
    matchers.iter().any(|matcher| matcher.matches(element))
}

/// Code samples as rendered by common API documentation generators.
pub fn default_code_matchers() -> Vec<ElementMatcher> {
    vec![
        ElementMatcher::tag("pre"),
        ElementMatcher::tag("code"),
        ElementMatcher::class("highlight"),
        ElementMatcher::class("language-"),
        ElementMatcher::class("code-example"),
        ElementMatcher::class("code-sample"),
        ElementMatcher::class("snippet"),
        ElementMatcher::class("example").with_tag("div"),
    ]
}

/// Containers that wrap parameter tables.
pub fn default_table_matchers() -> Vec<ElementMatcher> {
    vec![
        ElementMatcher::class("params"),
        ElementMatcher::class("parameters"),
        ElementMatcher::id("param"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use scraper::{Html, Selector};

    fn first_div(html: &str) -> Element {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse("div").unwrap();
        document.select(&selector).next().unwrap().value().clone()
    }

    #[rstest]
    #[case(ElementMatcher::class("highlight"), r#"<div class="code highlight-js"></div>"#, true)]
    #[case(ElementMatcher::class("highlight"), r#"<div class="plain"></div>"#, false)]
    #[case(ElementMatcher::id("param"), r#"<div id="request-params"></div>"#, true)]
    #[case(ElementMatcher::id("param"), r#"<div></div>"#, false)]
    #[case(ElementMatcher::tag("div"), r#"<div></div>"#, true)]
    #[case(ElementMatcher::class("example").with_tag("span"), r#"<div class="example"></div>"#, false)]
    #[case(ElementMatcher::default(), r#"<div class="anything"></div>"#, false)]
    fn test_matches(#[case] matcher: ElementMatcher, #[case] html: &str, #[case] expected: bool) {
        assert_eq!(matcher.matches(&first_div(html)), expected);
    }

    #[test]
    fn test_matches_any_uses_defaults() {
        assert!(matches_any(&default_table_matchers(), &first_div(r#"<div class="api-parameters"></div>"#)));
        assert!(matches_any(&default_code_matchers(), &first_div(r#"<div class="example"></div>"#)));
        assert!(!matches_any(&default_code_matchers(), &first_div(r#"<div class="content"></div>"#)));
    }

    #[test]
    fn test_deserializes_from_json() {
        let matcher: ElementMatcher =
            serde_json::from_str(r#"{ "tag": "div", "class_contains": "sample" }"#).unwrap();
        assert_eq!(matcher, ElementMatcher::class("sample").with_tag("div"));
    }
}
