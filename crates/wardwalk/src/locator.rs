//! Locator abstraction for element selection.
//!
//! An [`ElementReference`] is the declarative description a scenario step
//! carries ("the input with id `email`", "the button reading `Login`", "the
//! first row's edit button"). It compiles to a driver [`Query`] and is
//! resolved by [`resolve`] against the DOM as it is *right now*: a single
//! query, no retry and no waiting. Waiting belongs to [`crate::wait`].
//!
//! When a query matches several elements the first one in document order is
//! returned. Positional references built with [`ElementReference::first_option`]
//! and [`ElementReference::first_row_button`] rely on this.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::driver::{BrowserDriver, DriverError, ElementHandle};

/// Structural query understood by the browser driver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// CSS selector (e.g. `tbody tr:nth-child(1)`)
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Query {
    /// Raw selector or expression text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }

    /// Syntax of this query
    #[must_use]
    pub const fn syntax(&self) -> PathSyntax {
        match self {
            Self::Css(_) => PathSyntax::Css,
            Self::XPath(_) => PathSyntax::XPath,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
        }
    }
}

/// Syntax of a structural path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSyntax {
    /// CSS selector
    #[default]
    Css,
    /// XPath expression
    XPath,
}

/// How an [`ElementReference`] interprets its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Value is the element's `id`
    Id,
    /// Value is the content of the named attribute
    Attribute {
        /// Attribute name (e.g. `name`, `role`)
        name: String,
    },
    /// Value is the element's whitespace-normalized text content
    Text {
        /// Restrict to this tag name (`button`, `a`, ...)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// Value is a structural path in the given syntax
    Path {
        /// CSS or XPath
        #[serde(default)]
        syntax: PathSyntax,
    },
}

/// Symbolic, immutable description of a target element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementReference {
    /// Interpretation of `value`
    #[serde(flatten)]
    pub kind: ReferenceKind,
    /// Id, attribute value, text, or path
    pub value: String,
}

impl ElementReference {
    /// Reference by `id` attribute
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Id,
            value: id.into(),
        }
    }

    /// Reference by an arbitrary attribute value
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Attribute { name: name.into() },
            value: value.into(),
        }
    }

    /// Reference by exact (normalized) text content, any element
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Text { tag: None },
            value: text.into(),
        }
    }

    /// Reference by exact (normalized) text content of a given tag
    #[must_use]
    pub fn tagged_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Text {
                tag: Some(tag.into()),
            },
            value: text.into(),
        }
    }

    /// Reference by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Path {
                syntax: PathSyntax::Css,
            },
            value: selector.into(),
        }
    }

    /// Reference by XPath expression
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Path {
                syntax: PathSyntax::XPath,
            },
            value: expression.into(),
        }
    }

    /// The first rendered option of the currently open list box.
    ///
    /// Positional: it picks whatever option renders first, so the list must
    /// already be filtered (by typed input) to the intended entry.
    #[must_use]
    pub fn first_option() -> Self {
        Self::xpath("(//li[@role='option'])[1]")
    }

    /// The `button`-th button in column `column` of the first table row.
    ///
    /// Positional: valid only while the intended record renders as the first
    /// row (the application lists most recent first).
    #[must_use]
    pub fn first_row_button(column: usize, button: usize) -> Self {
        Self::css(format!(
            "tbody tr:nth-child(1) td:nth-child({column}) button:nth-child({button})"
        ))
    }

    /// Compile to the driver query
    #[must_use]
    pub fn to_query(&self) -> Query {
        match &self.kind {
            ReferenceKind::Id => Query::Css(format!("[id={}]", css_string(&self.value))),
            ReferenceKind::Attribute { name } => {
                Query::Css(format!("[{name}={}]", css_string(&self.value)))
            }
            ReferenceKind::Text { tag } => Query::XPath(format!(
                "//{}[normalize-space()={}]",
                tag.as_deref().unwrap_or("*"),
                xpath_literal(&self.value)
            )),
            ReferenceKind::Path {
                syntax: PathSyntax::Css,
            } => Query::Css(self.value.clone()),
            ReferenceKind::Path {
                syntax: PathSyntax::XPath,
            } => Query::XPath(self.value.clone()),
        }
    }
}

impl fmt::Display for ElementReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ReferenceKind::Id => write!(f, "#{}", self.value),
            ReferenceKind::Attribute { name } => write!(f, "[{name}={:?}]", self.value),
            ReferenceKind::Text { tag: Some(tag) } => write!(f, "{tag} {:?}", self.value),
            ReferenceKind::Text { tag: None } => write!(f, "text {:?}", self.value),
            ReferenceKind::Path {
                syntax: PathSyntax::Css,
            } => write!(f, "css={}", self.value),
            ReferenceKind::Path {
                syntax: PathSyntax::XPath,
            } => write!(f, "xpath={}", self.value),
        }
    }
}

/// Quoted CSS attribute-selector string
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// XPath 1.0 string literal; XPath has no escapes, so mixed quotes need `concat()`
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Failure of a single resolution attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing matches at this instant
    #[error("no element matches {reference}")]
    NotFound {
        /// Reference that did not match
        reference: ElementReference,
    },

    /// The driver could not run the query
    #[error("query for {reference} failed: {source}")]
    Driver {
        /// Reference being resolved
        reference: ElementReference,
        /// Underlying driver failure
        source: DriverError,
    },
}

/// Resolve a reference against the current DOM, once.
pub async fn resolve<D>(
    driver: &mut D,
    reference: &ElementReference,
) -> Result<ElementHandle, ResolveError>
where
    D: BrowserDriver + ?Sized,
{
    match driver.find(&reference.to_query()).await {
        Ok(Some(handle)) => Ok(handle),
        Ok(None) => Err(ResolveError::NotFound {
            reference: reference.clone(),
        }),
        Err(source) => Err(ResolveError::Driver {
            reference: reference.clone(),
            source,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod query_tests {
        use super::*;

        #[test]
        fn test_id_compiles_to_attribute_selector() {
            let query = ElementReference::id("email").to_query();
            assert_eq!(query, Query::Css(r#"[id="email"]"#.to_string()));
        }

        #[test]
        fn test_generated_id_survives_css_metacharacters() {
            // MUI generates ids like ":r1v:" which are not valid `#id` selectors
            let query = ElementReference::id(":r1v:").to_query();
            assert_eq!(query.as_str(), r#"[id=":r1v:"]"#);
        }

        #[test]
        fn test_attribute_quotes_are_escaped() {
            let query = ElementReference::attribute("title", r#"say "hi""#).to_query();
            assert_eq!(query.as_str(), r#"[title="say \"hi\""]"#);
        }

        #[test]
        fn test_tagged_text_compiles_to_xpath() {
            let query = ElementReference::tagged_text("button", "Login").to_query();
            assert_eq!(
                query,
                Query::XPath("//button[normalize-space()='Login']".to_string())
            );
        }

        #[test]
        fn test_untagged_text_matches_any_element() {
            let query = ElementReference::text("Patients").to_query();
            assert_eq!(query.as_str(), "//*[normalize-space()='Patients']");
        }

        #[test]
        fn test_text_with_apostrophe_uses_double_quotes() {
            let query = ElementReference::text("Patient's notes").to_query();
            assert_eq!(query.as_str(), "//*[normalize-space()=\"Patient's notes\"]");
        }

        #[test]
        fn test_text_with_both_quotes_uses_concat() {
            let query = ElementReference::text(r#"it's "done""#).to_query();
            assert_eq!(
                query.as_str(),
                r#"//*[normalize-space()=concat('it', "'", 's "done"')]"#
            );
        }

        #[test]
        fn test_paths_pass_through() {
            assert_eq!(
                ElementReference::css("tbody tr").to_query(),
                Query::Css("tbody tr".to_string())
            );
            assert_eq!(
                ElementReference::first_option().to_query(),
                Query::XPath("(//li[@role='option'])[1]".to_string())
            );
        }

        #[test]
        fn test_first_row_button() {
            let reference = ElementReference::first_row_button(7, 2);
            assert_eq!(
                reference.value,
                "tbody tr:nth-child(1) td:nth-child(7) button:nth-child(2)"
            );
            assert_eq!(reference.to_query().syntax(), PathSyntax::Css);
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_display_forms() {
            assert_eq!(ElementReference::id("email").to_string(), "#email");
            assert_eq!(
                ElementReference::attribute("name", "purpose").to_string(),
                r#"[name="purpose"]"#
            );
            assert_eq!(
                ElementReference::tagged_text("button", "Delete").to_string(),
                r#"button "Delete""#
            );
            assert_eq!(
                ElementReference::first_option().to_string(),
                "xpath=(//li[@role='option'])[1]"
            );
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_yaml_forms() {
            let yaml = r"
- { by: id, value: email }
- { by: attribute, name: name, value: purpose }
- { by: text, tag: button, value: Login }
- { by: path, syntax: xpath, value: '(//li)[1]' }
- { by: path, value: 'tbody tr' }
";
            let refs: Vec<ElementReference> = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(
                refs,
                vec![
                    ElementReference::id("email"),
                    ElementReference::attribute("name", "purpose"),
                    ElementReference::tagged_text("button", "Login"),
                    ElementReference::xpath("(//li)[1]"),
                    ElementReference::css("tbody tr"),
                ]
            );
        }

        #[test]
        fn test_unknown_kind_rejected() {
            let result: Result<ElementReference, _> =
                serde_yaml_ng::from_str("{ by: label, value: Email }");
            assert!(result.is_err());
        }
    }

    mod resolve_tests {
        use super::*;
        use crate::mock::{MockDriver, MockElement};

        #[tokio::test]
        async fn test_resolve_found() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(ElementReference::id("email")));
            let handle = resolve(&mut driver, &ElementReference::id("email"))
                .await
                .unwrap();
            assert_eq!(handle.query, ElementReference::id("email").to_query());
        }

        #[tokio::test]
        async fn test_resolve_not_found() {
            let mut driver = MockDriver::new();
            let err = resolve(&mut driver, &ElementReference::id("missing"))
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::NotFound { .. }));
        }

        #[tokio::test]
        async fn test_resolve_returns_first_in_document_order() {
            let mut driver = MockDriver::new();
            let option = ElementReference::first_option();
            let first = driver.add(MockElement::new(option.clone()));
            driver.add(MockElement::new(option.clone()));
            let handle = resolve(&mut driver, &option).await.unwrap();
            assert_eq!(handle.id, first);
        }

        #[tokio::test]
        async fn test_resolve_surfaces_driver_failure() {
            let mut driver = MockDriver::new();
            driver.close_now();
            let err = resolve(&mut driver, &ElementReference::id("email"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ResolveError::Driver {
                    source: DriverError::SessionClosed,
                    ..
                }
            ));
        }
    }
}
