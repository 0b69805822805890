//! Runtime surface for generated tests.
//!
//! Generated scenarios are plain async functions over [`Session`] and [`Row`].
//! The browser itself sits behind [`BrowserDriver`], an opaque capability
//! provided by the embedding application; this crate never talks to a real
//! browser directly. Session failures render locators in the fixed grammar
//! (`locator(key=..., strategy=..., value=...)`) so the orchestrator can
//! recover the failing key from child output.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

use crate::locator::{LocatorDefinition, LocatorMetadata, Strategy};
use crate::result::{GrabarError, GrabarResult};

/// Locator constructors used by generated code.
pub mod by {
    use super::{LocatorDefinition, LocatorMetadata, Strategy};

    fn build(strategy: Strategy, value: &str, metadata: LocatorMetadata) -> LocatorDefinition {
        LocatorDefinition::from_parts(strategy, value, metadata, String::new())
    }

    /// Locate by a stable attribute value
    #[must_use]
    pub fn attribute(name: &str, value: &str) -> LocatorDefinition {
        build(
            Strategy::Attribute,
            value,
            LocatorMetadata {
                attribute_name: Some(name.to_string()),
                ..LocatorMetadata::default()
            },
        )
    }

    /// Locate by ARIA role and accessible name
    #[must_use]
    pub fn role(role: &str, name: &str) -> LocatorDefinition {
        build(
            Strategy::Role,
            name,
            LocatorMetadata {
                role_name: Some(role.to_string()),
                accessible_name: Some(name.to_string()),
                ..LocatorMetadata::default()
            },
        )
    }

    /// Locate by associated label text
    #[must_use]
    pub fn label(text: &str) -> LocatorDefinition {
        build(Strategy::Label, text, LocatorMetadata::default())
    }

    /// Locate by exact visible text
    #[must_use]
    pub fn text(content: &str) -> LocatorDefinition {
        build(Strategy::Text, content, LocatorMetadata::default())
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: &str) -> LocatorDefinition {
        build(Strategy::Css, selector, LocatorMetadata::default())
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(path: &str) -> LocatorDefinition {
        build(Strategy::XPath, path, LocatorMetadata::default())
    }

    /// Locate by spatial/structural path
    #[must_use]
    pub fn spatial(path: &str) -> LocatorDefinition {
        build(Strategy::Spatial, path, LocatorMetadata::default())
    }
}

impl LocatorDefinition {
    /// Attach the stable locator key (generated code always does)
    #[must_use]
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.locator_key = key.into();
        self
    }
}

/// Opaque browser capability consumed by [`Session`].
///
/// Interaction methods return `Ok(false)` when the element cannot be
/// resolved; the session turns that into a locator-grammar error.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate to a module / menu target
    async fn navigate(&mut self, target: &str) -> GrabarResult<()>;
    /// Click an element
    async fn click(&mut self, locator: &LocatorDefinition) -> GrabarResult<bool>;
    /// Fill a field
    async fn fill(&mut self, locator: &LocatorDefinition, value: &str) -> GrabarResult<bool>;
    /// Select an option
    async fn select(&mut self, locator: &LocatorDefinition, value: &str) -> GrabarResult<bool>;
    /// Read an element's text, `None` when not found
    async fn text_of(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<String>>;
    /// Whether an element is enabled, `None` when not found
    async fn is_enabled(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<bool>>;
    /// Whether an element is checked, `None` when not found
    async fn is_checked(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<bool>>;
    /// Wait for asynchronous UI settling after a heavy action
    async fn settle(&mut self) -> GrabarResult<()>;
}

/// One flat record of an external data file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: serde_json::Map<String, Value>,
}

impl Row {
    /// Build a row from a JSON object
    pub fn from_value(value: Value) -> GrabarResult<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(GrabarError::ConfigError {
                message: format!("data record must be a flat object, got {other}"),
            }),
        }
    }

    /// Parse a generated data file (array of flat records)
    pub fn rows_from_json(content: &str) -> GrabarResult<Vec<Self>> {
        let value: Value = serde_json::from_str(content)?;
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            other => Err(GrabarError::ConfigError {
                message: format!("data file must be an array, got {other}"),
            }),
        }
    }

    /// Scenario id of this record
    #[must_use]
    pub fn id(&self) -> &str {
        self.get("id")
    }

    /// Field value by parameter name; empty for missing keys
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).and_then(Value::as_str).unwrap_or("")
    }
}

/// Execution session for one generated scenario
pub struct Session {
    driver: Box<dyn BrowserDriver>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session over a driver capability
    #[must_use]
    pub fn new(driver: Box<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Navigate to a module target
    pub async fn navigate(&mut self, target: &str) -> GrabarResult<()> {
        self.driver.navigate(target).await
    }

    /// Click, failing with the locator grammar when unresolved
    pub async fn click(&mut self, locator: LocatorDefinition) -> GrabarResult<()> {
        if self.driver.click(&locator).await? {
            Ok(())
        } else {
            Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            })
        }
    }

    /// Fill a field
    pub async fn fill(&mut self, locator: LocatorDefinition, value: &str) -> GrabarResult<()> {
        if self.driver.fill(&locator, value).await? {
            Ok(())
        } else {
            Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            })
        }
    }

    /// Select an option
    pub async fn select(&mut self, locator: LocatorDefinition, value: &str) -> GrabarResult<()> {
        if self.driver.select(&locator, value).await? {
            Ok(())
        } else {
            Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            })
        }
    }

    /// Assert the element is present and visible
    pub async fn assert_visible(&mut self, locator: LocatorDefinition) -> GrabarResult<()> {
        match self.driver.text_of(&locator).await? {
            Some(_) => Ok(()),
            None => Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            }),
        }
    }

    /// Assert the element has exact text
    pub async fn assert_text(
        &mut self,
        locator: LocatorDefinition,
        expected: &str,
    ) -> GrabarResult<()> {
        match self.driver.text_of(&locator).await? {
            None => Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            }),
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(GrabarError::AssertionFailed {
                message: format!("expected text '{expected}' but got '{actual}' at {locator}"),
            }),
        }
    }

    /// Assert the element is enabled
    pub async fn assert_enabled(&mut self, locator: LocatorDefinition) -> GrabarResult<()> {
        match self.driver.is_enabled(&locator).await? {
            None => Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            }),
            Some(true) => Ok(()),
            Some(false) => Err(GrabarError::AssertionFailed {
                message: format!("expected enabled element at {locator}"),
            }),
        }
    }

    /// Assert the element is checked
    pub async fn assert_checked(&mut self, locator: LocatorDefinition) -> GrabarResult<()> {
        match self.driver.is_checked(&locator).await? {
            None => Err(GrabarError::LocatorNotFound {
                locator: locator.to_string(),
            }),
            Some(true) => Ok(()),
            Some(false) => Err(GrabarError::AssertionFailed {
                message: format!("expected checked element at {locator}"),
            }),
        }
    }

    /// Named stabilization primitive inserted after heavy steps
    pub async fn wait_settled(&mut self) -> GrabarResult<()> {
        self.driver.settle().await
    }
}

/// In-memory driver that resolves a fixed set of locator keys.
///
/// Used by the pipeline's own tests and by embedders that want to dry-run a
/// generated scenario without a browser.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    known_keys: HashSet<String>,
    texts: std::collections::HashMap<String, String>,
    disabled_keys: HashSet<String>,
    checked_keys: HashSet<String>,
    /// Log of performed operations, oldest first
    pub operations: Vec<String>,
}

impl SimulatedDriver {
    /// Create a driver that resolves the given keys
    #[must_use]
    pub fn with_known_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            known_keys: keys.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Preload the text content returned for a key
    pub fn set_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        let key = key.into();
        self.known_keys.insert(key.clone());
        self.texts.insert(key, text.into());
    }

    /// Mark a key as resolving to a disabled element
    pub fn set_disabled(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.known_keys.insert(key.clone());
        self.disabled_keys.insert(key);
    }

    /// Mark a key as resolving to a checked element
    pub fn set_checked(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.known_keys.insert(key.clone());
        self.checked_keys.insert(key);
    }

    fn resolves(&self, locator: &LocatorDefinition) -> bool {
        self.known_keys.contains(&locator.locator_key)
    }
}

#[async_trait]
impl BrowserDriver for SimulatedDriver {
    async fn navigate(&mut self, target: &str) -> GrabarResult<()> {
        self.operations.push(format!("navigate:{target}"));
        Ok(())
    }

    async fn click(&mut self, locator: &LocatorDefinition) -> GrabarResult<bool> {
        self.operations.push(format!("click:{}", locator.locator_key));
        Ok(self.resolves(locator))
    }

    async fn fill(&mut self, locator: &LocatorDefinition, value: &str) -> GrabarResult<bool> {
        self.operations
            .push(format!("fill:{}={value}", locator.locator_key));
        Ok(self.resolves(locator))
    }

    async fn select(&mut self, locator: &LocatorDefinition, value: &str) -> GrabarResult<bool> {
        self.operations
            .push(format!("select:{}={value}", locator.locator_key));
        Ok(self.resolves(locator))
    }

    async fn text_of(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<String>> {
        self.operations
            .push(format!("text_of:{}", locator.locator_key));
        if self.resolves(locator) {
            Ok(Some(
                self.texts.get(&locator.locator_key).cloned().unwrap_or_default(),
            ))
        } else {
            Ok(None)
        }
    }

    async fn is_enabled(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<bool>> {
        self.operations
            .push(format!("is_enabled:{}", locator.locator_key));
        if self.resolves(locator) {
            Ok(Some(!self.disabled_keys.contains(&locator.locator_key)))
        } else {
            Ok(None)
        }
    }

    async fn is_checked(&mut self, locator: &LocatorDefinition) -> GrabarResult<Option<bool>> {
        self.operations
            .push(format!("is_checked:{}", locator.locator_key));
        if self.resolves(locator) {
            Ok(Some(self.checked_keys.contains(&locator.locator_key)))
        } else {
            Ok(None)
        }
    }

    async fn settle(&mut self) -> GrabarResult<()> {
        self.operations.push("settle".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod row_tests {
        use super::*;

        #[test]
        fn test_rows_from_json() {
            let rows = Row::rows_from_json(
                r#"[{ "id": "scenario-1", "customerAccount": "100001" }]"#,
            )
            .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id(), "scenario-1");
            assert_eq!(rows[0].get("customerAccount"), "100001");
            assert_eq!(rows[0].get("missing"), "");
        }

        #[test]
        fn test_non_array_rejected() {
            assert!(Row::rows_from_json(r#"{"id": "x"}"#).is_err());
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_known_key() {
            let driver = SimulatedDriver::with_known_keys(vec!["abcd".to_string()]);
            let mut session = Session::new(Box::new(driver));
            session
                .click(by::attribute("data-dyn-controlname", "Save").keyed("abcd"))
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_unknown_key_yields_locator_grammar_error() {
            let driver = SimulatedDriver::default();
            let mut session = Session::new(Box::new(driver));
            let err = session
                .click(by::label("Customer account").keyed("9c1d2e3f4a5b6c7d"))
                .await
                .unwrap_err();
            let message = err.to_string();
            assert!(message.contains("locator(key=9c1d2e3f4a5b6c7d"));
            assert!(message.contains("strategy=label"));
            assert!(message.contains("not found"));
        }

        #[tokio::test]
        async fn test_assert_text() {
            let mut driver = SimulatedDriver::default();
            driver.set_text("feed", "Posted");
            let mut session = Session::new(Box::new(driver));
            session
                .assert_text(by::text("Posted").keyed("feed"), "Posted")
                .await
                .unwrap();
            let err = session
                .assert_text(by::text("Posted").keyed("feed"), "Open")
                .await
                .unwrap_err();
            assert!(matches!(err, GrabarError::AssertionFailed { .. }));
        }

        #[tokio::test]
        async fn test_wait_settled_reaches_driver() {
            let driver = SimulatedDriver::default();
            let mut session = Session::new(Box::new(driver));
            session.wait_settled().await.unwrap();
        }
    }
}
