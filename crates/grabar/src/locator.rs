//! Locator definitions produced by extraction.
//!
//! A locator pairs a *strategy* (how the element is found) with a stable
//! *locator key* (what the element is). The key is a digest of the element's
//! identity inputs and does not change when cleanup swaps the strategy, which
//! is what lets the library, the generated code and the execution feedback
//! loop all talk about the same element.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How many hex characters of the digest form a locator key
pub const LOCATOR_KEY_LEN: usize = 16;

/// Strategy used to express a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Domain-specific stable control attribute
    Attribute,
    /// ARIA role plus accessible name
    Role,
    /// Associated form label text
    Label,
    /// Exact visible text content
    Text,
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Spatial/structural fallback within a known container
    Spatial,
}

impl Strategy {
    /// Lower-case name used in the locator grammar and in persisted records
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Role => "role",
            Self::Label => "label",
            Self::Text => "text",
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Spatial => "spatial",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata captured alongside the chosen strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorMetadata {
    /// Attribute name, for [`Strategy::Attribute`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    /// ARIA role, for [`Strategy::Role`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    /// Accessible name of the target element, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,
    /// Confidence assigned by the extraction tier (1.0 highest, 0.2 fallback)
    pub confidence: f64,
}

/// A ranked, typed locator for one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorDefinition {
    /// Strategy used to find the element
    pub strategy: Strategy,
    /// Strategy-specific value (attribute value, label text, xpath, ...)
    pub value: String,
    /// Extraction metadata
    pub metadata: LocatorMetadata,
    /// Stable key identifying the semantic target
    pub locator_key: String,
}

impl LocatorDefinition {
    /// Create a definition; the key is derived from the identity string,
    /// never from the strategy/value pair
    #[must_use]
    pub fn new(
        strategy: Strategy,
        value: impl Into<String>,
        metadata: LocatorMetadata,
        identity: &str,
    ) -> Self {
        Self {
            strategy,
            value: value.into(),
            metadata,
            locator_key: locator_key(identity),
        }
    }

    /// Reassemble a definition from persisted parts, keeping the stored key
    #[must_use]
    pub fn from_parts(
        strategy: Strategy,
        value: impl Into<String>,
        metadata: LocatorMetadata,
        locator_key: impl Into<String>,
    ) -> Self {
        Self {
            strategy,
            value: value.into(),
            metadata,
            locator_key: locator_key.into(),
        }
    }

    /// Whether this locator came from a low-confidence tier (text/spatial)
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        self.metadata.confidence <= 0.4
    }
}

impl fmt::Display for LocatorDefinition {
    /// The fixed locator grammar consumed by failure-output parsing
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "locator(key={}, strategy={}, value={})",
            self.locator_key, self.strategy, self.value
        )
    }
}

/// Derive a stable locator key from an element identity string.
///
/// The identity string encodes the strongest stable signal the extractor saw
/// for the element (see `extract::identity_of`); two strategies pointing at
/// the same element hash to the same key.
#[must_use]
pub fn locator_key(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let hex = format!("{digest:x}");
    hex[..LOCATOR_KEY_LEN].to_string()
}
