//! Page and workspace classification.
//!
//! Classification is a pure function of the observed document state: the same
//! snapshot always yields the same [`PageIdentity`]. The identity is threaded
//! through every recorded step instead of living as ambient session state, so
//! downstream context logic never depends on when the classifier was called.

use serde::{Deserialize, Serialize};

use crate::dom::DomSnapshot;

/// Broad category of the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    /// Record list / grid page
    List,
    /// Detail or entry form
    Form,
    /// Modal dialog
    Dialog,
    /// Workspace / hub page
    Workspace,
    /// Could not be classified
    #[default]
    Unknown,
}

/// Stable identity of the page a step was recorded on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageIdentity {
    /// Module / functional area ("AccountsReceivable", ...)
    pub module: String,
    /// Page category
    pub page_type: PageType,
    /// Human-readable caption
    pub caption: String,
}

impl PageIdentity {
    /// Create an identity
    #[must_use]
    pub fn new(module: impl Into<String>, page_type: PageType, caption: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            page_type,
            caption: caption.into(),
        }
    }

    /// Whether classification found a known signature
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.page_type != PageType::Unknown
    }
}

/// A known page signature: module plus a distinguishing DOM marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSignature {
    /// Module this page belongs to
    pub module: String,
    /// Page category when the marker matches
    pub page_type: PageType,
    /// Attribute that marks this page
    pub marker_attribute: String,
    /// Required marker value; `None` means presence is enough
    #[serde(default)]
    pub marker_value: Option<String>,
    /// Substring the URL must contain, when set
    #[serde(default)]
    pub url_fragment: Option<String>,
    /// Attribute on the marker node holding the caption, when set
    #[serde(default)]
    pub caption_attribute: Option<String>,
}

/// Registry of known page signatures, matched in registration order
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    signatures: Vec<PageSignature>,
}

impl SignatureRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature; earlier registrations win ties
    pub fn register(&mut self, signature: PageSignature) {
        self.signatures.push(signature);
    }

    /// Number of registered signatures
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Classify a snapshot. Pure and side-effect-free; never fails. The
    /// fallback is `PageType::Unknown` with a best-effort caption.
    #[must_use]
    pub fn classify(&self, snapshot: &DomSnapshot) -> PageIdentity {
        for signature in &self.signatures {
            if let Some(fragment) = &signature.url_fragment {
                if !snapshot.url.contains(fragment.as_str()) {
                    continue;
                }
            }
            let marker = snapshot.ids().find(|id| {
                let node = snapshot.node(*id);
                match &signature.marker_value {
                    Some(value) => node.attribute(&signature.marker_attribute) == Some(value),
                    None => node.attribute(&signature.marker_attribute).is_some(),
                }
            });
            if let Some(marker) = marker {
                let caption = signature
                    .caption_attribute
                    .as_deref()
                    .and_then(|attr| snapshot.node(marker).attribute(attr))
                    .map(str::to_string)
                    .unwrap_or_else(|| snapshot.title.clone());
                return PageIdentity::new(signature.module.clone(), signature.page_type, caption);
            }
        }

        PageIdentity::new(
            module_hint_from_url(&snapshot.url),
            PageType::Unknown,
            snapshot.title.clone(),
        )
    }
}

/// Best-effort module hint from the URL's menu-item query parameter.
fn module_hint_from_url(url: &str) -> String {
    url.split(['?', '&'])
        .find_map(|part| part.strip_prefix("mi="))
        .unwrap_or("")
        .to_string()
}
