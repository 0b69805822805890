//! Recorded step model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locator::LocatorDefinition;
use crate::page::PageIdentity;

/// What the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Click on an element
    Click,
    /// Fill a text value into a field
    Fill,
    /// Pick an option from a combobox/listbox
    Select,
    /// Context-setting navigation (module/workspace change)
    Navigate,
    /// Explicit stabilization wait
    Wait,
    /// Assertion on an element
    Assert,
}

/// Assertion kinds attachable to an assert step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// Element is visible
    Visible,
    /// Element has exact text
    HasText(String),
    /// Element is enabled
    Enabled,
    /// Element is checked
    Checked,
}

/// Non-fatal conditions attached to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepWarning {
    /// A toolbar action was recorded without a preserved context-setting
    /// step for its module
    MissingContext,
    /// Only a text/spatial tier matched during extraction
    LowConfidenceLocator,
}

/// One recorded interaction, owned by the recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    /// 1-based, contiguous position in the session
    pub order: usize,
    /// Action performed
    pub action: Action,
    /// Locator for the target element
    pub locator: LocatorDefinition,
    /// Page context the step was recorded on
    pub page: PageIdentity,
    /// Value for fill/select/navigate steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Assertion for assert steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionKind>,
    /// Warnings attached during capture or cleanup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StepWarning>,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
}

impl RecordedStep {
    /// Create a step
    #[must_use]
    pub fn new(
        order: usize,
        action: Action,
        locator: LocatorDefinition,
        page: PageIdentity,
    ) -> Self {
        Self {
            order,
            action,
            locator,
            page,
            value: None,
            assertion: None,
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach an assertion
    #[must_use]
    pub fn with_assertion(mut self, assertion: AssertionKind) -> Self {
        self.assertion = Some(assertion);
        self
    }

    /// Attach a warning
    pub fn warn(&mut self, warning: StepWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Whether this step sets context rather than acting on data
    #[must_use]
    pub fn is_context_setting(&self) -> bool {
        self.action == Action::Navigate
    }
}
