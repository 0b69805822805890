//! Deterministic generation of executable test source from recorded steps.
//!
//! The same step sequence always produces byte-identical output: emission
//! walks steps in order, never consults timestamps, and formats every value
//! through the same literal escaper. Stabilization waits are inserted after
//! context changes and after clicks on heavyweight controls so the generated
//! scenario does not race the application's async refresh.

use crate::locator::{LocatorDefinition, Strategy};
use crate::params::{render_data_file, ParamMap};
use crate::step::{Action, AssertionKind, RecordedStep, StepWarning};

/// Default scenario id emitted into the data file
pub const DEFAULT_SCENARIO_ID: &str = "scenario-1";

/// Control-name fragments that mark a click as heavyweight
const HEAVY_CONTROL_FRAGMENTS: &[&str] = &[
    "save", "post", "transfer", "submit", "confirm", "process", "complete", "delete", "new",
];

/// One generated test: source file plus its data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTest {
    /// Test name as given (display form)
    pub name: String,
    /// snake_case function and file stem
    pub stem: String,
    /// Rust source of the scenario function
    pub source: String,
    /// JSON data file content, produced when a parameter map was supplied
    pub data_file: Option<String>,
}

impl GeneratedTest {
    /// File name for the source
    #[must_use]
    pub fn source_file_name(&self) -> String {
        format!("{}.rs", self.stem)
    }

    /// File name for the data file
    #[must_use]
    pub fn data_file_name(&self) -> String {
        format!("{}.data.json", self.stem)
    }
}

/// Generates test source from recorded steps
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    name: String,
}

impl CodeGenerator {
    /// Create a generator for a named test
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Emit the scenario function, plus the initial data file when a
    /// confirmed parameter map is supplied. Fill/select values with a map
    /// entry are emitted as `row.get("name")` accessors instead of literals.
    #[must_use]
    pub fn generate(&self, steps: &[RecordedStep], params: Option<&ParamMap>) -> GeneratedTest {
        let stem = snake_case(&self.name);
        let mut out = String::new();
        out.push_str("//! Generated scenario. Locator keys are managed by the locator library;\n");
        out.push_str("//! do not edit them by hand.\n\n");
        out.push_str("use grabar::runtime::{by, Row, Session};\n");
        out.push_str("use grabar::GrabarResult;\n\n");
        for step in steps {
            for warning in &step.warnings {
                out.push_str(&warning_comment(*warning, step));
            }
        }
        out.push_str(&format!(
            "pub async fn {stem}(session: &mut Session, row: &Row) -> GrabarResult<()> {{\n"
        ));
        for step in steps {
            emit_step(&mut out, step, params);
        }
        out.push_str("    Ok(())\n");
        out.push_str("}\n");

        GeneratedTest {
            name: self.name.clone(),
            stem,
            source: out,
            data_file: params.map(|map| render_data_file(DEFAULT_SCENARIO_ID, map)),
        }
    }
}

fn emit_step(out: &mut String, step: &RecordedStep, params: Option<&ParamMap>) {
    match step.action {
        Action::Navigate => {
            let target = step.value.as_deref().unwrap_or(&step.page.module);
            out.push_str(&format!("    session.navigate({}).await?;\n", lit(target)));
            out.push_str("    session.wait_settled().await?;\n");
        }
        Action::Click => {
            out.push_str(&format!(
                "    session.click({}).await?;\n",
                locator_expr(&step.locator)
            ));
            if is_heavy_click(&step.locator) {
                out.push_str("    session.wait_settled().await?;\n");
            }
        }
        Action::Fill => {
            let value = step.value.as_deref().unwrap_or_default();
            out.push_str(&format!(
                "    session.fill({}, {}).await?;\n",
                locator_expr(&step.locator),
                value_expr(value, params)
            ));
        }
        Action::Select => {
            let value = step.value.as_deref().unwrap_or_default();
            out.push_str(&format!(
                "    session.select({}, {}).await?;\n",
                locator_expr(&step.locator),
                value_expr(value, params)
            ));
        }
        Action::Wait => {
            out.push_str("    session.wait_settled().await?;\n");
        }
        Action::Assert => match step.assertion.clone().unwrap_or(AssertionKind::Visible) {
            AssertionKind::Visible => out.push_str(&format!(
                "    session.assert_visible({}).await?;\n",
                locator_expr(&step.locator)
            )),
            AssertionKind::HasText(expected) => out.push_str(&format!(
                "    session.assert_text({}, {}).await?;\n",
                locator_expr(&step.locator),
                lit(&expected)
            )),
            AssertionKind::Enabled => out.push_str(&format!(
                "    session.assert_enabled({}).await?;\n",
                locator_expr(&step.locator)
            )),
            AssertionKind::Checked => out.push_str(&format!(
                "    session.assert_checked({}).await?;\n",
                locator_expr(&step.locator)
            )),
        },
    }
}

/// Render a locator as a `by::...(...).keyed(...)` expression
#[must_use]
pub fn locator_expr(locator: &LocatorDefinition) -> String {
    let constructor = match locator.strategy {
        Strategy::Attribute => format!(
            "by::attribute({}, {})",
            lit(locator.metadata.attribute_name.as_deref().unwrap_or("")),
            lit(&locator.value)
        ),
        Strategy::Role => format!(
            "by::role({}, {})",
            lit(locator.metadata.role_name.as_deref().unwrap_or("")),
            lit(&locator.value)
        ),
        Strategy::Label => format!("by::label({})", lit(&locator.value)),
        Strategy::Text => format!("by::text({})", lit(&locator.value)),
        Strategy::Css => format!("by::css({})", lit(&locator.value)),
        Strategy::XPath => format!("by::xpath({})", lit(&locator.value)),
        Strategy::Spatial => format!("by::spatial({})", lit(&locator.value)),
    };
    format!("{constructor}.keyed({})", lit(&locator.locator_key))
}

fn warning_comment(warning: StepWarning, step: &RecordedStep) -> String {
    match warning {
        StepWarning::MissingContext => format!(
            "// WARNING: step {} acts on module '{}' without a recorded navigation to it.\n",
            step.order, step.page.module
        ),
        StepWarning::LowConfidenceLocator => format!(
            "// WARNING: step {} uses a low-confidence locator ({}); consider adding a stable attribute.\n",
            step.order,
            step.locator.strategy.name()
        ),
    }
}

fn is_heavy_click(locator: &LocatorDefinition) -> bool {
    let mut haystack = locator.value.to_lowercase();
    if let Some(name) = &locator.metadata.accessible_name {
        haystack.push(' ');
        haystack.push_str(&name.to_lowercase());
    }
    HEAVY_CONTROL_FRAGMENTS
        .iter()
        .any(|fragment| haystack.contains(fragment))
}

/// Escape a value as a Rust string literal
fn lit(value: &str) -> String {
    format!("{value:?}")
}

/// A fill/select value: a `row.get(...)` accessor when confirmed as a
/// parameter, otherwise the literal
fn value_expr(value: &str, params: Option<&ParamMap>) -> String {
    params.and_then(|map| map.get(value)).map_or_else(
        || lit(value),
        |name| format!("row.get({})", lit(name)),
    )
}

/// Lower a display name to a snake_case identifier
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() {
                if prev_lower {
                    out.push('_');
                }
                for lower in ch.to_lowercase() {
                    out.push(lower);
                }
                prev_lower = false;
            } else {
                out.push(ch);
                prev_lower = true;
            }
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
            prev_lower = false;
        }
    }
    let trimmed = out.trim_end_matches('_').to_string();
    if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("t_{trimmed}")
    } else if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed
    }
}
