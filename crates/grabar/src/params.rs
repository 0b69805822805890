//! Parameterization of generated test source.
//!
//! Detection parses the generated Rust with `syn` and walks the AST for
//! `session.fill(...)` / `session.select(...)` calls whose value argument is
//! still a string literal. Each distinct literal value becomes one
//! [`ParamCandidate`] named after the human-readable label of its locator;
//! confirmation turns accepted candidates into a [`ParamMap`] keyed on the
//! original value. Application rewrites every literal whose value has a map
//! entry, splicing by literal span so everything outside the replaced
//! literals survives byte for byte.

use std::collections::{BTreeMap, HashMap, HashSet};

use syn::visit::Visit;
use syn::{Expr, ExprCall, ExprLit, ExprMethodCall, Lit};
use uuid::Uuid;

use crate::result::{GrabarError, GrabarResult};

/// Confirmed mapping from original literal value to parameter name
pub type ParamMap = BTreeMap<String, String>;

/// A literal value in generated source that could become a data-file
/// parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamCandidate {
    /// Candidate identity for the confirmation round trip
    pub id: Uuid,
    /// camelCase name proposed for the data-file key
    pub suggested_name: String,
    /// Original literal value (becomes the first record's value)
    pub original_value: String,
    /// Human label the name was derived from
    pub label: String,
}

/// Detect parameterizable literal values in generated source.
///
/// Already-parameterized calls pass a `row.get(...)` expression instead of a
/// literal and are skipped, so running detection on applied output yields
/// nothing. Rewriting is exact-match on the literal text, so a value that
/// occurs at several call sites folds into the candidate of its first
/// occurrence; two fields that happen to share a value cannot be told apart.
/// Literals that cannot be named get a positional fallback name.
pub fn detect_candidates(source: &str) -> GrabarResult<Vec<ParamCandidate>> {
    let file = syn::parse_file(source).map_err(|e| GrabarError::ParamParse {
        message: e.to_string(),
    })?;
    let mut visitor = CandidateVisitor::default();
    visitor.visit_file(&file);

    let mut seen: HashSet<String> = HashSet::new();
    let mut taken: HashMap<String, usize> = HashMap::new();
    let mut candidates = Vec::new();
    for hit in visitor.hits {
        if !seen.insert(hit.value.clone()) {
            continue;
        }
        let base = hit
            .label
            .as_deref()
            .map(camel_case)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("value{}", candidates.len() + 1));
        let count = taken.entry(base.clone()).or_insert(0);
        *count += 1;
        let suggested_name = if *count == 1 {
            base
        } else {
            format!("{base}{count}")
        };
        candidates.push(ParamCandidate {
            id: Uuid::new_v4(),
            suggested_name,
            original_value: hit.value,
            label: hit.label.unwrap_or_default(),
        });
    }
    Ok(candidates)
}

/// Confirm accepted candidates into the value-keyed parameter map
#[must_use]
pub fn confirm_candidates(accepted: &[ParamCandidate]) -> ParamMap {
    accepted
        .iter()
        .map(|candidate| {
            (
                candidate.original_value.clone(),
                candidate.suggested_name.clone(),
            )
        })
        .collect()
}

/// Replace confirmed literals with `row.get("name")` accessors.
///
/// Every `fill`/`select` literal whose value matches a map key exactly is
/// rewritten; splices run back to front so earlier spans stay valid, and all
/// surrounding source text is preserved unchanged.
pub fn apply_parameterization(source: &str, map: &ParamMap) -> GrabarResult<String> {
    let file = syn::parse_file(source).map_err(|e| GrabarError::ParamParse {
        message: e.to_string(),
    })?;
    let mut visitor = CandidateVisitor::default();
    visitor.visit_file(&file);

    let mut ordered: Vec<&Hit> = visitor
        .hits
        .iter()
        .filter(|hit| map.contains_key(&hit.value))
        .collect();
    ordered.sort_by(|a, b| (b.line, b.start_column).cmp(&(a.line, a.start_column)));

    let mut out = source.to_string();
    for hit in ordered {
        let name = &map[&hit.value];
        let start = char_offset(source, hit.line, hit.start_column).ok_or_else(|| {
            GrabarError::ParamParse {
                message: format!(
                    "literal for '{name}' points outside the source (line {})",
                    hit.line
                ),
            }
        })?;
        let end = char_offset(source, hit.line, hit.end_column).ok_or_else(|| {
            GrabarError::ParamParse {
                message: format!(
                    "literal for '{name}' points outside the source (line {})",
                    hit.line
                ),
            }
        })?;
        out.replace_range(start..end, &format!("row.get({name:?})"));
    }
    Ok(out)
}

/// Render the data file for a parameterized test.
///
/// One record carrying the scenario id plus each confirmed parameter under
/// its name, with the recorded literal as the initial value.
#[must_use]
pub fn render_data_file(scenario_id: &str, map: &ParamMap) -> String {
    let mut record = serde_json::Map::new();
    record.insert(
        "id".to_string(),
        serde_json::Value::String(scenario_id.to_string()),
    );
    for (value, name) in map {
        record.insert(name.clone(), serde_json::Value::String(value.clone()));
    }
    let rows = serde_json::Value::Array(vec![serde_json::Value::Object(record)]);
    let mut out = serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());
    out.push('\n');
    out
}

struct Hit {
    value: String,
    label: Option<String>,
    line: usize,
    start_column: usize,
    end_column: usize,
}

#[derive(Default)]
struct CandidateVisitor {
    hits: Vec<Hit>,
}

impl<'ast> Visit<'ast> for CandidateVisitor {
    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        if matches!(call.method.to_string().as_str(), "fill" | "select")
            && is_session_receiver(&call.receiver)
            && call.args.len() == 2
        {
            if let Some(Expr::Lit(ExprLit {
                lit: Lit::Str(lit), ..
            })) = call.args.last()
            {
                let span = lit.span();
                self.hits.push(Hit {
                    value: lit.value(),
                    label: call.args.first().and_then(locator_label),
                    line: span.start().line,
                    start_column: span.start().column,
                    end_column: span.end().column,
                });
            }
        }
        syn::visit::visit_expr_method_call(self, call);
    }
}

fn is_session_receiver(receiver: &Expr) -> bool {
    matches!(receiver, Expr::Path(path) if path.path.is_ident("session"))
}

/// Human label of a locator expression: the name-bearing argument of its
/// `by::` constructor, looked up through any trailing `.keyed(...)`.
fn locator_label(expr: &Expr) -> Option<String> {
    match expr {
        Expr::MethodCall(call) => locator_label(&call.receiver),
        Expr::Call(ExprCall { func, args, .. }) => {
            let Expr::Path(path) = func.as_ref() else {
                return None;
            };
            let constructor = path.path.segments.last()?.ident.to_string();
            let index = match constructor.as_str() {
                // attribute(name, value) and role(role, name) carry the label
                // in the second argument
                "attribute" | "role" => 1,
                "label" | "text" => 0,
                _ => return None,
            };
            match args.iter().nth(index)? {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(lit), ..
                }) => Some(lit.value()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Byte offset of a (1-based line, 0-based char column) position
fn char_offset(source: &str, line: usize, column: usize) -> Option<usize> {
    let mut remaining = line.checked_sub(1)?;
    let mut offset = 0;
    for candidate_line in source.split_inclusive('\n') {
        if remaining == 0 {
            let mut chars = 0;
            for (byte, _) in candidate_line.char_indices() {
                if chars == column {
                    return Some(offset + byte);
                }
                chars += 1;
            }
            if chars == column {
                return Some(offset + candidate_line.len());
            }
            return None;
        }
        remaining -= 1;
        offset += candidate_line.len();
    }
    None
}

/// Lower a human label to camelCase
#[must_use]
pub fn camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut boundary = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            if out.is_empty() {
                for lower in ch.to_lowercase() {
                    out.push(lower);
                }
            } else if boundary {
                for upper in ch.to_uppercase() {
                    out.push(upper);
                }
            } else {
                out.push(ch);
            }
            boundary = false;
        } else {
            boundary = true;
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("field{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"use grabar::runtime::{by, Row, Session};
use grabar::GrabarResult;

pub async fn create_customer(session: &mut Session, row: &Row) -> GrabarResult<()> {
    session.navigate("AccountsReceivable").await?;
    session.fill(by::attribute("data-dyn-controlname", "CustomerAccount").keyed("a1b2c3d4e5f60718"), "100001").await?;
    session.fill(by::label("Customer account").keyed("ffeeddccbbaa0099"), "100002").await?;
    session.select(by::attribute("data-dyn-controlname", "CustomerGroup").keyed("0011223344556677"), "Retail").await?;
    session.click(by::attribute("data-dyn-controlname", "SaveButton").keyed("8899aabbccddeeff")).await?;
    Ok(())
}
"#;

    const DUPLICATE_VALUE_SOURCE: &str = r#"use grabar::runtime::{by, Row, Session};
use grabar::GrabarResult;

pub async fn post_order(session: &mut Session, row: &Row) -> GrabarResult<()> {
    session.fill(by::label("Quantity").keyed("a1b2c3d4e5f60718"), "10").await?;
    session.fill(by::label("Discount").keyed("ffeeddccbbaa0099"), "10").await?;
    Ok(())
}
"#;

    mod naming_tests {
        use super::*;

        #[test]
        fn test_camel_case() {
            assert_eq!(camel_case("Customer account"), "customerAccount");
            assert_eq!(camel_case("customer-group"), "customerGroup");
            assert_eq!(camel_case("Name"), "name");
            assert_eq!(camel_case("100 days"), "field100Days");
        }
    }

    mod detect_tests {
        use super::*;

        #[test]
        fn test_detects_fill_and_select_literals() {
            let candidates = detect_candidates(SOURCE).unwrap();
            let names: Vec<&str> = candidates
                .iter()
                .map(|c| c.suggested_name.as_str())
                .collect();
            assert_eq!(
                names,
                vec!["customerAccount", "customerAccount2", "customerGroup"]
            );
            assert_eq!(candidates[0].original_value, "100001");
            assert_eq!(candidates[1].original_value, "100002");
            assert_eq!(candidates[2].original_value, "Retail");
        }

        #[test]
        fn test_navigate_and_click_are_not_candidates() {
            let candidates = detect_candidates(SOURCE).unwrap();
            assert!(candidates
                .iter()
                .all(|c| c.original_value != "AccountsReceivable"));
            assert_eq!(candidates.len(), 3);
        }

        #[test]
        fn test_colliding_names_get_numeric_suffix() {
            let candidates = detect_candidates(SOURCE).unwrap();
            assert_ne!(candidates[0].label, candidates[1].label);
            assert_eq!(candidates[0].suggested_name, "customerAccount");
            assert_eq!(candidates[1].suggested_name, "customerAccount2");
        }

        #[test]
        fn test_duplicate_values_conflate_into_one_candidate() {
            let candidates = detect_candidates(DUPLICATE_VALUE_SOURCE).unwrap();
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].original_value, "10");
            // The first occurrence names the conflated candidate.
            assert_eq!(candidates[0].suggested_name, "quantity");
        }

        #[test]
        fn test_invalid_source_is_an_error() {
            let err = detect_candidates("pub async fn {").unwrap_err();
            assert!(matches!(err, GrabarError::ParamParse { .. }));
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn test_apply_splices_row_accessors() {
            let map = confirm_candidates(&detect_candidates(SOURCE).unwrap());
            let applied = apply_parameterization(SOURCE, &map).unwrap();
            assert!(applied.contains(r#"row.get("customerAccount")).await?"#));
            assert!(applied.contains(r#"row.get("customerGroup")).await?"#));
            assert!(!applied.contains("\"100001\""));
            // Everything outside the literals is untouched.
            assert!(applied.contains("session.navigate(\"AccountsReceivable\").await?;"));
            assert!(applied.contains(".keyed(\"a1b2c3d4e5f60718\")"));
        }

        #[test]
        fn test_apply_rewrites_every_matching_literal() {
            let map = confirm_candidates(&detect_candidates(DUPLICATE_VALUE_SOURCE).unwrap());
            let applied = apply_parameterization(DUPLICATE_VALUE_SOURCE, &map).unwrap();
            assert_eq!(applied.matches("row.get(\"quantity\")").count(), 2);
            assert!(!applied.contains("\"10\""));
        }

        #[test]
        fn test_apply_is_idempotent() {
            let map = confirm_candidates(&detect_candidates(SOURCE).unwrap());
            let applied = apply_parameterization(SOURCE, &map).unwrap();
            assert!(detect_candidates(&applied).unwrap().is_empty());
            let reapplied = apply_parameterization(&applied, &map).unwrap();
            assert_eq!(applied, reapplied);
        }

        #[test]
        fn test_partial_acceptance() {
            let candidates = detect_candidates(SOURCE).unwrap();
            let map = confirm_candidates(&candidates[..1]);
            let applied = apply_parameterization(SOURCE, &map).unwrap();
            assert!(applied.contains(r#"row.get("customerAccount")"#));
            assert!(applied.contains("\"100002\""));
            assert!(applied.contains("\"Retail\""));
        }
    }

    mod data_file_tests {
        use super::*;

        #[test]
        fn test_render_data_file() {
            let map = confirm_candidates(&detect_candidates(SOURCE).unwrap());
            let data = render_data_file("scenario-1", &map);
            let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
            assert_eq!(parsed[0]["id"], "scenario-1");
            assert_eq!(parsed[0]["customerAccount"], "100001");
            assert_eq!(parsed[0]["customerAccount2"], "100002");
            assert_eq!(parsed[0]["customerGroup"], "Retail");
        }
    }
}
