//! Resolution of generated spec files across known workspace layouts.
//!
//! Teams keep generated tests in slightly different places; the runner probes
//! a fixed list of directories in a fixed order, trying the name as given and
//! its lowercase and snake_case variants, and fails with the full list of
//! probed paths when nothing matches.

use std::path::{Path, PathBuf};

use crate::codegen::snake_case;
use crate::result::{GrabarError, GrabarResult};

/// Directories probed for a generated spec, in priority order
pub const LAYOUT_DIRS: &[&str] = &["tests/generated", "tests", "e2e"];

/// Name spellings probed within each directory, in priority order
#[must_use]
pub fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    for candidate in [name.to_lowercase(), snake_case(name)] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Locate the source file for a named test under a workspace root.
///
/// The search order is deterministic: every layout directory is probed with
/// every name variant before moving to the next directory.
pub fn locate_spec(root: &Path, name: &str) -> GrabarResult<PathBuf> {
    let variants = name_variants(name);
    let mut searched = Vec::new();
    for dir in LAYOUT_DIRS {
        for variant in &variants {
            let candidate = root.join(dir).join(format!("{variant}.rs"));
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate.display().to_string());
        }
    }
    Err(GrabarError::SpecNotFound {
        name: name.to_string(),
        searched,
    })
}

/// Data file expected beside a located spec
#[must_use]
pub fn data_file_for(spec: &Path) -> PathBuf {
    spec.with_extension("data.json")
}
