//! Small filesystem utilities.

use globset::{Glob, GlobSet, GlobSetBuilder};

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{StepwiseError, StepwiseResult};

/// Extensions picked up by multi-file instrumentation when no globs are given.
pub const DEFAULT_SOURCE_GLOBS: &[&str] = &[
    "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.ts", "**/*.tsx", "**/*.mts", "**/*.cts",
];

/// Files under `root` matching any of `patterns`, as root-relative paths, sorted.
pub fn find_matching_files(root: &Path, patterns: &[String]) -> StepwiseResult<Vec<PathBuf>> {
    let set = compile_globset(patterns)?;
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            StepwiseError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg)),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let p = entry.path();
        let rel = p.strip_prefix(root).unwrap_or(p);
        if rel.components().any(|c| c.as_os_str() == "node_modules") {
            continue;
        }
        if set.is_match(rel) {
            out.push(rel.to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

fn compile_globset(patterns: &[String]) -> StepwiseResult<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let g = Glob::new(p).map_err(|e| StepwiseError::InvalidArgument(format!("invalid glob {p:?}: {e}")))?;
        b.add(g);
    }
    b.build()
        .map_err(|e| StepwiseError::InvalidArgument(format!("invalid globset: {e}")))
}

/// Root-relative path rendered with `/` separators, used as a module's file identifier.
pub fn file_id_for(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Output location for an instrumented file: TypeScript extensions become their JS counterparts.
pub fn instrumented_output_path(out_dir: &Path, rel: &Path) -> PathBuf {
    let ext = rel.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mapped = match ext {
        "ts" => Some("js"),
        "tsx" => Some("jsx"),
        "mts" => Some("mjs"),
        "cts" => Some("cjs"),
        _ => None,
    };
    let rel = match mapped {
        Some(new_ext) => rel.with_extension(new_ext),
        None => rel.to_path_buf(),
    };
    out_dir.join(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typescript_outputs_are_renamed() {
        let out = instrumented_output_path(Path::new("out"), Path::new("src/a.ts"));
        assert_eq!(out, Path::new("out").join("src").join("a.js"));
        let out = instrumented_output_path(Path::new("out"), Path::new("b.tsx"));
        assert_eq!(out, Path::new("out").join("b.jsx"));
        let out = instrumented_output_path(Path::new("out"), Path::new("c.js"));
        assert_eq!(out, Path::new("out").join("c.js"));
    }

    #[test]
    fn file_ids_use_forward_slashes() {
        let rel = Path::new("src").join("math").join("add.js");
        assert_eq!(file_id_for(&rel), "src/math/add.js");
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let err = find_matching_files(Path::new("."), &["[".to_string()]).expect_err("must fail");
        assert!(err.to_string().contains("invalid glob"));
    }
}
