//! Store inspection: which cases exist and whether their numbering is intact.

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{sanitize_segment, StepwiseError, StepwiseResult, UNKNOWN_TEST};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    /// Case directory relative to the store root, `/`-separated.
    pub path: String,
    pub steps: usize,
    pub contiguous: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<u64>,
    /// Steps recorded outside a declared suite or case.
    pub reserved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreReport {
    pub root: String,
    pub cases: Vec<CaseReport>,
    #[serde(rename = "totalSteps")]
    pub total_steps: usize,
}

impl StoreReport {
    /// True when a declared case is missing step numbers. Reserved buckets
    /// collect whatever ran outside a case and are not checked.
    pub fn has_gaps(&self) -> bool {
        self.cases.iter().any(|c| !c.reserved && !c.contiguous)
    }

    pub fn pretty(&self) -> String {
        let mut out = format!(
            "store={} cases={} steps={}\n",
            self.root,
            self.cases.len(),
            self.total_steps
        );
        for case in &self.cases {
            let status = if case.contiguous { "ok" } else { "GAPS" };
            let reserved = if case.reserved { " (reserved)" } else { "" };
            out.push_str(&format!("  {status:<4} {:>5}  {}{reserved}\n", case.steps, case.path));
            if !case.missing.is_empty() {
                let missing: Vec<String> = case.missing.iter().map(|n| n.to_string()).collect();
                out.push_str(&format!("         missing: {}\n", missing.join(",")));
            }
        }
        out.trim_end().to_string()
    }
}

/// Walks the store and groups `<N>.json` files by their case directory.
pub fn scan_store(root: &Path, suite_name: &str) -> StepwiseResult<StoreReport> {
    if !root.is_dir() {
        return Err(StepwiseError::Store {
            path: root.to_path_buf(),
            message: "store directory does not exist".to_string(),
        });
    }

    let mut by_case: BTreeMap<PathBuf, Vec<u64>> = BTreeMap::new();
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
        if p.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(number) = p
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        let Some(parent) = p.parent() else {
            continue;
        };
        let rel = parent.strip_prefix(root).unwrap_or(parent).to_path_buf();
        by_case.entry(rel).or_default().push(number);
    }

    let default_suite = sanitize_segment(suite_name);
    let unknown_test = sanitize_segment(UNKNOWN_TEST);
    let mut cases = Vec::with_capacity(by_case.len());
    let mut total_steps = 0usize;
    for (rel, mut numbers) in by_case {
        numbers.sort_unstable();
        numbers.dedup();
        let max = numbers.last().copied().unwrap_or(0);
        let missing: Vec<u64> = (1..=max).filter(|n| numbers.binary_search(n).is_err()).collect();
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let reserved = segments.first() == Some(&default_suite) || segments.last() == Some(&unknown_test);
        total_steps += numbers.len();
        cases.push(CaseReport {
            path: segments.join("/"),
            steps: numbers.len(),
            contiguous: missing.is_empty(),
            missing,
            reserved,
        });
    }

    Ok(StoreReport {
        root: root.display().to_string(),
        cases,
        total_steps,
    })
}
