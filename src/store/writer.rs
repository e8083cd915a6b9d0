//! Persistence writer: one JSON file per step under
//! `<root>/<suite>/.../<case>/<stepNumber>.json`.
//!
//! Step files are created, never rewritten. Clearing the store between runs
//! is the caller's job.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::{CaseKey, Step, StepwiseError, StepwiseResult};

/// Receives every step the recorder assembles.
pub trait StepSink {
    fn accept(&mut self, case: &CaseKey, step: &Step) -> StepwiseResult<()>;
}

impl StepSink for Vec<Step> {
    fn accept(&mut self, _case: &CaseKey, step: &Step) -> StepwiseResult<()> {
        self.push(step.clone());
        Ok(())
    }
}

impl<S: StepSink + ?Sized> StepSink for &mut S {
    fn accept(&mut self, case: &CaseKey, step: &Step) -> StepwiseResult<()> {
        (**self).accept(case, step)
    }
}

#[derive(Debug, Clone)]
pub struct StepWriter {
    root: PathBuf,
}

impl StepWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the steps of `case`; each name is sanitized on its own.
    pub fn case_dir(&self, case: &CaseKey) -> PathBuf {
        let mut dir = self.root.clone();
        for suite in &case.suite_path {
            dir.push(sanitize_segment(suite));
        }
        dir.push(sanitize_segment(&case.test));
        dir
    }

    pub fn write(&self, case: &CaseKey, step: &Step) -> StepwiseResult<PathBuf> {
        let dir = self.case_dir(case);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", step.step_number));
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StepwiseError::Store {
                    path,
                    message: "step file already exists (store not cleared, or duplicate case name)".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = serde_json::to_vec_pretty(step)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(path)
    }
}

impl StepSink for StepWriter {
    fn accept(&mut self, case: &CaseKey, step: &Step) -> StepwiseResult<()> {
        let path = self.write(case, step)?;
        tracing::trace!(path = %path.display(), "step written");
        Ok(())
    }
}

/// Collapses every run of path-unsafe characters into a single `_`.
pub fn sanitize_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.chars() {
        if is_path_unsafe(ch) {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn is_path_unsafe(ch: char) -> bool {
    matches!(ch, '/' | '\\' | ':' | '.' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch.is_whitespace()
        || ch.is_control()
}
