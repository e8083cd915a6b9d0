//! `stepwise instrument`: single-file and multi-file source rewriting.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{
    file_id_for, find_matching_files, instrument_source, instrumented_output_path, Config,
    InstrumentOptions, ProbeSite, SourceSyntax, StepwiseError, StepwiseResult, DEFAULT_SOURCE_GLOBS,
};

#[derive(Debug, Clone)]
pub enum InstrumentTarget {
    /// One compiled unit. Without `out` the code is returned in the report.
    File {
        path: PathBuf,
        out: Option<PathBuf>,
        file_id: Option<String>,
    },
    /// Every matching file under `root`, mirrored under `out`.
    Tree {
        root: PathBuf,
        globs: Vec<String>,
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentedFile {
    pub file_id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub probes: Vec<ProbeSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentReport {
    pub files: Vec<InstrumentedFile>,
    pub total_probes: usize,
}

impl InstrumentReport {
    pub fn pretty(&self) -> String {
        let mut out = format!("files={} probes={}\n", self.files.len(), self.total_probes);
        for f in &self.files {
            let dest = f.output.as_deref().unwrap_or("-");
            out.push_str(&format!("  {:>5}  {} -> {}\n", f.probes.len(), f.file_id, dest));
        }
        out.trim_end().to_string()
    }
}

pub fn instrument_command(config: &Config, target: &InstrumentTarget) -> StepwiseResult<InstrumentReport> {
    let files = match target {
        InstrumentTarget::File { path, out, file_id } => {
            let file_id = file_id
                .clone()
                .or_else(|| config.filename.clone())
                .unwrap_or_else(|| path.to_string_lossy().replace('\\', "/"));
            vec![instrument_one(path, &file_id, out.as_deref())?]
        }
        InstrumentTarget::Tree { root, globs, out } => instrument_tree(root, globs, out)?,
    };
    let total_probes = files.iter().map(|f| f.probes.len()).sum();
    Ok(InstrumentReport { files, total_probes })
}

fn instrument_tree(root: &Path, globs: &[String], out: &Path) -> StepwiseResult<Vec<InstrumentedFile>> {
    if !root.is_dir() {
        return Err(StepwiseError::InvalidArgument(format!(
            "instrument root {} is not a directory",
            root.display()
        )));
    }
    let patterns: Vec<String> = if globs.is_empty() {
        DEFAULT_SOURCE_GLOBS.iter().map(|s| s.to_string()).collect()
    } else {
        globs.to_vec()
    };
    // Earlier output under the root must not be instrumented twice.
    let out_rel = out.strip_prefix(root).ok().map(Path::to_path_buf);

    let mut files = Vec::new();
    for rel in find_matching_files(root, &patterns)? {
        if let Some(skip) = &out_rel {
            if !skip.as_os_str().is_empty() && rel.starts_with(skip) {
                continue;
            }
        }
        let dest = instrumented_output_path(out, &rel);
        files.push(instrument_one(&root.join(&rel), &file_id_for(&rel), Some(&dest))?);
    }
    tracing::info!(root = %root.display(), files = files.len(), "instrumented tree");
    Ok(files)
}

fn instrument_one(path: &Path, file_id: &str, out: Option<&Path>) -> StepwiseResult<InstrumentedFile> {
    let source = std::fs::read_to_string(path)?;
    let options = InstrumentOptions::new(file_id, SourceSyntax::from_path(path));
    let instrumented = instrument_source(&source, &options)?;

    let (output, code) = match out {
        Some(dest) => {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, &instrumented.code)?;
            (Some(dest.display().to_string()), None)
        }
        None => (None, Some(instrumented.code)),
    };

    Ok(InstrumentedFile {
        file_id: file_id.to_string(),
        source: path.display().to_string(),
        output,
        probes: instrumented.probes,
        code,
    })
}
