//! Source-to-source pipeline: parse, strip types, normalize, instrument, emit.
//!
//! Pure and synchronous; one call per compiled unit.

use serde::{Deserialize, Serialize};
use swc_core::common::{sync::Lrc, FileName, Globals, Mark, SourceMap, Spanned, GLOBALS};
use swc_core::ecma::ast::{EsVersion, Program};
use swc_core::ecma::codegen::{text_writer::JsWriter, Config as CodegenConfig, Emitter};
use swc_core::ecma::parser::{parse_file_as_program, EsSyntax, Syntax, TsSyntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::transforms::typescript::strip;
use swc_core::ecma::visit::VisitMutWith;

use std::path::Path;

use crate::transform::instrument::{Instrumenter, ProbeSite};
use crate::transform::normalize::Normalizer;
use crate::{StepwiseError, StepwiseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSyntax {
    /// ECMAScript with JSX enabled.
    EcmaScript,
    TypeScript,
    Tsx,
}

impl SourceSyntax {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("ts" | "mts" | "cts") => Self::TypeScript,
            Some("tsx") => Self::Tsx,
            _ => Self::EcmaScript,
        }
    }

    pub fn is_typescript(self) -> bool {
        matches!(self, Self::TypeScript | Self::Tsx)
    }

    fn to_swc(self) -> Syntax {
        match self {
            Self::EcmaScript => Syntax::Es(EsSyntax {
                jsx: true,
                decorators: true,
                ..Default::default()
            }),
            Self::TypeScript => Syntax::Typescript(TsSyntax {
                decorators: true,
                ..Default::default()
            }),
            Self::Tsx => Syntax::Typescript(TsSyntax {
                tsx: true,
                decorators: true,
                ..Default::default()
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentOptions {
    /// Identifier embedded literally in every recorder call of this unit.
    pub file_id: String,
    pub syntax: SourceSyntax,
}

impl InstrumentOptions {
    pub fn new(file_id: impl Into<String>, syntax: SourceSyntax) -> Self {
        Self {
            file_id: file_id.into(),
            syntax,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrumented {
    pub code: String,
    pub probes: Vec<ProbeSite>,
}

pub fn instrument_source(source: &str, options: &InstrumentOptions) -> StepwiseResult<Instrumented> {
    let (cm, program) = parse_program(source, &options.file_id, options.syntax)?;

    let (program, probes) = GLOBALS.set(&Globals::new(), || {
        let mut program = program;
        if options.syntax.is_typescript() {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();
            program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, true));
            program.visit_mut_with(&mut strip(unresolved_mark, top_level_mark));
        }
        program.visit_mut_with(&mut Normalizer);
        let mut instrumenter = Instrumenter::new(cm.clone(), options.file_id.clone());
        program.visit_mut_with(&mut instrumenter);
        (program, instrumenter.into_probes())
    });

    let code = emit_program(&cm, &program, &options.file_id)?;
    tracing::debug!(file = %options.file_id, probes = probes.len(), "instrumented");
    Ok(Instrumented { code, probes })
}

/// Parses `source`; any error, recovered or not, fails the unit.
pub(crate) fn parse_program(
    source: &str,
    file_id: &str,
    syntax: SourceSyntax,
) -> StepwiseResult<(Lrc<SourceMap>, Program)> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(file_id.to_string())),
        source.to_string(),
    );
    let mut recovered = Vec::new();
    let parsed = parse_file_as_program(&fm, syntax.to_swc(), EsVersion::latest(), None, &mut recovered);
    let program = parsed.map_err(|err| parse_error(&cm, file_id, &err))?;
    if let Some(err) = recovered.first() {
        return Err(parse_error(&cm, file_id, err));
    }
    Ok((cm, program))
}

fn parse_error(cm: &Lrc<SourceMap>, file_id: &str, err: &swc_core::ecma::parser::error::Error) -> StepwiseError {
    let loc = cm.lookup_char_pos(err.span().lo);
    StepwiseError::Parse {
        file: file_id.to_string(),
        line: loc.line,
        column: loc.col.0,
        message: err.kind().msg().to_string(),
    }
}

pub(crate) fn emit_program(cm: &Lrc<SourceMap>, program: &Program, file_id: &str) -> StepwiseResult<String> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_target(EsVersion::latest()),
            cm: cm.clone(),
            comments: None,
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_program(program).map_err(|e| StepwiseError::Emit {
            file: file_id.to_string(),
            message: e.to_string(),
        })?;
    }
    String::from_utf8(buf).map_err(|e| StepwiseError::Emit {
        file: file_id.to_string(),
        message: e.to_string(),
    })
}
