//! Stepwise core library: source instrumentation, step recording and the step store.

#[path = "runtime/clock.rs"]
mod clock;
#[path = "platform/config.rs"]
mod config;
#[path = "platform/envinfo.rs"]
mod envinfo;
#[path = "platform/error.rs"]
mod error;
#[path = "runtime/events.rs"]
mod events;
#[path = "platform/fsutil.rs"]
mod fsutil;
#[path = "cmd/ingest.rs"]
mod ingest_cmd;
#[path = "cmd/instrument.rs"]
mod instrument_cmd;
#[path = "runtime/prelude.rs"]
mod prelude;
#[path = "runtime/recorder.rs"]
mod recorder;
#[path = "model/reporting.rs"]
mod reporting;
#[path = "store/scan.rs"]
mod scan;
#[path = "store/step.rs"]
mod step;
#[path = "runtime/suite.rs"]
mod suite;
#[path = "cmd/usage.rs"]
mod usage;
#[path = "store/writer.rs"]
mod writer;

pub mod transform {
    pub mod instrument;
    pub mod normalize;
    pub mod pipeline;
    pub mod scope;
}

pub use clock::*;
pub use config::*;
pub use envinfo::*;
pub use error::*;
pub use events::*;
pub use fsutil::*;
pub use ingest_cmd::*;
pub use instrument_cmd::*;
pub use prelude::*;
pub use recorder::*;
pub use reporting::*;
pub use scan::*;
pub use step::*;
pub use suite::*;
pub use usage::*;
pub use writer::*;

pub use transform::instrument::{Instrumenter, ProbeKind, ProbeSite, RECORD_FN};
pub use transform::normalize::Normalizer;
pub use transform::pipeline::{instrument_source, InstrumentOptions, Instrumented, SourceSyntax};
