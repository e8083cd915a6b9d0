//! Host event stream: NDJSON lines appended by the runtime prelude.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::io::BufRead;

use crate::{
    wall_time_iso_utc, Bindings, CaptureError, RecordCall, Recorder, StepSink, StepwiseResult,
    StreamRecorder, DEFAULT_STREAM,
};

/// Key carrying the tag of a non-JSON value encoded by the prelude.
pub const MARKER_KEY: &str = "$stepwise";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    SuiteEnter {
        name: String,
    },
    SuiteExit,
    CaseStart {
        name: String,
        /// Suite path captured when the case was declared.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suite: Option<Vec<String>>,
    },
    CaseEnd,
    Reset,
    Record {
        line: u32,
        column: u32,
        #[serde(default)]
        vars: Map<String, Value>,
        #[serde(default)]
        ret: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },
}

/// One event line: the event plus the id of the host stream that wrote it.
///
/// Several processes and worker threads append to the same file; the prelude
/// stamps each line with `<pid>:<threadId>`. Lines without an id belong to
/// the default stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(flatten)]
    pub event: HostEvent,
}

/// Bindings as encoded on the wire, with prelude markers decoded on read.
pub struct WireBindings<'a> {
    vars: &'a Map<String, Value>,
}

impl<'a> WireBindings<'a> {
    pub fn new(vars: &'a Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl Bindings for WireBindings<'_> {
    fn names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    fn read(&self, name: &str) -> Result<Value, CaptureError> {
        match self.vars.get(name) {
            Some(value) => decode_top(name, value),
            None => Err(CaptureError::Unavailable(format!("no binding named {name}"))),
        }
    }
}

fn decode_top(name: &str, value: &Value) -> Result<Value, CaptureError> {
    match marker(value) {
        Some("unavailable") => Err(CaptureError::Unavailable(detail(value, name))),
        Some("unserializable") => Err(CaptureError::Unserializable(detail(value, name))),
        _ => Ok(decode_value(value)),
    }
}

fn marker(value: &Value) -> Option<&str> {
    value.as_object()?.get(MARKER_KEY)?.as_str()
}

fn detail(value: &Value, name: &str) -> String {
    value
        .get("reason")
        .and_then(Value::as_str)
        .map(|r| format!("{name}: {r}"))
        .unwrap_or_else(|| name.to_string())
}

/// Replaces nested markers with their display strings.
pub fn decode_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(decode_value).collect()),
        Value::Object(map) => match marker(value) {
            Some(tag) => Value::String(marker_text(tag, map)),
            None => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), decode_value(v)))
                    .collect(),
            ),
        },
        other => other.clone(),
    }
}

fn marker_text(tag: &str, map: &Map<String, Value>) -> String {
    let field = |key: &str| map.get(key).and_then(Value::as_str).unwrap_or("");
    match tag {
        "undefined" => "[undefined]".to_string(),
        "promise" => "[Promise]".to_string(),
        "function" if field("name").is_empty() => "[Function (anonymous)]".to_string(),
        "function" => format!("[Function {}]", field("name")),
        "symbol" => format!("Symbol({})", field("description")),
        "bigint" => format!("{}n", field("value")),
        "unavailable" => crate::UNAVAILABLE.to_string(),
        "unserializable" => crate::UNSERIALIZABLE.to_string(),
        "truncated" => "[Truncated]".to_string(),
        other => format!("[{other}]"),
    }
}

pub fn apply_event<S: StepSink>(recorder: &mut StreamRecorder<'_, S>, event: HostEvent) {
    match event {
        HostEvent::SuiteEnter { name } => recorder.enter_suite(&name),
        HostEvent::SuiteExit => recorder.exit_suite(),
        HostEvent::CaseStart { name, suite } => recorder.start_case(&name, suite),
        HostEvent::CaseEnd => recorder.end_case(),
        HostEvent::Reset => recorder.reset(),
        HostEvent::Record {
            line,
            column,
            vars,
            ret,
            file,
            ts,
        } => {
            let bindings = WireBindings::new(&vars);
            recorder.record_call(RecordCall {
                line,
                column,
                bindings: &bindings,
                return_position: ret,
                file: file.as_deref(),
                ts,
            });
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub events: u64,
    pub streams: u64,
    pub cases: u64,
    pub steps_written: u64,
    pub steps_dropped: u64,
    pub malformed_lines: u64,
    pub started_at: String,
    pub finished_at: String,
}

impl IngestSummary {
    pub fn pretty(&self) -> String {
        format!(
            "events={} streams={} cases={} steps={} dropped={} malformed={}\nstarted={} finished={}",
            self.events,
            self.streams,
            self.cases,
            self.steps_written,
            self.steps_dropped,
            self.malformed_lines,
            self.started_at,
            self.finished_at
        )
    }
}

/// Feeds every event line from `reader` to `recorder`, in order, routing
/// each line to the state of the stream that wrote it.
pub fn ingest<R: BufRead, S: StepSink>(
    reader: R,
    recorder: &mut Recorder<S>,
) -> StepwiseResult<IngestSummary> {
    let started_at = wall_time_iso_utc();
    let before = recorder.stats();
    let mut events = 0u64;
    let mut malformed = 0u64;
    let mut streams = std::collections::HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<StreamEvent>(trimmed) {
            Ok(StreamEvent { stream, event }) => {
                events += 1;
                let id = stream.as_deref().unwrap_or(DEFAULT_STREAM);
                if !streams.contains(id) {
                    streams.insert(id.to_string());
                }
                apply_event(&mut recorder.stream(id), event);
            }
            Err(err) => {
                malformed += 1;
                tracing::warn!(line = idx + 1, "skipping malformed event: {err}");
            }
        }
    }

    let after = recorder.stats();
    let summary = IngestSummary {
        events,
        streams: streams.len() as u64,
        cases: after.cases - before.cases,
        steps_written: after.steps_written - before.steps_written,
        steps_dropped: after.steps_dropped - before.steps_dropped,
        malformed_lines: malformed,
        started_at,
        finished_at: wall_time_iso_utc(),
    };
    tracing::info!(
        events = summary.events,
        streams = summary.streams,
        steps = summary.steps_written,
        dropped = summary.steps_dropped,
        "ingest finished"
    );
    Ok(summary)
}
