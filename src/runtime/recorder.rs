//! Runtime recorder: turns recorder calls into numbered steps.
//!
//! Each host stream (one process or worker thread) keeps its own case state;
//! all streams share one sink. Within a stream cases must arrive one at a
//! time; concurrent cases in the same stream interleave their numbering and
//! nothing here guards against that.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    epoch_millis, CaseKey, Config, Step, StepSink, SuiteContext, StepwiseResult, UNKNOWN_TEST,
};

/// Placeholder for a binding whose read failed (e.g. still in its temporal dead zone).
pub const UNAVAILABLE: &str = "[unavailable]";
/// Placeholder for a binding whose value could not be serialized.
pub const UNSERIALIZABLE: &str = "[unserializable]";

const ARGUMENTS: &str = "arguments";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("binding unavailable: {0}")]
    Unavailable(String),
    #[error("binding not serializable: {0}")]
    Unserializable(String),
}

impl CaptureError {
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => UNAVAILABLE,
            Self::Unserializable(_) => UNSERIALIZABLE,
        }
    }
}

/// The bindings object handed to `record`: ordered names and a fallible read per name.
pub trait Bindings {
    fn names(&self) -> Vec<String>;
    fn read(&self, name: &str) -> Result<Value, CaptureError>;
}

impl Bindings for Map<String, Value> {
    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn read(&self, name: &str) -> Result<Value, CaptureError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CaptureError::Unavailable(format!("no binding named {name}")))
    }
}

#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Bucket for steps outside any declared suite.
    pub suite_name: String,
    pub max_vars: Option<usize>,
    /// File identifier used when a call does not carry one.
    pub filename: String,
}

impl RecorderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            suite_name: config.suite_name.clone(),
            max_vars: config.max_vars,
            filename: config.fallback_file_id().to_string(),
        }
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One recorder call as it arrives from instrumented code.
#[derive(Clone, Copy)]
pub struct RecordCall<'a> {
    pub line: u32,
    pub column: u32,
    pub bindings: &'a dyn Bindings,
    pub return_position: bool,
    pub file: Option<&'a str>,
    /// Host-side capture time; the recorder's clock is used when absent.
    pub ts: Option<u64>,
}

#[derive(Debug, Clone)]
struct ActiveCase {
    name: String,
    suite_path: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub cases: u64,
    pub steps_written: u64,
    pub steps_dropped: u64,
}

/// Stream id for calls that do not name one.
pub const DEFAULT_STREAM: &str = "";

/// Case bookkeeping for one host stream (one process or worker thread).
#[derive(Debug, Default)]
struct StreamState {
    counter: u64,
    suites: SuiteContext,
    active: Option<ActiveCase>,
}

impl StreamState {
    fn current_case(&self, options: &RecorderOptions) -> CaseKey {
        match &self.active {
            Some(ActiveCase {
                name,
                suite_path: Some(path),
            }) => CaseKey::new(path.clone(), name.clone()),
            Some(ActiveCase {
                name,
                suite_path: None,
            }) => CaseKey::new(self.suites.path_or(&options.suite_name), name.clone()),
            None => CaseKey::new(self.suites.path_or(&options.suite_name), UNKNOWN_TEST),
        }
    }
}

pub struct Recorder<S: StepSink> {
    options: RecorderOptions,
    streams: HashMap<String, StreamState>,
    /// Numbering of the reserved "unknown test" buckets, keyed by suite path.
    /// Shared by every stream since they all land in the same directories.
    idle_counters: HashMap<Vec<String>, u64>,
    stats: RecorderStats,
    sink: S,
}

impl<S: StepSink> Recorder<S> {
    pub fn new(options: RecorderOptions, sink: S) -> Self {
        Self {
            options,
            streams: HashMap::new(),
            idle_counters: HashMap::new(),
            stats: RecorderStats::default(),
            sink,
        }
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number of host streams seen so far.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Case state for one host stream. All streams write through the same sink.
    pub fn stream(&mut self, id: &str) -> StreamRecorder<'_, S> {
        let state = self.streams.entry(id.to_string()).or_default();
        StreamRecorder {
            options: &self.options,
            state,
            idle_counters: &mut self.idle_counters,
            stats: &mut self.stats,
            sink: &mut self.sink,
        }
    }

    pub fn reset(&mut self) {
        self.stream(DEFAULT_STREAM).reset();
    }

    pub fn enter_suite(&mut self, name: &str) {
        self.stream(DEFAULT_STREAM).enter_suite(name);
    }

    pub fn exit_suite(&mut self) {
        self.stream(DEFAULT_STREAM).exit_suite();
    }

    pub fn start_case(&mut self, name: &str, suite_path: Option<Vec<String>>) {
        self.stream(DEFAULT_STREAM).start_case(name, suite_path);
    }

    pub fn end_case(&mut self) {
        self.stream(DEFAULT_STREAM).end_case();
    }

    /// Records one step. Never fails: capture problems become placeholders
    /// and persistence problems drop the step with a warning.
    pub fn record(
        &mut self,
        line: u32,
        column: u32,
        bindings: &dyn Bindings,
        return_position: bool,
        file: Option<&str>,
    ) {
        self.record_call(RecordCall {
            line,
            column,
            bindings,
            return_position,
            file,
            ts: None,
        });
    }

    pub fn record_call(&mut self, call: RecordCall<'_>) {
        self.stream(DEFAULT_STREAM).record_call(call);
    }
}

/// A recorder narrowed to one host stream.
pub struct StreamRecorder<'r, S: StepSink> {
    options: &'r RecorderOptions,
    state: &'r mut StreamState,
    idle_counters: &'r mut HashMap<Vec<String>, u64>,
    stats: &'r mut RecorderStats,
    sink: &'r mut S,
}

impl<S: StepSink> StreamRecorder<'_, S> {
    /// Zeroes the step counter. Only the case wrapper calls this, right before a case body runs.
    pub fn reset(&mut self) {
        self.state.counter = 0;
    }

    pub fn enter_suite(&mut self, name: &str) {
        self.state.suites.push(name);
    }

    pub fn exit_suite(&mut self) {
        if self.state.suites.pop().is_none() {
            tracing::debug!("suite exit without a matching enter");
        }
    }

    /// Activates a case and restarts numbering at 1.
    ///
    /// `suite_path` is the suite stack captured when the case was declared;
    /// without it the live stack is used.
    pub fn start_case(&mut self, name: &str, suite_path: Option<Vec<String>>) {
        self.reset();
        self.stats.cases += 1;
        self.state.active = Some(ActiveCase {
            name: name.to_string(),
            suite_path: suite_path.filter(|p| !p.is_empty()),
        });
        tracing::debug!(case = name, "case started");
    }

    pub fn end_case(&mut self) {
        if let Some(case) = self.state.active.take() {
            tracing::debug!(case = %case.name, steps = self.state.counter, "case finished");
        }
    }

    pub fn record_call(&mut self, call: RecordCall<'_>) {
        let case = self.state.current_case(self.options);
        // Out-of-case steps never touch the case counter: it is reset by every
        // case start and would hand out numbers already used in the bucket.
        let step_number = if self.state.active.is_some() {
            self.state.counter += 1;
            self.state.counter
        } else {
            let counter = self.idle_counters.entry(case.suite_path.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let step = Step {
            step_number,
            file: call
                .file
                .filter(|f| !f.is_empty())
                .unwrap_or(&self.options.filename)
                .to_string(),
            line: call.line,
            column: call.column,
            vars: capture_vars(call.bindings, self.options.max_vars),
            ts: call.ts.unwrap_or_else(epoch_millis),
            suite: case.suite_label(),
            test: case.test.clone(),
            return_position: call.return_position,
        };
        match self.sink.accept(&case, &step) {
            Ok(()) => self.stats.steps_written += 1,
            Err(err) => {
                self.stats.steps_dropped += 1;
                tracing::warn!(step = step.step_number, test = %step.test, "dropping step: {err}");
            }
        }
    }
}

/// Shallow copy of `bindings` in declaration order, guarded per binding and
/// capped at `max_vars` entries.
pub fn capture_vars(bindings: &dyn Bindings, max_vars: Option<usize>) -> Map<String, Value> {
    let limit = max_vars.unwrap_or(usize::MAX);
    let mut vars = Map::new();
    for name in bindings.names() {
        if vars.len() >= limit {
            break;
        }
        if name == ARGUMENTS {
            continue;
        }
        let value = match bindings.read(&name) {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(binding = %name, "{err}");
                Value::String(err.placeholder().to_string())
            }
        };
        vars.insert(name, value);
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Flaky {
        names: Vec<&'static str>,
    }

    impl Bindings for Flaky {
        fn names(&self) -> Vec<String> {
            self.names.iter().map(|s| s.to_string()).collect()
        }

        fn read(&self, name: &str) -> Result<Value, CaptureError> {
            match name {
                "tdz" => Err(CaptureError::Unavailable("ReferenceError".to_string())),
                "cyclic" => Err(CaptureError::Unserializable("cycle".to_string())),
                other => Ok(json!(other.len())),
            }
        }
    }

    fn bindings(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn recorder(max_vars: Option<usize>) -> Recorder<Vec<Step>> {
        Recorder::new(
            RecorderOptions {
                max_vars,
                ..RecorderOptions::default()
            },
            Vec::new(),
        )
    }

    #[test]
    fn numbering_restarts_for_each_case() {
        let mut rec = recorder(None);
        let empty = Map::new();
        rec.start_case("first", None);
        for line in 1..=5 {
            rec.record(line, 0, &empty, false, Some("a.js"));
        }
        rec.end_case();
        rec.start_case("second", None);
        rec.record(9, 0, &empty, false, Some("a.js"));
        rec.record(10, 0, &empty, false, Some("a.js"));

        let steps = rec.into_sink();
        let second: Vec<u64> = steps.iter().filter(|s| s.test == "second").map(|s| s.step_number).collect();
        assert_eq!(second, vec![1, 2]);
        let first: Vec<u64> = steps.iter().filter(|s| s.test == "first").map(|s| s.step_number).collect();
        assert_eq!(first, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn max_vars_bounds_every_step_in_declaration_order() {
        let vars = bindings(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3)), ("d", json!(4))]);
        for k in 0..=5 {
            let mut rec = recorder(Some(k));
            rec.record(1, 0, &vars, false, None);
            let steps = rec.into_sink();
            let keys: Vec<&str> = steps[0].vars.keys().map(String::as_str).collect();
            assert_eq!(keys.len(), k.min(4));
            assert_eq!(keys, ["a", "b", "c", "d"][..k.min(4)].to_vec());
        }
    }

    #[test]
    fn failing_reads_become_placeholders_without_aborting_the_step() {
        let mut rec = recorder(None);
        rec.record(1, 0, &Flaky { names: vec!["ok", "tdz", "cyclic", "fine"] }, false, None);
        let steps = rec.into_sink();
        let vars = &steps[0].vars;
        assert_eq!(vars["ok"], json!(2));
        assert_eq!(vars["tdz"], json!(UNAVAILABLE));
        assert_eq!(vars["cyclic"], json!(UNSERIALIZABLE));
        assert_eq!(vars["fine"], json!(4));
    }

    #[test]
    fn arguments_pseudo_binding_is_never_recorded() {
        let vars = bindings(&[("arguments", json!([1, 2])), ("a", json!(1))]);
        let mut rec = recorder(Some(1));
        rec.record(1, 0, &vars, false, None);
        let steps = rec.into_sink();
        assert!(!steps[0].vars.contains_key("arguments"));
        assert_eq!(steps[0].vars["a"], json!(1));
    }

    #[test]
    fn steps_outside_suites_and_cases_use_reserved_buckets() {
        let mut rec = recorder(None);
        rec.record(1, 0, &Map::new(), false, None);
        rec.enter_suite("Math");
        rec.record(2, 0, &Map::new(), false, None);
        let steps = rec.into_sink();
        assert_eq!(steps[0].suite, "no suite");
        assert_eq!(steps[0].test, "unknown test");
        assert_eq!(steps[0].file, "unknown");
        assert_eq!(steps[1].suite, "Math");
        assert_eq!(steps[1].test, "unknown test");
    }

    #[test]
    fn out_of_case_steps_keep_their_own_numbering_across_cases() {
        let mut rec = recorder(None);
        let empty = Map::new();
        rec.enter_suite("Math");
        for case in ["adds", "subtracts"] {
            rec.start_case(case, Some(vec!["Math".to_string()]));
            rec.record(2, 0, &empty, false, None);
            rec.record(3, 0, &empty, false, None);
            rec.end_case();
            // the statement after `it(...)` runs outside any case
            rec.record(5, 0, &empty, false, None);
        }
        rec.exit_suite();

        let steps = rec.into_sink();
        let idle: Vec<u64> = steps
            .iter()
            .filter(|s| s.test == UNKNOWN_TEST)
            .map(|s| s.step_number)
            .collect();
        assert_eq!(idle, vec![1, 2]);
        let subtracts: Vec<u64> = steps.iter().filter(|s| s.test == "subtracts").map(|s| s.step_number).collect();
        assert_eq!(subtracts, vec![1, 2]);
    }

    #[test]
    fn streams_keep_separate_cases_over_one_sink() {
        let mut rec = recorder(None);
        let empty = Map::new();
        rec.stream("100:0").start_case("case-A", Some(vec!["S".to_string()]));
        rec.stream("200:0").start_case("case-B", Some(vec!["S".to_string()]));
        for line in 1..=3 {
            for id in ["100:0", "200:0"] {
                rec.stream(id).record_call(RecordCall {
                    line,
                    column: 0,
                    bindings: &empty,
                    return_position: false,
                    file: Some(id),
                    ts: Some(1),
                });
            }
        }
        rec.stream("200:0").end_case();
        assert_eq!(rec.stream_count(), 2);
        assert_eq!(rec.stats().cases, 2);

        let steps = rec.into_sink();
        for (case, file) in [("case-A", "100:0"), ("case-B", "200:0")] {
            let numbers: Vec<u64> = steps.iter().filter(|s| s.test == case).map(|s| s.step_number).collect();
            assert_eq!(numbers, vec![1, 2, 3], "{case}");
            assert!(steps.iter().filter(|s| s.test == case).all(|s| s.file == file));
        }
    }

    #[test]
    fn declared_suite_path_wins_over_live_stack() {
        let mut rec = recorder(None);
        rec.enter_suite("Outer");
        rec.enter_suite("Inner");
        rec.exit_suite();
        rec.exit_suite();
        rec.start_case("runs later", Some(vec!["Outer".to_string(), "Inner".to_string()]));
        rec.record(3, 4, &Map::new(), true, Some("src/x.js"));
        rec.end_case();
        rec.record(5, 0, &Map::new(), false, Some("src/x.js"));

        let steps = rec.into_sink();
        assert_eq!(steps[0].suite, "Outer > Inner");
        assert_eq!(steps[0].test, "runs later");
        assert!(steps[0].return_position);
        assert_eq!(steps[1].test, "unknown test");
        assert_eq!(steps[1].suite, "no suite");
    }

    #[test]
    fn unbalanced_suite_exit_is_tolerated() {
        let mut rec = recorder(None);
        rec.exit_suite();
        rec.start_case("t", None);
        rec.record(1, 0, &Map::new(), false, None);
        assert_eq!(rec.stats().steps_written, 1);
        assert_eq!(rec.sink()[0].suite, "no suite");
    }

    struct Failing;

    impl StepSink for Failing {
        fn accept(&mut self, _case: &CaseKey, _step: &Step) -> StepwiseResult<()> {
            Err(crate::StepwiseError::Store {
                path: std::path::PathBuf::from("/ro"),
                message: "read-only".to_string(),
            })
        }
    }

    #[test]
    fn persistence_failure_drops_the_step_and_keeps_going() {
        let mut rec = Recorder::new(RecorderOptions::default(), Failing);
        rec.start_case("t", None);
        rec.record(1, 0, &Map::new(), false, None);
        rec.record(2, 0, &Map::new(), false, None);
        assert_eq!(
            rec.stats(),
            RecorderStats {
                cases: 1,
                steps_written: 0,
                steps_dropped: 2
            }
        );
    }
}
