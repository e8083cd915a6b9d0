//! `stepwise usage`: a compact "what to use when" guide.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDoc {
    pub title: String,
    pub items: Vec<UsageItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageItem {
    pub command: String,
    pub when: String,
    pub how: String,
}

impl UsageDoc {
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n\n", self.title));
        for item in &self.items {
            out.push_str(&format!("{}:\n", item.command));
            out.push_str(&format!("  when: {}\n", item.when));
            out.push_str(&format!("  how:  {}\n\n", item.how));
        }
        out.trim_end().to_string()
    }
}

fn item(command: &str, when: &str, how: &str) -> UsageItem {
    UsageItem {
        command: command.to_string(),
        when: when.to_string(),
        how: how.to_string(),
    }
}

pub fn usage_doc() -> UsageDoc {
    UsageDoc {
        title: "Stepwise CLI usage (instrument, run your tests, ingest, inspect)".to_string(),
        items: vec![
            item(
                "stepwise instrument",
                "Rewrite JS/TS sources so every executed statement and function entry reports a step.",
                "stepwise instrument src/calc.ts --out build/calc.js --file-id src/calc.ts; or a whole tree: stepwise instrument --root src --glob '**/*.ts' --out build. File ids default to the root-relative path in tree mode and to `filename` from stepwise.toml in single-file mode.",
            ),
            item(
                "stepwise prelude",
                "Get the JavaScript runtime that defines the recorder and wraps describe/it/test.",
                "stepwise prelude --out build/stepwise-prelude.js, then run your tests with `node -r ./build/stepwise-prelude.js` (or list it as a setup file) and STEPWISE_EVENTS=/tmp/events.ndjson.",
            ),
            item(
                "stepwise ingest",
                "Turn the recorded host event stream into the on-disk step tree.",
                "stepwise ingest /tmp/events.ndjson --store .stepwise/steps (use `-` for stdin). Clear the store between independent runs; existing step files are never overwritten.",
            ),
            item(
                "stepwise verify",
                "Check that every case directory holds a contiguous 1..N step sequence.",
                "stepwise verify --store .stepwise/steps --json; exits 1 when a declared case has gaps; reserved buckets are listed but never fail it.",
            ),
            item(
                "stepwise version",
                "Print version/build metadata for bug reports and CI logs.",
                "stepwise version --json.",
            ),
        ],
    }
}
