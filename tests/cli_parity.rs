use std::path::PathBuf;
use std::process::Command;

fn temp_workspace(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("stepwise-cli-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp workspace");
    root
}

fn run_cli(args: &[String]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_stepwise"))
        .args(args)
        .output()
        .expect("run cli")
}

fn parse_json_stdout(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout is a single json document")
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn global_flags_parse_before_and_after_the_subcommand() {
    for argv in [args(&["--json", "version"]), args(&["version", "--json"])] {
        let out = run_cli(&argv);
        assert!(out.status.success(), "{argv:?}: {}", String::from_utf8_lossy(&out.stderr));
        let doc = parse_json_stdout(&out);
        assert_eq!(doc["version"], env!("CARGO_PKG_VERSION"));
    }
}

#[test]
fn instrument_single_file_prints_code_with_configured_file_id() {
    let ws = temp_workspace("instrument");
    std::fs::write(ws.join("stepwise.toml"), "filename = \"lib/calc.js\"\n").expect("write config");
    std::fs::write(ws.join("calc.js"), "const a = 1;\nconst b = a + 1;\n").expect("write source");

    let out = run_cli(&args(&["instrument", "calc.js", "--cwd", ws.to_str().expect("utf8 path")]));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let code = String::from_utf8_lossy(&out.stdout);
    assert!(code.contains("__stepwiseRecord(2, 0"), "{code}");
    assert!(code.contains("\"lib/calc.js\""), "{code}");
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn instrument_tree_json_reports_probes_per_file() {
    let ws = temp_workspace("tree");
    std::fs::create_dir_all(ws.join("src")).expect("mkdir");
    std::fs::write(ws.join("src/a.js"), "let x = 1;\nx++;\n").expect("write");
    std::fs::write(ws.join("src/b.ts"), "const y: string = 'y';\n").expect("write");

    let out = run_cli(&args(&[
        "--json",
        "--cwd",
        ws.to_str().expect("utf8 path"),
        "instrument",
        "--root",
        "src",
        "--out",
        "build",
    ]));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let doc = parse_json_stdout(&out);
    assert_eq!(doc["totalProbes"], 3);
    assert_eq!(doc["files"][0]["fileId"], "a.js");
    assert_eq!(doc["files"][1]["fileId"], "b.ts");
    assert!(ws.join("build/b.js").is_file());
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn parse_failure_is_a_json_error_document_with_exit_two() {
    let ws = temp_workspace("parse-error");
    std::fs::write(ws.join("bad.js"), "const = 1;\n").expect("write");
    let out = run_cli(&args(&[
        "--json",
        "--cwd",
        ws.to_str().expect("utf8 path"),
        "instrument",
        "bad.js",
    ]));
    assert_eq!(out.status.code(), Some(2));
    let doc = parse_json_stdout(&out);
    assert_eq!(doc["status"], "error");
    assert!(doc["message"].as_str().unwrap_or_default().contains("parse error"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn prelude_out_writes_the_runtime() {
    let ws = temp_workspace("prelude");
    let path = ws.join("support").join("prelude.js");
    let out = run_cli(&args(&["prelude", "--out", path.to_str().expect("utf8 path")]));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let written = std::fs::read_to_string(&path).expect("prelude written");
    assert!(written.contains("__stepwiseRecord"));
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn ingest_then_verify_flags_gaps_with_exit_one() {
    let ws = temp_workspace("verify");
    let events = ws.join("events.ndjson");
    std::fs::write(
        &events,
        concat!(
            "{\"kind\":\"case_start\",\"name\":\"t\",\"suite\":[\"S\"]}\n",
            "{\"kind\":\"record\",\"line\":1,\"column\":0,\"vars\":{}}\n",
            "{\"kind\":\"record\",\"line\":2,\"column\":0,\"vars\":{}}\n",
            "{\"kind\":\"record\",\"line\":3,\"column\":0,\"vars\":{}}\n",
            "{\"kind\":\"case_end\"}\n",
        ),
    )
    .expect("write events");
    let store = ws.join("steps");
    let store_arg = store.to_str().expect("utf8 path");

    let out = run_cli(&args(&[
        "ingest",
        events.to_str().expect("utf8 path"),
        "--store",
        store_arg,
        "--json",
    ]));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(parse_json_stdout(&out)["stepsWritten"], 3);

    let ok = run_cli(&args(&["verify", "--store", store_arg, "--json"]));
    assert_eq!(ok.status.code(), Some(0));

    std::fs::remove_file(store.join("S").join("t").join("2.json")).expect("remove step");
    let gaps = run_cli(&args(&["verify", "--store", store_arg, "--json"]));
    assert_eq!(gaps.status.code(), Some(1));
    let doc = parse_json_stdout(&gaps);
    assert_eq!(doc["cases"][0]["missing"], serde_json::json!([2]));
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn verify_missing_store_is_an_error() {
    let ws = temp_workspace("nostore");
    let out = run_cli(&args(&[
        "verify",
        "--store",
        ws.join("absent").to_str().expect("utf8 path"),
    ]));
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&ws);
}
