//! Stepwise CLI entrypoint.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use stepwise::{Config, EventSource, InstrumentTarget, Reporter};

#[derive(Debug, Parser)]
#[command(name = "stepwise")]
#[command(about = "instrument JS/TS sources and record test runs as replayable step trees")]
struct Cli {
    /// Path to config file. Missing configs are treated as "defaults".
    #[arg(long, global = true, default_value = "stepwise.toml")]
    config: PathBuf,

    /// Working directory for execution.
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Log level.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    /// Machine-readable output to stdout (JSON).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Instrument one source file, or every matching file under --root
    Instrument {
        /// Single input file (omit with --root).
        #[arg(conflicts_with = "root", required_unless_present = "root")]
        input: Option<PathBuf>,

        /// Directory to instrument recursively.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Glob patterns relative to --root (defaults to all JS/TS sources).
        #[arg(long = "glob", requires = "root")]
        globs: Vec<String>,

        /// Output file (single-file mode) or directory (required with --root).
        #[arg(long)]
        out: Option<PathBuf>,

        /// File identifier embedded in recorder calls (single-file mode).
        #[arg(long, conflicts_with = "root")]
        file_id: Option<String>,
    },

    /// Print or write the JavaScript runtime prelude
    Prelude {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Turn a host event stream into the on-disk step store
    Ingest {
        /// NDJSON events file, or `-` for stdin.
        #[arg(default_value = "-")]
        events: PathBuf,

        /// Store root (defaults to `store_dir` from config).
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        reporter: Option<Reporter>,
    },

    /// Check every case in the step store for contiguous numbering
    Verify {
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        reporter: Option<Reporter>,
    },

    /// Print version/build metadata
    Version,

    /// Show a compact "what to use when" guide for each command, with examples.
    Usage,
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_global_args(std::env::args()));

    if let Err(err) = init_tracing(&cli.log) {
        eprintln!("warning: failed to init tracing: {err:#}");
    }

    let cwd = cli.cwd.clone().unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    if let Err(err) = std::env::set_current_dir(&cwd) {
        return print_error_and_exit(&cli, anyhow::anyhow!(err).context(format!("failed to set cwd to {}", cwd.display())));
    }

    let config = Config::load_optional(&cli.config);

    match run_command(&cli, &config) {
        Ok(code) => code,
        Err(err) => print_error_and_exit(&cli, err),
    }
}

fn normalize_global_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let all: Vec<String> = args.into_iter().collect();
    if all.is_empty() {
        return all;
    }

    let mut globals = Vec::new();
    let mut rest = Vec::new();

    let mut i = 1usize;
    while i < all.len() {
        let arg = &all[i];
        match arg.as_str() {
            "--json" => {
                globals.push(arg.clone());
                i += 1;
            }
            "--config" | "--cwd" | "--log" => {
                globals.push(arg.clone());
                if i + 1 < all.len() {
                    globals.push(all[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ if arg.starts_with("--config=") || arg.starts_with("--cwd=") || arg.starts_with("--log=") => {
                globals.push(arg.clone());
                i += 1;
            }
            _ => {
                rest.push(arg.clone());
                i += 1;
            }
        }
    }

    let mut normalized = Vec::with_capacity(all.len());
    normalized.push(all[0].clone());
    normalized.extend(globals);
    normalized.extend(rest);
    normalized
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Instrument {
            input,
            root,
            globs,
            out,
            file_id,
        } => {
            let target = match (root, input) {
                (Some(root), _) => InstrumentTarget::Tree {
                    root: root.clone(),
                    globs: globs.clone(),
                    out: out
                        .clone()
                        .ok_or_else(|| anyhow::anyhow!("--out <dir> is required with --root"))?,
                },
                (None, Some(path)) => InstrumentTarget::File {
                    path: path.clone(),
                    out: out.clone(),
                    file_id: file_id.clone(),
                },
                (None, None) => anyhow::bail!("pass an input file or --root <dir>"),
            };
            let report = stepwise::instrument_command(config, &target)?;
            if cli.json {
                print_json_or_text(cli, &report)?;
            } else if let [single] = report.files.as_slice() {
                match &single.code {
                    Some(code) => print!("{code}"),
                    None => println!("{}", report.pretty()),
                }
            } else {
                println!("{}", report.pretty());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Prelude { out } => {
            match out {
                Some(path) => {
                    stepwise::write_prelude(path)?;
                    if cli.json {
                        print_json_or_text(cli, &serde_json::json!({ "path": path.display().to_string() }))?;
                    } else {
                        println!("wrote {}", path.display());
                    }
                }
                None => print!("{}", stepwise::PRELUDE_JS),
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Ingest {
            events,
            store,
            reporter,
        } => {
            let summary = stepwise::ingest_command(config, &EventSource(events.clone()), store.as_deref())?;
            if wants_json(cli, config, *reporter) {
                print_json_or_text(cli, &summary)?;
            } else {
                println!("{}", summary.pretty());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Verify { store, reporter } => {
            let report = stepwise::verify_command(config, store.as_deref())?;
            if wants_json(cli, config, *reporter) {
                print_json_or_text(cli, &report)?;
            } else {
                println!("{}", report.pretty());
            }
            Ok(if report.has_gaps() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Version => {
            let info = stepwise::version_info();
            print_json_or_text(cli, &info)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Usage => {
            let doc = stepwise::usage_doc();
            if cli.json {
                print_json_or_text(cli, &doc)?;
            } else {
                println!("{}", doc.pretty());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn wants_json(cli: &Cli, config: &Config, reporter: Option<Reporter>) -> bool {
    cli.json || reporter.unwrap_or(config.reporter) == Reporter::Json
}

fn print_json_or_text<T: serde::Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

fn print_error_and_exit(cli: &Cli, err: anyhow::Error) -> ExitCode {
    let msg = format!("{err:#}");
    if cli.json {
        let out = serde_json::json!({
            "status": "error",
            "code": "error",
            "message": msg,
        });
        println!("{out}");
    } else {
        eprintln!("{msg}");
    }
    ExitCode::from(2)
}
