//! specdrill CLI - generate and run API smoke tests from an OpenAPI document

mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use specdrill_core::{Config, StatusPolicy, TestSummary, TracingLogger, to_http_file};
use specdrill_runner::{Executor, Loader};

const CONFIG_FILE: &str = ".specdrill.toml";

#[derive(Parser)]
#[command(name = "specdrill")]
#[command(about = "Generate and run API smoke tests from an OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (per-case log events on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document, generate one case per operation, and run them
    Run {
        /// OpenAPI document: local path or http(s) URL
        #[arg(short, long)]
        spec: Option<String>,

        /// Server to test (required for local documents)
        #[arg(short, long)]
        base_url: Option<String>,

        /// Config file (default: .specdrill.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Concurrent workers (1 = sequential)
        #[arg(short, long)]
        workers: Option<usize>,

        /// How expected statuses are derived
        #[arg(long)]
        expect: Option<ExpectArg>,

        /// Show generated cases without sending requests
        #[arg(long)]
        dry_run: bool,

        /// Output directory for reproduction files
        #[arg(short, long, default_value = ".specdrill")]
        output_dir: String,

        /// Dump every executed case to JSONL files
        #[arg(long)]
        dump: bool,

        /// Directory for dump files (default: .specdrill/dumps)
        #[arg(long)]
        dump_dir: Option<String>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the summary report
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExpectArg {
    /// Always expect 200
    AnySuccess,
    /// Expect the first declared 2xx code
    Declared,
}

impl From<ExpectArg> for StatusPolicy {
    fn from(arg: ExpectArg) -> Self {
        match arg {
            ExpectArg::AnySuccess => StatusPolicy::AnySuccess,
            ExpectArg::Declared => StatusPolicy::Declared,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_directive = if verbose {
        "specdrill=info"
    } else {
        "specdrill=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            spec,
            base_url,
            config,
            timeout,
            workers,
            expect,
            dry_run,
            output_dir,
            dump,
            dump_dir,
        } => {
            let mut cfg = match config {
                Some(path) => Config::load(Path::new(&path))?,
                None => Config::load_default()?,
            };

            // Flags win over config values
            if spec.is_some() {
                cfg.spec = spec;
            }
            if base_url.is_some() {
                cfg.base_url = base_url;
            }
            if let Some(secs) = timeout {
                cfg.timeout_secs = secs;
            }
            if let Some(n) = workers {
                cfg.workers = n;
            }
            if let Some(policy) = expect {
                cfg.status_policy = policy.into();
            }
            if let Some(dir) = dump_dir {
                cfg.dump_dir = Some(PathBuf::from(dir));
            }
            cfg.dump |= dump;
            tracing::debug!(config = ?cfg, "resolved configuration");

            let spec = cfg
                .spec
                .clone()
                .context("no OpenAPI document given: pass --spec or set `spec` in .specdrill.toml")?;
            if cfg.timeout_secs == 0 {
                bail!("timeout must be at least 1 second");
            }

            let loader = Loader::new()?.with_status_policy(cfg.status_policy);
            let suite = loader.load(&spec, cfg.base_url.as_deref())?;

            if suite.test_cases.is_empty() {
                eprintln!("Error: No test cases generated. The document declares no operations.");
                return Ok(3);
            }

            if dry_run {
                match cli.output {
                    OutputFormat::Terminal => println!("{}", render::plan(&suite)),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&suite)?),
                    OutputFormat::Silent => {}
                }
                return Ok(0);
            }

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  spec:     {spec}");
                eprintln!("  base_url: {}", suite.base_url);
                eprintln!("  timeout:  {}s", cfg.timeout_secs);
                if cfg.workers > 1 {
                    eprintln!("  workers:  {}", cfg.workers);
                }
                if cfg.status_policy == StatusPolicy::Declared {
                    eprintln!("  expect:   declared 2xx codes");
                }
                eprintln!();
            }

            let executor = Executor::with_timeout(Duration::from_secs(cfg.timeout_secs))?
                .with_logger(TracingLogger)
                .with_workers(cfg.workers);
            let summary = executor.execute_suite(&suite);

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{}", render::summary(&suite, &summary));
                    if !summary.all_passed() {
                        write_reproductions(&summary, Path::new(&output_dir));
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                OutputFormat::Silent => {}
            }

            if cfg.dump {
                write_dump(&summary, &cfg.dump_dir(), cli.output);
            }

            Ok(if summary.all_passed() { 0 } else { 1 })
        }

        Commands::Init => {
            if Path::new(CONFIG_FILE).exists() {
                eprintln!("{CONFIG_FILE} already exists");
                return Ok(1);
            }

            std::fs::write(CONFIG_FILE, Config::example())?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path or URL of your OpenAPI document");
            println!("  - base_url: server to test");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", specdrill_core::model::generate_schema());
            Ok(0)
        }
    }
}

fn write_reproductions(summary: &TestSummary, output_dir: &Path) {
    let http_path = output_dir.join("reproductions.http");
    let written = std::fs::create_dir_all(output_dir)
        .and_then(|()| std::fs::write(&http_path, to_http_file(&summary.results)));
    match written {
        Ok(()) => println!("Reproductions: {}", http_path.display()),
        Err(e) => eprintln!("Warning: failed to write .http file: {e}"),
    }
}

fn write_dump(summary: &TestSummary, dump_dir: &Path, output: OutputFormat) {
    // Sensitive headers are always masked
    match specdrill_core::dump::write_dump(&summary.results, dump_dir, true) {
        Ok(index) => {
            if output != OutputFormat::Silent {
                eprintln!(
                    "Dump: {} cases → {} ({})",
                    index.total,
                    dump_dir.display(),
                    index
                        .operations
                        .iter()
                        .map(|e| e.file.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
        }
        Err(e) => eprintln!("Warning: failed to write dump: {e}"),
    }
}
