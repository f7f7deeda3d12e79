//! mailparity - differential gates for mail container parsers
//!
//! Runs independent MSG/EML/PST parsers as black-box oracles over the same
//! corpus and fails CI when they drift apart in ways that matter.
//!
//! ## Commands
//!
//! - `diff`: MSG differential report (all-parser or baseline view)
//! - `baseline-gate`: policy-driven MSG deviation gate
//! - `semantic-gate`: strict `outlook_msg` vs `ruby-msg` gate
//! - `eml-gate`: strict `outlook_msg` vs `python_email` gate
//! - `warning-gate`: report-mode warning policy gate
//! - `pst-gate`: corruption-fixture assertions for PST archives
//! - `eml-diff`: EML side-by-side field report
//! - `pst-probe`: PST structural counts, corroborated by `readpst`

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use mailparity_core::obs::{self, RunSpan};
use mailparity_core::report::{compute_run_digest, render_baseline_diff, render_mismatches};
use mailparity_core::{
    baseline_diff, cross_compare, evaluate_fixtures, evaluate_warnings, ComparisonProfile,
    DeviationPolicy, GateKind, GateVerdict, Payload, ProbeReport, WarningPolicy,
};
use mailparity_oracle::{
    collect, collect_all, decode_eml, decode_msg, decode_pst_probe, decode_pst_report,
    decode_warnings, probe_readpst, run_oracle, BuiltinOracle, OracleConfig, OracleRoots,
};

#[derive(Parser)]
#[command(name = "mailparity")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Differential gates for MSG/EML/PST parsers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print the structured payload instead of the human report
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    oracles: OracleArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where the oracles live and how they are run.
#[derive(Args, Debug, Clone)]
struct OracleArgs {
    /// ruby-msg checkout (run with `ruby -Ilib`)
    #[arg(long, global = true, env = "MAILPARITY_RUBY_ROOT", default_value = "../ruby-msg")]
    ruby_root: PathBuf,

    /// outlook_msg mix project
    #[arg(long, global = true, env = "MAILPARITY_ELIXIR_ROOT", default_value = ".")]
    elixir_root: PathBuf,

    /// msg-viewer checkout (run with `bun`)
    #[arg(
        long,
        global = true,
        env = "MAILPARITY_MSG_VIEWER_ROOT",
        default_value = "../msg-viewer"
    )]
    msg_viewer_root: PathBuf,

    /// Python interpreter for extract-msg and python_email
    #[arg(long, global = true, env = "MAILPARITY_PYTHON", default_value = "python3")]
    python: String,

    /// Kill an oracle after this many seconds (0 = wait indefinitely)
    #[arg(long, global = true, default_value_t = 0)]
    timeout_secs: u64,

    /// Run independent oracles concurrently
    #[arg(long, global = true)]
    parallel: bool,
}

impl OracleArgs {
    fn roots(&self) -> OracleRoots {
        OracleRoots {
            ruby_root: self.ruby_root.clone(),
            elixir_root: self.elixir_root.clone(),
            msg_viewer_root: self.msg_viewer_root.clone(),
            python: self.python.clone(),
        }
    }

    fn config(&self, oracle: BuiltinOracle) -> OracleConfig {
        OracleConfig::builtin(oracle, &self.roots(), self.timeout_secs)
    }

    fn configs(&self, oracles: &[BuiltinOracle]) -> Vec<OracleConfig> {
        oracles.iter().map(|o| self.config(*o)).collect()
    }
}

#[derive(Args, Debug)]
struct Inputs {
    /// Files to run every oracle over
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// MSG differential report; always exits 0
    Diff {
        #[command(flatten)]
        input: Inputs,

        /// Report deviations against this parser instead of all-parser mismatches
        #[arg(long)]
        baseline_parser: Option<String>,

        #[arg(long)]
        no_ruby: bool,

        #[arg(long)]
        no_elixir: bool,

        #[arg(long)]
        no_extract_msg: bool,

        #[arg(long)]
        with_msg_viewer: bool,
    },

    /// Policy-driven MSG deviation gate (exit 1 on violations)
    BaselineGate {
        #[command(flatten)]
        input: Inputs,

        /// Deviation policy JSON (default: ruby-msg baseline, fail on high)
        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long)]
        with_msg_viewer: bool,
    },

    /// Strict outlook_msg vs ruby-msg gate (exit 1 on violations)
    SemanticGate {
        #[command(flatten)]
        input: Inputs,
    },

    /// Strict outlook_msg vs python_email EML gate (exit 2 on violations)
    EmlGate {
        #[command(flatten)]
        input: Inputs,
    },

    /// Report-mode warning policy gate (exit 2 on violations)
    WarningGate {
        #[command(flatten)]
        input: Inputs,

        /// Warning policy JSON
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// PST corruption-fixture gate (exit 2 on violations)
    PstGate {
        #[command(flatten)]
        input: Inputs,
    },

    /// EML side-by-side field report; always exits 0
    EmlDiff {
        #[command(flatten)]
        input: Inputs,
    },

    /// PST structural counts with optional readpst corroboration; always exits 0
    PstProbe {
        #[command(flatten)]
        input: Inputs,
    },
}

/// Which MSG oracles take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MsgSelection {
    ruby: bool,
    elixir: bool,
    extract_msg: bool,
    msg_viewer: bool,
}

impl MsgSelection {
    fn oracles(&self) -> Vec<BuiltinOracle> {
        [
            (self.ruby, BuiltinOracle::RubyMsg),
            (self.elixir, BuiltinOracle::OutlookMsg),
            (self.extract_msg, BuiltinOracle::ExtractMsg),
            (self.msg_viewer, BuiltinOracle::MsgViewer),
        ]
        .into_iter()
        .filter_map(|(enabled, oracle)| enabled.then_some(oracle))
        .collect()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mailparity_core::init_tracing(cli.log_json, level);

    let args = &cli.oracles;
    let json = cli.json;

    match cli.command {
        Commands::Diff {
            input,
            baseline_parser,
            no_ruby,
            no_elixir,
            no_extract_msg,
            with_msg_viewer,
        } => {
            let selection = MsgSelection {
                ruby: !no_ruby,
                elixir: !no_elixir,
                extract_msg: !no_extract_msg,
                msg_viewer: with_msg_viewer,
            };
            let files = absolute_files(&input.files)?;
            cmd_diff(args, files, selection, baseline_parser.as_deref(), json).await
        }
        Commands::BaselineGate {
            input,
            policy,
            with_msg_viewer,
        } => {
            let files = absolute_files(&input.files)?;
            cmd_baseline_gate(args, files, policy.as_deref(), with_msg_viewer, json).await
        }
        Commands::SemanticGate { input } => {
            cmd_semantic_gate(args, absolute_files(&input.files)?, json).await
        }
        Commands::EmlGate { input } => cmd_eml_gate(args, absolute_files(&input.files)?, json).await,
        Commands::WarningGate { input, policy } => {
            let files = absolute_files(&input.files)?;
            cmd_warning_gate(args, files, policy.as_deref(), json).await
        }
        Commands::PstGate { input } => cmd_pst_gate(args, absolute_files(&input.files)?, json).await,
        Commands::EmlDiff { input } => cmd_eml_diff(args, absolute_files(&input.files)?, json).await,
        Commands::PstProbe { input } => {
            cmd_pst_probe(args, absolute_files(&input.files)?, json).await
        }
    }
}

/// Oracles run from their own roots, so every input path is made absolute.
fn absolute_files(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            std::path::absolute(path)
                .map(|abs| abs.to_string_lossy().into_owned())
                .with_context(|| format!("Failed to resolve {}", path.display()))
        })
        .collect()
}

fn load_deviation_policy(path: Option<&Path>) -> Result<DeviationPolicy> {
    match path {
        Some(path) => DeviationPolicy::from_path(path).context("Failed to load deviation policy"),
        None => Ok(DeviationPolicy::default()),
    }
}

fn load_warning_policy(path: Option<&Path>) -> Result<WarningPolicy> {
    match path {
        Some(path) => WarningPolicy::from_path(path).context("Failed to load warning policy"),
        None => Ok(WarningPolicy::default()),
    }
}

// ---------------------------------------------------------------------------
// Run context and output
// ---------------------------------------------------------------------------

/// JSON report body for every gate.
#[derive(Serialize)]
struct GateReport<D, V> {
    gate: GateKind,
    detail: D,
    violations: Vec<V>,
}

/// One CLI invocation: which oracles ran over which files.
struct Run {
    command: &'static str,
    oracles: Vec<String>,
    files: Vec<String>,
    json: bool,
}

impl Run {
    fn new(command: &'static str, configs: &[OracleConfig], files: Vec<String>, json: bool) -> Self {
        Self {
            command,
            oracles: configs.iter().map(|c| c.name.clone()).collect(),
            files,
            json,
        }
    }

    fn span(&self) -> RunSpan {
        let digest = compute_run_digest(&self.oracles, &self.files);
        info!(command = self.command, files = self.files.len(), "Starting run");
        RunSpan::enter(self.command, &digest)
    }

    fn print<T: Serialize>(&self, report: T, passed: Option<bool>, human: &str) -> Result<()> {
        if self.json {
            let mut payload = Payload::new(self.command, &self.oracles, &self.files, report);
            if let Some(passed) = passed {
                payload = payload.with_passed(passed);
            }
            println!("{}", payload.to_json().context("Failed to serialize payload")?);
        } else {
            print!("{human}");
        }
        Ok(())
    }

    fn gate<D, V>(&self, kind: GateKind, detail: D, verdict: GateVerdict<V>) -> Result<ExitCode>
    where
        D: Serialize,
        V: Serialize + Display,
    {
        let passed = verdict.passed();
        obs::emit_gate_evaluated(kind.name(), self.files.len(), verdict.len(), passed);

        let human = verdict.render(kind);
        let report = GateReport {
            gate: kind,
            detail,
            violations: verdict.violations,
        };
        self.print(report, Some(passed), &human)?;

        Ok(if passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(kind.failure_code())
        })
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_diff(
    args: &OracleArgs,
    files: Vec<String>,
    selection: MsgSelection,
    baseline: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let oracles = selection.oracles();
    if oracles.is_empty() {
        anyhow::bail!("No MSG parsers enabled");
    }
    let configs = args.configs(&oracles);
    let run = Run::new("diff", &configs, files, json);
    let _span = run.span();

    let sets = collect_all(&configs, &run.files, decode_msg, args.parallel)
        .await
        .context("MSG oracle run failed")?;
    let profile = ComparisonProfile::msg_baseline();

    match baseline {
        Some(baseline) => {
            let diff = baseline_diff(&run.files, &sets, baseline, &profile)?;
            run.print(&diff, None, &render_baseline_diff(&diff))?;
        }
        None => {
            let view = cross_compare(&run.files, &sets, &profile.field_names());
            run.print(&view, None, &render_mismatches(&view))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_baseline_gate(
    args: &OracleArgs,
    files: Vec<String>,
    policy_path: Option<&Path>,
    with_msg_viewer: bool,
    json: bool,
) -> Result<ExitCode> {
    let policy = load_deviation_policy(policy_path)?;
    let selection = MsgSelection {
        ruby: true,
        elixir: true,
        extract_msg: true,
        msg_viewer: with_msg_viewer,
    };
    let configs = args.configs(&selection.oracles());
    let run = Run::new("baseline-gate", &configs, files, json);
    let _span = run.span();

    let sets = collect_all(&configs, &run.files, decode_msg, args.parallel)
        .await
        .context("MSG oracle run failed")?;
    let diff = baseline_diff(
        &run.files,
        &sets,
        &policy.baseline_parser,
        &ComparisonProfile::msg_baseline(),
    )?;
    let verdict = policy.evaluate(&diff);
    run.gate(GateKind::Baseline, &diff, verdict)
}

async fn cmd_semantic_gate(args: &OracleArgs, files: Vec<String>, json: bool) -> Result<ExitCode> {
    let configs = args.configs(&[BuiltinOracle::RubyMsg, BuiltinOracle::OutlookMsg]);
    let run = Run::new("semantic-gate", &configs, files, json);
    let _span = run.span();

    let sets = collect_all(&configs, &run.files, decode_msg, args.parallel)
        .await
        .context("MSG oracle run failed")?;
    let policy = DeviationPolicy::strict(BuiltinOracle::RubyMsg.name());
    let diff = baseline_diff(
        &run.files,
        &sets,
        &policy.baseline_parser,
        &ComparisonProfile::msg_semantic(),
    )?;
    let verdict = policy.evaluate(&diff);
    run.gate(GateKind::Semantic, &diff, verdict)
}

async fn cmd_eml_gate(args: &OracleArgs, files: Vec<String>, json: bool) -> Result<ExitCode> {
    let configs = args.configs(&[BuiltinOracle::PythonEmail, BuiltinOracle::OutlookEml]);
    let run = Run::new("eml-gate", &configs, files, json);
    let _span = run.span();

    let sets = collect_all(&configs, &run.files, decode_eml, args.parallel)
        .await
        .context("EML oracle run failed")?;
    let policy = DeviationPolicy::strict(BuiltinOracle::PythonEmail.name());
    let diff = baseline_diff(&run.files, &sets, &policy.baseline_parser, &ComparisonProfile::eml())?;
    let verdict = policy.evaluate(&diff);
    run.gate(GateKind::Eml, &diff, verdict)
}

async fn cmd_warning_gate(
    args: &OracleArgs,
    files: Vec<String>,
    policy_path: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let policy = load_warning_policy(policy_path)?;
    let config = args.config(BuiltinOracle::OutlookWarnings);
    let run = Run::new("warning-gate", std::slice::from_ref(&config), files, json);
    let _span = run.span();

    let warnings = run_oracle(&config, &run.files)
        .await
        .context("Warning oracle run failed")?
        .map(|output| decode_warnings(&output.oracle, &output.stdout))
        .unwrap_or_default();
    let verdict = evaluate_warnings(&policy, &run.files, &warnings);
    run.gate(GateKind::Warning, &warnings, verdict)
}

async fn cmd_pst_gate(args: &OracleArgs, files: Vec<String>, json: bool) -> Result<ExitCode> {
    let config = args.config(BuiltinOracle::OutlookPstReport);
    let run = Run::new("pst-gate", std::slice::from_ref(&config), files, json);
    let _span = run.span();

    let reports = collect(&config, &run.files, decode_pst_report)
        .await
        .context("PST report oracle run failed")?;
    let verdict = evaluate_fixtures(&run.files, &reports);
    run.gate(GateKind::Pst, &reports, verdict)
}

async fn cmd_eml_diff(args: &OracleArgs, files: Vec<String>, json: bool) -> Result<ExitCode> {
    let configs = args.configs(&[BuiltinOracle::OutlookEml, BuiltinOracle::PythonEmail]);
    let run = Run::new("eml-diff", &configs, files, json);
    let _span = run.span();

    let sets = collect_all(&configs, &run.files, decode_eml, args.parallel)
        .await
        .context("EML oracle run failed")?;
    let view = cross_compare(&run.files, &sets, &ComparisonProfile::eml().field_names());
    run.print(&view, None, &render_mismatches(&view))?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_pst_probe(args: &OracleArgs, files: Vec<String>, json: bool) -> Result<ExitCode> {
    let config = args.config(BuiltinOracle::OutlookPstProbe);
    let run = Run::new("pst-probe", std::slice::from_ref(&config), files, json);
    let _span = run.span();

    let probes = collect(&config, &run.files, decode_pst_probe)
        .await
        .context("PST probe oracle run failed")?;
    let readpst = probe_readpst(&run.files)
        .await
        .context("readpst probe failed")?;

    let report = ProbeReport::build(&run.files, &probes, readpst.as_ref());
    run.print(&report, None, &report.render(probes.oracle()))?;
    Ok(ExitCode::SUCCESS)
}
