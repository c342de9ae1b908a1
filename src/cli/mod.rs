use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::collect::live::LiveOptions;
use crate::core::Report;
use crate::engine::{Engine, EngineOptions};
use crate::exit::ExitCode;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "meiliscan",
    version,
    about = "Audit a Meilisearch deployment: schema, content, performance and launch checks with a health score"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a live instance or an extracted dump directory
    Analyze(AnalyzeArgs),
    /// Compare two saved report files
    Compare(CompareArgs),
    /// Re-render the summary of a saved report
    Summary(SummaryArgs),
    /// Show the task history of a live instance
    Tasks(TasksArgs),
    /// Generate a shell script applying the automatable fixes of a report
    FixScript(FixScriptArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long, short = 'u')]
    pub url: Option<String>,
    #[arg(long, short = 'd')]
    pub dump: Option<PathBuf>,
    #[arg(long, short = 'k')]
    pub api_key: Option<String>,
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    #[arg(long, short = 'f')]
    pub format: Option<String>,
    #[arg(long)]
    pub ci: bool,
    #[arg(long)]
    pub fail_on_warnings: bool,
    #[arg(long)]
    pub config_toml: Option<PathBuf>,
    #[arg(long)]
    pub probe_search: bool,
    #[arg(long)]
    pub sample_documents: Option<usize>,
    #[arg(long)]
    pub detect_sensitive: bool,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    pub old: PathBuf,
    pub new: PathBuf,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct TasksArgs {
    #[arg(long, short = 'u')]
    pub url: Option<String>,
    #[arg(long, short = 'k')]
    pub api_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct FixScriptArgs {
    #[arg(long, short = 'i')]
    pub input: PathBuf,
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Markdown,
    Sarif,
    Agent,
}

#[derive(Debug, PartialEq, Eq)]
enum AnalyzeTarget {
    Url(String),
    Dump(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = effective_home_dir()?;

    let env_config_path = std::env::var_os("MEILISCAN_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let timeout = Duration::from_secs(cli.timeout.unwrap_or(cfg.connection.timeout_secs));
    let engine = Engine::new(EngineOptions {
        timeout,
        show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
    })?;

    match cli.command {
        Commands::Analyze(args) => {
            let target = resolve_target(
                args.url.clone(),
                args.dump.clone(),
                cfg.connection.url.clone(),
            )?;

            let probe_search = args.probe_search || cfg.analyze.probe_search;
            let detect_sensitive = args.detect_sensitive || cfg.analyze.detect_sensitive;
            let api_key = args
                .api_key
                .clone()
                .or_else(|| std::env::var("MEILI_MASTER_KEY").ok());

            let mut snapshot = match &target {
                AnalyzeTarget::Url(url) => crate::collect::live::collect(
                    url,
                    &LiveOptions {
                        api_key,
                        timeout: engine.timeout(),
                        sample_documents: args
                            .sample_documents
                            .unwrap_or(cfg.analyze.sample_documents),
                        probe_search,
                    },
                )?,
                AnalyzeTarget::Dump(path) => {
                    if probe_search && !ui_cfg.quiet {
                        eprintln!("notice: --probe-search has no effect on a dump; skipping probes");
                    }
                    crate::collect::dump::collect(
                        path,
                        args.sample_documents
                            .unwrap_or(crate::collect::dump::DEFAULT_SAMPLE_DOCS),
                    )?
                }
            };
            snapshot.sensitive_scan = detect_sensitive;
            if let Some(path) = &args.config_toml {
                snapshot.launch_config = Some(
                    crate::collect::launch::from_toml_file(path)
                        .map_err(crate::exit::invalid_args_err)?,
                );
            }

            let report = engine.analyze(&snapshot)?;

            let format = match args.format.as_deref() {
                Some(s) => Some(parse_format(s)?),
                None if cli.json => Some(OutputFormat::Json),
                None => None,
            };

            if let Some(path) = &args.output {
                let rendered = render_report(&report, format.unwrap_or(OutputFormat::Json))?;
                std::fs::write(path, rendered)
                    .with_context(|| format!("write report to {}", path.display()))?;
                if !ui_cfg.quiet {
                    eprintln!("report written to {}", path.display());
                }
            } else if let Some(format) = format {
                write_stdout(&render_report(&report, format)?)?;
            } else {
                crate::ui::print_report(&report, &ui_cfg);
            }

            check_findings_exit(&report, args.ci || args.fail_on_warnings || cfg.analyze.fail_on_warnings)?;
        }
        Commands::Compare(args) => {
            let old = load_report(&args.old)?;
            let new = load_report(&args.new)?;
            let comparison = crate::diff::compare(&old, &new);
            if cli.json {
                write_stdout(&crate::export::json::render_comparison(&comparison)?)?;
            } else {
                crate::ui::print_comparison(&comparison, &ui_cfg);
            }
        }
        Commands::Summary(args) => {
            let report = load_report(&args.file)?;
            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_report(&report, &ui_cfg);
            }
        }
        Commands::Tasks(args) => {
            let Some(url) = args.url.or(cfg.connection.url.clone()) else {
                return Err(crate::exit::invalid_args(
                    "tasks: specify --url or set connection.url in the config",
                ));
            };
            let api_key = args
                .api_key
                .or_else(|| std::env::var("MEILI_MASTER_KEY").ok());
            let tasks = crate::collect::live::collect_tasks(
                &url,
                &LiveOptions {
                    api_key,
                    timeout: engine.timeout(),
                    sample_documents: 0,
                    probe_search: false,
                },
            )?;
            if cli.json {
                write_json(&tasks)?;
            } else {
                crate::ui::print_tasks(&tasks, &ui_cfg);
            }
        }
        Commands::FixScript(args) => {
            let report = load_report(&args.input)?;
            let script = crate::export::fix_script::render(&report, args.url.as_deref());
            if let Some(path) = &args.output {
                std::fs::write(path, &script)
                    .with_context(|| format!("write script to {}", path.display()))?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o755);
                    std::fs::set_permissions(path, perms)
                        .with_context(|| format!("chmod {}", path.display()))?;
                }
                if !ui_cfg.quiet {
                    eprintln!("script written to {}", path.display());
                }
            } else {
                write_stdout(&script)?;
            }
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    let stdout = std::io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `meiliscan config --show`");
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "meiliscan", &mut out);
        }
    }

    Ok(())
}

fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| crate::exit::invalid_args("HOME environment variable is not set"))
}

/// Exactly one of --url and --dump, with the configured URL as a
/// fallback when neither is given.
fn resolve_target(
    url: Option<String>,
    dump: Option<PathBuf>,
    cfg_url: Option<String>,
) -> Result<AnalyzeTarget> {
    match (url, dump) {
        (Some(_), Some(_)) => Err(crate::exit::invalid_args(
            "analyze: --url and --dump are mutually exclusive",
        )),
        (Some(url), None) => Ok(AnalyzeTarget::Url(url)),
        (None, Some(dump)) => Ok(AnalyzeTarget::Dump(dump)),
        (None, None) => match cfg_url {
            Some(url) => Ok(AnalyzeTarget::Url(url)),
            None => Err(crate::exit::invalid_args(
                "analyze: specify --url <instance> or --dump <directory>",
            )),
        },
    }
}

fn check_findings_exit(report: &Report, fail_on_warnings: bool) -> Result<()> {
    if report.summary.critical > 0 {
        return Err(crate::exit::findings(
            ExitCode::CriticalFindings,
            format!("{} critical finding(s)", report.summary.critical),
        ));
    }
    if fail_on_warnings && report.summary.warning > 0 {
        return Err(crate::exit::findings(
            ExitCode::WarningFindings,
            format!("{} warning finding(s)", report.summary.warning),
        ));
    }
    Ok(())
}

fn load_report(path: &Path) -> Result<Report> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read report file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse report file: {}", path.display()))
}

fn render_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => crate::export::json::render(report),
        OutputFormat::Markdown => Ok(crate::export::markdown::render(report)),
        OutputFormat::Sarif => crate::export::sarif::render(report),
        OutputFormat::Agent => Ok(crate::export::agent::render(report)),
    }
}

fn parse_format(s: &str) -> Result<OutputFormat> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "json" => Ok(OutputFormat::Json),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        "sarif" => Ok(OutputFormat::Sarif),
        "agent" => Ok(OutputFormat::Agent),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported format: {other} (use json|markdown|sarif|agent)"
        ))),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (use bash|zsh|fish)"
        ))),
    }
}

fn write_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');

    use std::io::Write;
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(text.as_bytes()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}
