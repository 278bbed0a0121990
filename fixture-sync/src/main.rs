//! Regenerate the Spade waveform fixtures (`examples/spade_state.ron`,
//! `examples/spade.vcd`) from a pinned upstream revision.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fixture_sync::cancel::CancelFlag;
use fixture_sync::error::SyncError;
use fixture_sync::exit_codes;
use fixture_sync::io::config::{
    DEFAULT_CONFIG_PATH, SyncConfig, load_config, render_config, write_config,
};
use fixture_sync::io::git::{GitLimits, GitSourceControl};
use fixture_sync::io::test_runner::CommandTestRunner;
use fixture_sync::logging;
use fixture_sync::sync::{FixtureSync, SyncReport};

#[derive(Parser)]
#[command(
    name = "fixture-sync",
    version,
    about = "Regenerate test fixtures from a pinned upstream revision"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file; missing means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Upstream revision (commit, tag or branch) to build fixtures from.
    #[arg(long, global = true)]
    revision: Option<String>,

    /// Directory receiving the fixtures.
    #[arg(long, global = true)]
    dest: Option<PathBuf>,

    /// Upstream repository URL.
    #[arg(long, global = true)]
    repo_url: Option<String>,

    /// Kill clone, checkout or the test command after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Print the run report as JSON instead of summary lines.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration as TOML.
    Config {
        /// Write it to the config path instead.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SyncError>()
        .map_or(exit_codes::INVALID, SyncError::exit_code)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = effective_config(&cli)?;
    match cli.command {
        Some(Command::Config { write }) => cmd_config(&cli.config, &config, write),
        None => {
            let cwd = std::env::current_dir().context("resolve current directory")?;
            cmd_sync(&anchored(config, &cwd), cli.json)
        }
    }
}

/// Config file values overridden by CLI flags. Paths stay as written so
/// `config --write` produces a portable file.
fn effective_config(cli: &Cli) -> Result<SyncConfig> {
    let mut config = load_config(&cli.config)?;
    if let Some(revision) = &cli.revision {
        config.revision = revision.clone();
    }
    if let Some(dest) = &cli.dest {
        config.dest_dir = dest.clone();
    }
    if let Some(url) = &cli.repo_url {
        config.repo_url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.step_timeout_secs = Some(secs);
    }
    config.validate()?;
    Ok(config)
}

/// Make `dest_dir` absolute before a sync run.
fn anchored(mut config: SyncConfig, cwd: &Path) -> SyncConfig {
    config.anchor_dest_dir(cwd);
    config
}

fn cmd_config(path: &Path, config: &SyncConfig, write: bool) -> Result<()> {
    if write {
        write_config(path, config)?;
        println!("config: wrote {}", path.display());
    } else {
        print!("{}", render_config(config)?);
    }
    Ok(())
}

fn cmd_sync(config: &SyncConfig, json: bool) -> Result<()> {
    let cancel = CancelFlag::new();
    cancel.install_ctrlc_handler()?;

    let scm = GitSourceControl {
        limits: GitLimits {
            timeout: config.step_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        },
    };
    let report = FixtureSync::new(config, scm, CommandTestRunner)
        .with_cancel(cancel)
        .run()?;
    print_report(&report, json)
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::to_string_pretty(report).context("serialize report")?;
        println!("{payload}");
        return Ok(());
    }
    println!(
        "sync: revision={} commit={} fixtures={}",
        report.revision,
        report.commit,
        report.fixtures.len()
    );
    for fixture in &report.fixtures {
        println!(
            "fixture: path={} bytes={} sha256={}",
            fixture.path.display(),
            fixture.bytes,
            fixture.sha256
        );
    }
    Ok(())
}
