//! Templer CLI - Render Docker Compose files from Jinja2 templates

use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use templer_render::{NotifyWatcher, RenderOptions, WatchLoop, Workspace};

mod display;
mod error;
mod exit_codes;
mod logging;

use error::{CliError, Result};

fn version() -> String {
    format!(
        "{} ({})",
        env!("CARGO_PKG_VERSION"),
        templer_engine::engine::TEMPLATE_LANGUAGE
    )
}

#[derive(Parser)]
#[command(name = "templer")]
#[command(version = version())]
#[command(about = "Render Docker Compose files from Jinja2 templates", long_about = None)]
struct Cli {
    /// Keep running and re-render whenever a used file changes
    #[arg(short = 'a', long = "auto-render")]
    auto_render: bool,

    /// Overwrite existing destination files
    #[arg(short, long)]
    force: bool,

    /// Increase output (-v: debug, -vv: full error reports)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,

    /// Definition files to render
    #[arg(value_name = "DEFINITION_FILE", required = true)]
    definition_files: Vec<PathBuf>,
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    let detailed = cli.verbose >= 2;

    let code = match run(&cli, detailed) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            display::error(miette::Report::new(e), detailed);
            code
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli, detailed: bool) -> Result<()> {
    for path in &cli.definition_files {
        check_definition(path)?;
    }

    let options = RenderOptions {
        force_overwrite: cli.force,
        watch: cli.auto_render,
    };

    tracing::debug!(
        "Rendering {} definition file(s) (force: {}, auto-render: {})",
        cli.definition_files.len(),
        cli.force,
        cli.auto_render
    );

    if cli.auto_render {
        return auto_render(&cli.definition_files, options, detailed);
    }

    let mut workspace = Workspace::new(options);
    for path in &cli.definition_files {
        workspace.add_manifest(path);
    }

    let report = workspace.render_all();
    if report.is_success() {
        return Ok(());
    }
    let summary = report.summary();
    display::render_report(report, detailed);
    Err(CliError::RenderFailed { summary })
}

fn check_definition(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::MissingDefinition {
            path: path.to_path_buf(),
        })
    }
}

/// Render, then keep re-rendering until interrupted
///
/// Failures are logged as they happen and never stop the loop.
fn auto_render(paths: &[PathBuf], options: RenderOptions, detailed: bool) -> Result<()> {
    let (watcher, events) = NotifyWatcher::new().map_err(|source| CliError::Watch { source })?;

    let mut workspace = Workspace::with_watcher(options, Box::new(watcher));
    for path in paths {
        workspace.add_manifest(path);
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler = running.clone();
    ctrlc::set_handler(move || handler.store(false, Ordering::SeqCst))
        .map_err(|e| CliError::internal(format!("Could not install Ctrl-C handler: {}", e)))?;

    let mut watch_loop = WatchLoop::new(workspace, events, running);
    let initial = watch_loop.run();
    if detailed {
        display::render_report(initial, detailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["templer", "-a", "-f", "-vv", "a.yml", "b.yml"]);
        assert!(cli.auto_render);
        assert!(cli.force);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.definition_files.len(), 2);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["templer", "-v", "-q", "a.yml"]).is_err());
    }

    #[test]
    fn test_definition_required() {
        assert!(Cli::try_parse_from(["templer"]).is_err());
    }
}
