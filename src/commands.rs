//! Command dispatch for the `dupescan` binary.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, OutputFormat, PathCommand};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{CommandError, ExitCode};
use crate::logging::init_logging;
use crate::output::json::write_json;
use crate::output::{text, JsonOutput};
use crate::progress::{ConsoleProgress, NoopObserver, ScanObserver};
use crate::signal::install_handler;

/// Run one parsed command line, writing results to stdout.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(cli, &mut out)
}

/// Run one parsed command line against `out`.
pub fn run_with_output(cli: Cli, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(database) = cli.database {
        config.database_path = Some(database);
    }

    if let Commands::Config = cli.command {
        let rendered = toml::to_string_pretty(&config)?;
        write!(out, "{rendered}")?;
        return Ok(ExitCode::Success);
    }

    let observer: Arc<dyn ScanObserver> = match &cli.command {
        Commands::Scan(args) => Arc::new(ConsoleProgress::new(
            cli.quiet || args.output == OutputFormat::Json,
        )),
        _ => Arc::new(NoopObserver),
    };
    let engine = Engine::open(&config, observer)?;

    match cli.command {
        Commands::Path(PathCommand::Add { path }) => {
            let record = engine
                .add_scan_path(&path)
                .with_context(|| format!("cannot add {}", path.display()))?;
            writeln!(out, "Added {} (id {})", record.path.display(), record.id)?;
        }
        Commands::Path(PathCommand::List { output }) => {
            let paths = engine.list_scan_paths()?;
            match output {
                OutputFormat::Text => text::write_scan_paths(out, &paths)?,
                OutputFormat::Json => write_json(out, &paths)?,
            }
        }
        Commands::Path(PathCommand::Remove { id }) => {
            engine.remove_scan_path(id)?;
            writeln!(out, "Removed scan path {id}")?;
        }
        Commands::Scan(args) => {
            let handler = install_handler(Arc::clone(engine.pipeline()))
                .map_err(CommandError::from)?;
            let summary = engine.start_scan().map_err(CommandError::from)?;
            match args.output {
                OutputFormat::Text => text::write_scan_summary(out, &summary)?,
                OutputFormat::Json => write_json(out, &summary)?,
            }
            if handler.is_shutdown_requested() {
                return Err(CommandError::Interrupted.into());
            }
            if summary.progress.duplicates_found == 0 {
                return Ok(ExitCode::NoDuplicates);
            }
        }
        Commands::Duplicates(args) => {
            let groups = engine.duplicates(&args.filter(), args.sort.into())?;
            match args.output {
                OutputFormat::Text => text::write_groups(out, &groups)?,
                OutputFormat::Json => write_json(out, &JsonOutput::new(&groups))?,
            }
            if groups.is_empty() {
                return Ok(ExitCode::NoDuplicates);
            }
        }
        Commands::Remove(args) => {
            let result = engine
                .remove_file(args.id)
                .with_context(|| format!("cannot remove file {}", args.id))?;
            text::write_delete_result(out, &result)?;
        }
        Commands::RemoveInPath(args) => {
            let batch = engine.remove_duplicates_in_path(&args.path, args.keep.into())?;
            match args.output {
                OutputFormat::Text => text::write_batch_result(out, &batch)?,
                OutputFormat::Json => write_json(out, &batch)?,
            }
            if !batch.all_succeeded() {
                return Ok(ExitCode::GeneralError);
            }
        }
        Commands::Stats(args) => {
            let stats = engine.statistics()?;
            match args.output {
                OutputFormat::Text => text::write_statistics(out, &stats)?,
                OutputFormat::Json => write_json(out, &stats)?,
            }
        }
        // Printed before the database is opened
        Commands::Config => {}
    }

    Ok(ExitCode::Success)
}
