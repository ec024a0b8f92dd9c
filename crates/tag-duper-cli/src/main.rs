mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, DupesArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tag_duper_core::analysis::{
    change_fingerprint_algorithm, duplicate_stats, preview_update, refresh_fingerprints,
    repair_path, ExternalCommand, KeepHighest, RemovalAction,
};
use tag_duper_core::scanner::changed_paths;
use tag_duper_core::storage::Database;
use tag_duper_core::{AppConfig, Algorithm, Resolver, ResolverOptions};
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let _guard = logging::init_logger(args.verbose);

    let config = match tag_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, args.database.as_deref(), &config) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(command: Commands, database: Option<&str>, config: &AppConfig) -> Result<()> {
    let db = open_catalog(&config.database_path(database))?;

    match command {
        Commands::Check { json } => run_check(&db, json),
        Commands::Update { paths } => {
            let algorithm = db.fingerprint_algorithm()?;
            for preview in preview_update(&paths, algorithm) {
                match preview {
                    Ok(record) => println!(
                        "{}\t{}\t{}",
                        record.path.display(),
                        record.fingerprint,
                        record.mod_time
                    ),
                    Err(err) => error!("{}", err),
                }
            }
            Ok(())
        }
        Commands::Dupes(dupes) => run_dupes(&db, dupes, config),
        Commands::Repair {
            old,
            new,
            ignore_fingerprint,
        } => {
            repair_path(&db, &old, &new, ignore_fingerprint)?;
            println!("{} -> {}", old.display(), new.display());
            Ok(())
        }
        Commands::Rehash => {
            let summary = refresh_fingerprints(&db, &CliReporter::new())?;
            for path in &summary.failed {
                eprintln!("  {} {}", "✗".red(), path.display());
            }
            Ok(())
        }
        Commands::Algorithm { name: None } => {
            println!("{}", db.fingerprint_algorithm()?);
            Ok(())
        }
        Commands::Algorithm { name: Some(name) } => {
            let algorithm: Algorithm = name.parse()?;
            let invalidated = change_fingerprint_algorithm(&db, algorithm)?;
            info!(
                "{} fingerprints invalidated; run `tag-duper rehash` to recompute them",
                invalidated
            );
            Ok(())
        }
    }
}

fn open_catalog(path: &Path) -> Result<Database> {
    if !path.exists() {
        bail!("No catalog database at {}", path.display());
    }
    Database::open(path).with_context(|| format!("Cannot open catalog {}", path.display()))
}

fn run_check(db: &Database, json: bool) -> Result<()> {
    let report = changed_paths(&db.all_entries()?);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let counts = report.counts();
    let rows = [
        ("modified", counts.modified),
        ("broken", counts.broken),
        ("deleted", counts.deleted),
        ("type", counts.type_changed),
        ("badmtime", counts.bad_mtime),
        ("linkres", counts.link_resolved),
    ];
    for (label, count) in rows {
        let count = if count > 0 {
            count.to_string().red()
        } else {
            count.to_string().green()
        };
        println!("{:>9}: {}", label, count);
    }
    Ok(())
}

fn run_dupes(db: &Database, args: DupesArgs, config: &AppConfig) -> Result<()> {
    let minimum = args.minimum.unwrap_or(config.dupes.minimum);

    if args.stats {
        let stats = duplicate_stats(&db.all_entries()?, minimum);
        println!("groups:      {}", stats.groups);
        println!("files:       {}", stats.files);
        println!("existing:    {}", stats.existing_files);
        println!("reclaimable: {} bytes", stats.reclaimable_bytes);
        return Ok(());
    }

    let default_limit = if args.stdin {
        config.dupes.stdin_limit
    } else {
        config.dupes.limit
    };
    let options = ResolverOptions {
        minimum,
        limit: args.limit.unwrap_or(default_limit),
        single: args.single,
        merge_multiple_survivors: args.merge_multiple_survivors,
    };

    let mut action: Box<dyn RemovalAction> = if args.keep_highest {
        Box::new(KeepHighest)
    } else {
        match args.command.or_else(|| config.dupes.command.clone()) {
            Some(command) => Box::new(ExternalCommand::new(command).with_stdin(args.stdin)),
            None => bail!("No removal action: pass --command, --keep-highest or --stats"),
        }
    };

    let reporter = CliReporter::new();
    let summary = Resolver::new(db, options)
        .with_cancel_flag(interrupt_flag()?)
        .run(action.as_mut(), &reporter)?;
    info!(
        "{} groups considered, {} files removed",
        summary.groups, summary.removed_files
    );
    Ok(())
}

/// Flag raised by Ctrl-C. The pass stops before its next batch and still
/// applies the merges it has confirmed.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Cannot install Ctrl-C handler")?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_flag_starts_lowered() {
        let flag = interrupt_flag().unwrap();
        assert!(!flag.load(Ordering::SeqCst));
        // only one handler per process
        assert!(interrupt_flag().is_err());
    }
}
