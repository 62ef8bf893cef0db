//! Wires configuration, logging, Ctrl+C handling and progress into the
//! catalog engine for one CLI invocation.

use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::cli::{
    Cli, Commands, DupesArgs, DupesBy, HashArgs, MarkBy, MigrateArgs, ScanArgs, SessionsArgs,
};
use crate::config::{Config, ConfigOverrides, ScanOverrides};
use crate::duplicates::{DuplicateMarker, SizeFilter};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::progress::Progress;
use crate::signal::install_handler;

/// A hash group with its member paths, as printed by `dupes --json`.
#[derive(Debug, Serialize)]
struct HashGroupOutput {
    hash: String,
    size: u64,
    count: u64,
    wasted_space: u64,
    paths: Vec<String>,
}

/// Run one CLI invocation.
///
/// # Errors
///
/// Returns an error for bad configuration, an unusable scan root, store
/// failures and aborted migrations.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let overrides = overrides_from(&cli);
    let config = Config::load(cli.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    if matches!(cli.command, Commands::Config) {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::Success);
    }

    let handler = install_handler();
    let progress = Arc::new(Progress::new(cli.quiet));
    let catalog = Catalog::open(config)
        .context("Failed to open catalog database")?
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);

    let code = match &cli.command {
        Commands::Scan(args) => run_scan(&catalog, args)?,
        Commands::Hash(args) => run_hash(&catalog, args)?,
        Commands::Migrate(args) => run_migrate(&catalog, args)?,
        Commands::Mark(args) => {
            let marker = DuplicateMarker::new(catalog.store());
            let marked = match args.by {
                MarkBy::Content => marker.mark_content_duplicates()?,
                MarkBy::FolderName => marker.mark_duplicates()?,
            };
            println!("Marked {marked} duplicate records");
            ExitCode::Success
        }
        Commands::Dupes(args) => run_dupes(&catalog, args)?,
        Commands::Sessions(args) => run_sessions(&catalog, args)?,
        Commands::Config => ExitCode::Success,
    };
    Ok(code)
}

fn overrides_from(cli: &Cli) -> ConfigOverrides {
    let scan = match &cli.command {
        Commands::Scan(args) => ScanOverrides {
            follow_symlinks: args.follow_symlinks.then_some(true),
            max_depth: args.max_depth,
            exclude_patterns: (!args.exclude.is_empty()).then(|| args.exclude.clone()),
        },
        _ => ScanOverrides::default(),
    };
    ConfigOverrides {
        database: cli.database.clone(),
        scan,
    }
}

fn exit_code(interrupted: bool, errors: u64) -> ExitCode {
    if interrupted {
        ExitCode::Interrupted
    } else if errors > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn run_scan(catalog: &Catalog, args: &ScanArgs) -> anyhow::Result<ExitCode> {
    let report = catalog.scan(&args.path)?;
    println!(
        "Scanned {}: {} files ({}) in {} directories, {} skipped, {} errors",
        report.root,
        report.files_stored,
        ByteSize::b(report.bytes_stored),
        report.directories,
        report.skipped,
        report.errors
    );
    Ok(exit_code(report.interrupted, report.errors))
}

fn run_hash(catalog: &Catalog, args: &HashArgs) -> anyhow::Result<ExitCode> {
    let filter = SizeFilter {
        min_size: args.min_size,
        max_size: args.max_size,
    };
    let report = catalog.hash_pass(filter, !args.all_sizes)?;
    println!(
        "Hashed {} of {} files ({}): {} full, {} sampled, {} quick, {} errors",
        report.hashed,
        report.candidates,
        ByteSize::b(report.bytes),
        report.full,
        report.sampled,
        report.quick,
        report.errors
    );
    let mut errors = report.errors as u64;
    let mut interrupted = report.interrupted;

    if args.verify && !interrupted {
        let verify = catalog.verify_pass()?;
        println!(
            "Verified {} files in {} groups, {} errors",
            verify.files_verified, verify.groups_checked, verify.errors
        );
        errors += verify.errors as u64;
        interrupted = verify.interrupted;
    }
    Ok(exit_code(interrupted, errors))
}

fn run_migrate(catalog: &Catalog, args: &MigrateArgs) -> anyhow::Result<ExitCode> {
    let migrator = catalog.migrator();
    let report = migrator.migrate()?;
    println!(
        "Assigned {} files in {} batches, created {} folders, {} folder errors",
        report.files_assigned, report.batches, report.folders_created, report.folder_errors
    );
    let mut errors = (report.folder_errors + report.files_skipped) as u64;
    if report.interrupted {
        return Ok(ExitCode::Interrupted);
    }
    if args.skip_hierarchy {
        return Ok(exit_code(false, errors));
    }

    let hierarchy = migrator.establish_hierarchy()?;
    println!(
        "Linked {} of {} parentless folders, created {} ancestors, {} errors",
        hierarchy.linked, hierarchy.examined, hierarchy.folders_created, hierarchy.errors
    );
    errors += hierarchy.errors as u64;
    if hierarchy.interrupted {
        return Ok(ExitCode::Interrupted);
    }

    let forest = migrator.check_forest()?;
    if !forest.is_forest() {
        log::error!("Folder parent links contain cycles: {:?}", forest.cyclic);
        errors += forest.cyclic.len() as u64;
    }
    println!(
        "{} folders in {} trees, maximum depth {}",
        forest.folders, forest.roots, forest.max_depth
    );
    Ok(exit_code(false, errors))
}

fn run_dupes(catalog: &Catalog, args: &DupesArgs) -> anyhow::Result<ExitCode> {
    let detector = catalog.detector();
    let found = match args.by {
        DupesBy::Hash => {
            let mut output = Vec::new();
            for group in detector.duplicates_by_hash(args.min_size)? {
                let paths = detector
                    .group_members(&group)?
                    .into_iter()
                    .map(|f| f.path)
                    .collect();
                output.push(HashGroupOutput {
                    hash: group.hash,
                    size: group.size,
                    count: group.count,
                    wasted_space: group.wasted_space,
                    paths,
                });
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for group in &output {
                    println!(
                        "{} x {} ({} reclaimable) {}",
                        group.count,
                        ByteSize::b(group.size),
                        ByteSize::b(group.wasted_space),
                        group.hash
                    );
                    for path in &group.paths {
                        println!("    {path}");
                    }
                }
            }
            !output.is_empty()
        }
        DupesBy::Name => {
            let groups = detector.duplicates_by_name_and_size(args.min_size)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for group in &groups {
                    println!(
                        "{} x {} ({}) {}",
                        group.count,
                        ByteSize::b(group.size),
                        ByteSize::b(group.wasted_space),
                        group.name
                    );
                }
            }
            !groups.is_empty()
        }
        DupesBy::Folders => {
            let groups = detector.duplicate_folders(args.min_size)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for group in &groups {
                    println!(
                        "{} folders with {} files ({} each, {} reclaimable)",
                        group.len(),
                        group.file_count,
                        ByteSize::b(group.total_size),
                        ByteSize::b(group.wasted_space)
                    );
                    for folder in &group.folders {
                        println!("    {}", folder.full_path);
                    }
                }
            }
            !groups.is_empty()
        }
    };

    if !found {
        log::info!("No duplicates found");
        return Ok(ExitCode::NoDuplicates);
    }
    if !args.json {
        let summary = detector.summary()?;
        println!(
            "{} files catalogued, {} hashed, {} reclaimable across {} groups",
            summary.files,
            summary.hashed_files,
            ByteSize::b(summary.reclaimable_bytes),
            summary.duplicate_groups
        );
    }
    Ok(ExitCode::Success)
}

fn run_sessions(catalog: &Catalog, args: &SessionsArgs) -> anyhow::Result<ExitCode> {
    let sessions = catalog.store().recent_sessions(args.limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(ExitCode::Success);
    }
    for session in &sessions {
        println!(
            "#{} {:<9} {} files, {} {} ({})",
            session.id,
            session.status.as_str(),
            session.total_files,
            ByteSize::b(session.total_size),
            session.scan_path,
            session.start_time
        );
    }
    Ok(ExitCode::Success)
}
