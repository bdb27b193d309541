use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use strata_db::{DatabaseConfig, Manifest};
use strata_store::{FileEntry, IndexedFile};
use strata_types::FileId;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Header(args) => cmd_header(args, cli.format),
        Command::Manifest(args) => cmd_manifest(args, cli.format),
        Command::FileId(args) => cmd_file_id(args, cli.format),
    }
}

#[derive(Debug, Serialize)]
struct HeaderReport {
    file_id: FileId,
    files: Vec<FileEntry>,
    objects: usize,
    types: BTreeMap<i32, usize>,
}

fn header_report(path: &Path) -> anyhow::Result<HeaderReport> {
    debug!(file = %path.display(), "reading header");
    let header = IndexedFile::read_header(path)
        .with_context(|| format!("reading header of {}", path.display()))?;
    Ok(HeaderReport {
        file_id: header.file_id,
        objects: header.identities.len(),
        types: header
            .type_histogram()
            .into_iter()
            .map(|(object_type, count)| (object_type.get(), count))
            .collect(),
        files: header.files,
    })
}

fn cmd_header(args: HeaderArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = header_report(&args.file)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "File:".bold(), args.file.display());
    println!("  File id: {}", report.file_id.to_string().yellow());
    println!("  Objects: {}", report.objects.to_string().bold());
    println!("  Dependencies:");
    for entry in &report.files {
        println!("    {:>4}  {}", entry.file_id.to_string().cyan(), entry.path.display());
    }
    if !report.types.is_empty() {
        println!("  Types:");
        for (object_type, count) in &report.types {
            println!("    {:>4}  {}", object_type.to_string().cyan(), count);
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FileStatus {
    Ok,
    Remapped { stored: FileId },
    Mismatch { expected: FileId, actual: FileId },
    Missing,
    Unreadable { error: String },
}

#[derive(Debug, Serialize)]
struct ManifestRow {
    file_id: FileId,
    name: String,
    #[serde(flatten)]
    status: FileStatus,
}

fn check_manifest(config: &DatabaseConfig) -> anyhow::Result<Vec<ManifestRow>> {
    let manifest_path = config.manifest_path();
    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    let rows = manifest
        .entries()
        .map(|entry| {
            let path = config.file_path(&entry.name);
            let status = if !path.exists() {
                FileStatus::Missing
            } else {
                match IndexedFile::read_file_id(&path) {
                    Ok(actual) if actual != entry.stored_file_id() => FileStatus::Mismatch {
                        expected: entry.stored_file_id(),
                        actual,
                    },
                    Ok(actual) if entry.is_remapped() => FileStatus::Remapped { stored: actual },
                    Ok(_) => FileStatus::Ok,
                    Err(e) => FileStatus::Unreadable {
                        error: e.to_string(),
                    },
                }
            };
            debug!(file = %path.display(), file_id = %entry.file_id, ?status, "checked file");
            ManifestRow {
                file_id: entry.file_id,
                name: entry.name.clone(),
                status,
            }
        })
        .collect();
    Ok(rows)
}

fn cmd_manifest(args: ManifestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => DatabaseConfig {
            root: args.dir.clone(),
            ..DatabaseConfig::load(path)
                .with_context(|| format!("reading configuration {}", path.display()))?
        },
        None => DatabaseConfig::at(&args.dir),
    };
    let rows = check_manifest(&config)?;
    let problems = rows
        .iter()
        .filter(|row| !matches!(row.status, FileStatus::Ok | FileStatus::Remapped { .. }))
        .count();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{} {}", "Manifest:".bold(), config.manifest_path().display());
        for row in &rows {
            let status = match &row.status {
                FileStatus::Ok => "ok".green(),
                FileStatus::Remapped { stored } => format!("remapped from {stored}").yellow(),
                FileStatus::Mismatch { expected, actual } => {
                    format!("stores {actual}, expected {expected}").red()
                }
                FileStatus::Missing => "missing".red(),
                FileStatus::Unreadable { error } => error.as_str().red(),
            };
            println!("  {:>4}  {:<24} {}", row.file_id.to_string().cyan(), row.name, status);
        }
        if problems == 0 {
            println!("{} {} files consistent", "✓".green().bold(), rows.len());
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} of {} files failed the header check", rows.len());
    }
    Ok(())
}

fn cmd_file_id(args: FileIdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file_id = IndexedFile::read_file_id(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "file_id": file_id })),
        OutputFormat::Text => println!("{file_id}"),
    }
    Ok(())
}
