use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use lore_diff::{diff_payloads, PathChange};
use lore_merge::{conflict_description, MergeEngine, MergeResult, Resolutions};
use lore_sdk::LoreConfig;
use lore_store::{compress_payload, decompress_payload};
use lore_types::{payload_from_value, EntityType, Payload};
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;

/// Argument value denoting an absent payload.
const ABSENT: &str = "none";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        format,
        config,
        ..
    } = cli;
    let settings = match (&command, config.as_deref()) {
        (Command::Config(args), _) if args.defaults => LoreConfig::default(),
        (_, Some(path)) => LoreConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        (_, None) => LoreConfig::default(),
    };

    match command {
        Command::Merge(args) => cmd_merge(&settings, args, format),
        Command::Diff(args) => cmd_diff(args, format),
        Command::Compress(args) => cmd_compress(&settings, args, format),
        Command::Config(_) => cmd_config(&settings, format),
    }
}

fn cmd_merge(settings: &LoreConfig, args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = settings.merge.clone();
    config.excluded_paths.extend(args.exclude);
    let engine = MergeEngine::new(config);
    let entity_type = args
        .entity_type
        .as_deref()
        .map(str::parse::<EntityType>)
        .transpose()?;

    let base = read_payload(&args.base)?;
    let source = read_payload(&args.source)?;
    let target = read_payload(&args.target)?;

    if let Some(path) = &args.resolutions {
        let resolutions = read_resolutions(path)?;
        let merged = match &entity_type {
            Some(t) => engine.apply_resolutions_for(
                t,
                base.as_ref(),
                source.as_ref(),
                target.as_ref(),
                &resolutions,
            ),
            None => engine.apply_resolutions(
                base.as_ref(),
                source.as_ref(),
                target.as_ref(),
                &resolutions,
            ),
        }?;
        return print_merged(merged.as_ref(), format);
    }

    let result = match &entity_type {
        Some(t) => engine.detect_conflicts_for(t, base.as_ref(), source.as_ref(), target.as_ref()),
        None => engine.detect_conflicts(base.as_ref(), source.as_ref(), target.as_ref()),
    };
    debug!(conflicts = result.conflicts.len(), "merge computed");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_merge_result(&result)?,
    }
    Ok(())
}

fn print_merge_result(result: &MergeResult) -> anyhow::Result<()> {
    if !result.has_conflicts {
        return print_merged(result.merged_payload.as_ref(), OutputFormat::Text);
    }
    println!(
        "{} {} conflict(s)",
        "✗".red().bold(),
        result.conflicts.len().to_string().bold()
    );
    for conflict in &result.conflicts {
        let path = if conflict.path.is_empty() {
            "(entity)".to_string()
        } else {
            conflict.path.clone()
        };
        println!("  {} {}", path.yellow(), conflict.kind.to_string().dimmed());
        println!("    {}", conflict_description(conflict));
    }
    Ok(())
}

fn print_merged(merged: Option<&Payload>, format: OutputFormat) -> anyhow::Result<()> {
    match (format, merged) {
        (OutputFormat::Json, Some(payload)) => println!("{}", serde_json::to_string_pretty(payload)?),
        (OutputFormat::Json, None) => println!("null"),
        (OutputFormat::Text, Some(payload)) => {
            println!("{} Merged cleanly", "✓".green().bold());
            println!("{}", serde_json::to_string_pretty(payload)?);
        }
        (OutputFormat::Text, None) => {
            println!("{} Merged cleanly: entity {}", "✓".green().bold(), "deleted".red());
        }
    }
    Ok(())
}

fn cmd_diff(args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    let old = read_payload(&args.old)?.unwrap_or_default();
    let new = read_payload(&args.new)?.unwrap_or_default();
    let diff = diff_payloads(&old, &new);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }
    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    for change in &diff.changes {
        match change {
            PathChange::Added { path, value } => {
                println!("{} {}: {}", "+".green(), path.green(), value)
            }
            PathChange::Removed { path, value } => {
                println!("{} {}: {}", "-".red(), path.red(), value)
            }
            PathChange::Modified { path, old, new } => {
                println!("{} {}: {} → {}", "~".yellow(), path.yellow(), old, new)
            }
        }
    }
    println!(
        "{} added, {} removed, {} modified",
        diff.additions(),
        diff.removals(),
        diff.modifications()
    );
    Ok(())
}

fn cmd_compress(settings: &LoreConfig, args: CompressArgs, format: OutputFormat) -> anyhow::Result<()> {
    let payload = read_payload(&args.payload)?
        .with_context(|| format!("{ABSENT:?} is not a payload to compress"))?;
    let level = args.level.unwrap_or(settings.store.compression_level);
    let compressed = compress_payload(&payload, level)?;
    let restored = decompress_payload(&compressed, true)?;
    anyhow::ensure!(restored == payload, "round trip changed the payload");

    let ratio = if compressed.raw_len == 0 {
        0.0
    } else {
        compressed.compressed_len() as f64 / compressed.raw_len as f64
    };
    match format {
        OutputFormat::Json => {
            let report = json!({
                "level": level,
                "raw_len": compressed.raw_len,
                "compressed_len": compressed.compressed_len(),
                "ratio": ratio,
                "crc32": format!("{:08x}", compressed.crc32),
                "digest": compressed.digest_hex(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} Compressed at level {}", "✓".green().bold(), level);
            println!("  Raw:        {} bytes", compressed.raw_len);
            println!(
                "  Compressed: {} bytes ({:.1}%)",
                compressed.compressed_len(),
                ratio * 100.0
            );
            println!("  CRC32:      {:08x}", compressed.crc32);
            println!("  Digest:     {}", compressed.digest_hex().cyan());
        }
    }
    Ok(())
}

fn cmd_config(settings: &LoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(settings)?),
        OutputFormat::Text => print!("{}", settings.to_toml_string()?),
    }
    Ok(())
}

/// Read a payload argument: a JSON object file, or `none` for absent.
fn read_payload(arg: &str) -> anyhow::Result<Option<Payload>> {
    if arg == ABSENT {
        return Ok(None);
    }
    let text = std::fs::read_to_string(arg).with_context(|| format!("reading {arg}"))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("parsing {arg}"))?;
    let payload = payload_from_value(value).with_context(|| format!("{arg} is not a payload"))?;
    Ok(Some(payload))
}

fn read_resolutions(path: &Path) -> anyhow::Result<Resolutions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
