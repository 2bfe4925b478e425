use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chaindex_digest::{CommitReport, DigestConfig, Digester, COMMIT_ORDER};
use chaindex_store::{CancellationToken, InMemoryDigestStore};
use colored::Colorize;
use serde_json::{json, Map, Value};

use crate::cli::*;
use crate::input::read_block;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Digest(args) => cmd_digest(args, &cli.format).await,
        Command::Order => cmd_order(&cli.format),
        Command::Config(args) => cmd_config(args, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DigestConfig> {
    match path {
        Some(path) => Ok(DigestConfig::load(path)?),
        None => Ok(DigestConfig::default()),
    }
}

async fn cmd_digest(args: DigestArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    let mut blocks = args
        .blocks
        .iter()
        .map(|path| read_block(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    blocks.sort_by_key(|b| b.height());

    let store = InMemoryDigestStore::new();
    let digester = Digester::new(Arc::new(store.clone()), config)?;

    let ctx = CancellationToken::new();
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut reports = Vec::with_capacity(blocks.len());
    for block in blocks {
        let height = block.height();
        let report = digester
            .digest(&ctx, Arc::new(block))
            .await
            .with_context(|| format!("digesting block {height}"))?;
        if matches!(format, OutputFormat::Text) {
            print_report(&report);
        }
        reports.push(report);
    }

    match format {
        OutputFormat::Text => {
            println!("\nStore:");
            for collection in COMMIT_ORDER {
                println!(
                    "  {:<22} {}",
                    collection.name(),
                    store.count(collection.name()).to_string().bold()
                );
            }
        }
        OutputFormat::Json => {
            let store_counts: Map<String, Value> = COMMIT_ORDER
                .iter()
                .map(|c| (c.name().to_string(), json!(store.count(c.name()))))
                .collect();
            let out = json!({
                "blocks": reports.iter().map(report_json).collect::<Vec<_>>(),
                "store": store_counts,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn print_report(report: &CommitReport) {
    let documents: usize = report.collections.iter().map(|c| c.stats.documents).sum();
    println!(
        "{} Digested block {} ({} documents, {} stale NFT rows removed, {} ms)",
        "✓".green().bold(),
        report.height.to_string().yellow(),
        documents,
        report.deleted,
        report.elapsed.as_millis()
    );
    for c in &report.collections {
        println!(
            "  {:<22} {:>6} in {} chunk(s)",
            c.collection.name().cyan(),
            c.stats.documents,
            c.stats.chunks
        );
    }
}

fn report_json(report: &CommitReport) -> Value {
    let collections: Map<String, Value> = report
        .collections
        .iter()
        .map(|c| {
            (
                c.collection.name().to_string(),
                json!({"documents": c.stats.documents, "chunks": c.stats.chunks}),
            )
        })
        .collect();
    json!({
        "height": report.height,
        "collections": collections,
        "deleted": report.deleted,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

fn cmd_order(format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for (i, c) in COMMIT_ORDER.iter().enumerate() {
                let mode = if c.always_written() {
                    "always".green()
                } else {
                    "when non-empty".dimmed()
                };
                println!("{}. {:<22} {}", i + 1, c.name().bold(), mode);
            }
        }
        OutputFormat::Json => {
            let order: Vec<_> = COMMIT_ORDER
                .iter()
                .map(|c| json!({"collection": c.name(), "always_written": c.always_written()}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
