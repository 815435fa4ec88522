//! adaf-info - print the structure of a container file as JSON
//!
//! Usage:
//!   adaf-info <file> [--names] [--index] [--full] [--verbose]
//!
//! Without flags the summary from `info()` is printed together with the
//! file attributes and structural warnings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::json;

use adaf::{AdafConfig, DataContainer, IndexLimit, LinkCache, NameField, NameKind, Names};

const USAGE: &str = "Usage: adaf-info <file> [--names] [--index] [--full] [--verbose]";

struct Args {
    path: PathBuf,
    names: bool,
    index: bool,
    full: bool,
    verbose: bool,
}

fn parse_args() -> Result<Args> {
    let mut path = None;
    let mut args = Args {
        path: PathBuf::new(),
        names: false,
        index: false,
        full: false,
        verbose: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--names" => args.names = true,
            "--index" => args.index = true,
            "--full" => args.full = true,
            "--verbose" | "-v" => args.verbose = true,
            "--help" | "-h" => {
                println!("adaf-info {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("{USAGE}");
                println!();
                println!("Flags:");
                println!("  --names    List column names with access expressions");
                println!("  --index    Print the structural index");
                println!("  --full     Include all attributes in the index");
                println!("  --verbose  Log debug output to stderr");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("Unknown flag {flag}\n{USAGE}"),
            file if path.is_none() => path = Some(PathBuf::from(file)),
            extra => bail!("Unexpected argument {extra}\n{USAGE}"),
        }
    }
    args.path = path.context(USAGE)?;
    Ok(args)
}

fn names_json(names: Names) -> serde_json::Value {
    match names {
        Names::Flat(values) => json!(values.iter().map(ToString::to_string).collect::<Vec<_>>()),
        Names::Tuples(items) => json!(items
            .iter()
            .map(|item| item.iter().map(ToString::to_string).collect::<Vec<_>>())
            .collect::<Vec<_>>()),
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let config = AdafConfig::from_env();
    let mut cache = LinkCache::new(config.link_cache_capacity);
    let mut container = DataContainer::open(&args.path, &mut cache)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;

    let output = if args.names {
        names_json(container.names(NameKind::Columns, &[NameField::Name, NameField::Expr])?)
    } else if args.index || args.full {
        let limit = if args.full { None } else { Some(IndexLimit::persisted()) };
        serde_json::to_value(container.index(limit.as_ref())?)?
    } else {
        json!({
            "version": container.version(),
            "package_id": container.package_id(),
            "timestamp": container.timestamp(),
            "user_id": container.user_id(),
            "source_id": container.source_id(),
            "info": container.info()?,
            "warnings": container.warnings()?,
        })
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    container.close(&mut cache)?;
    cache.clear()?;
    Ok(())
}
