use std::io::{Read, Write};

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use tskv_store::{rollback, BackendConfig, Driver, EmbeddedConfig, EtcdConfig, StorageDriver};
use tskv_types::{generate_uuid, timestamp_tag, AddressPath, Value};

use crate::cli::*;

/// Hierarchy under which the CLI keeps the tagged history of every key.
const ARCHIVE: &str = "archive";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let driver = Driver::open(&config).context("cannot open backend")?;
    driver.setup().context("cannot set up backend")?;
    debug!(backend = driver.backend_name(), "backend ready");

    let out = Output { format: cli.format };
    let result = match cli.command {
        Command::Get(args) => cmd_get(&driver, args),
        Command::Set(args) => cmd_set(&driver, &out, args),
        Command::Rollback(args) => cmd_rollback(&driver, &out, args),
        Command::List(args) => cmd_list(&driver, &out, args),
        Command::Keys(args) => cmd_keys(&driver, &out, args),
        Command::Lock(args) => cmd_lock(&driver, &out, args),
        Command::Unlock(args) => cmd_unlock(&driver, &out, args),
    };

    driver.teardown().context("cannot tear down backend")?;
    result
}

/// Backend configuration from the config file, then the backend flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<BackendConfig> {
    let mut config = match &cli.config {
        Some(path) => BackendConfig::from_toml_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => BackendConfig::default(),
    };

    let kind = cli.backend.or({
        if cli.db.is_some() && cli.etcd.is_empty() {
            Some(BackendKind::Embedded)
        } else {
            None
        }
    });
    match (kind, &config) {
        (Some(BackendKind::Embedded), BackendConfig::Etcd(_)) => {
            config = BackendConfig::Embedded(EmbeddedConfig::default());
        }
        (Some(BackendKind::Etcd), BackendConfig::Embedded(_)) => {
            config = BackendConfig::Etcd(EtcdConfig::default());
        }
        _ => {}
    }

    match &mut config {
        BackendConfig::Etcd(etcd) => {
            if !cli.etcd.is_empty() {
                etcd.endpoints = cli.etcd.clone();
            }
            if let Some(ns) = &cli.namespace {
                etcd.namespace = ns.clone();
            }
        }
        BackendConfig::Embedded(embedded) => {
            if let Some(db) = &cli.db {
                embedded.path = db.clone();
            }
            if let Some(ns) = &cli.namespace {
                embedded.namespace = ns.clone();
            }
        }
    }
    Ok(config)
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    fn print_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }
}

fn archive() -> anyhow::Result<AddressPath> {
    AddressPath::parse(ARCHIVE).context("invalid archive path")
}

fn read_input(source: &str) -> anyhow::Result<Vec<u8>> {
    let raw = if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("cannot read value from stdin")?;
        buf
    } else {
        std::fs::read(source).with_context(|| format!("cannot read value from {source}"))?
    };
    Ok(trim_trailing_newlines(raw))
}

fn trim_trailing_newlines(mut bytes: Vec<u8>) -> Vec<u8> {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    bytes
}

fn cmd_get(driver: &Driver, args: GetArgs) -> anyhow::Result<()> {
    let archive = archive()?;
    let mut value = Value::empty(&args.key);
    driver
        .get(&mut value, Some(&archive))
        .with_context(|| format!("cannot get {}", args.key))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(value.bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn cmd_set(driver: &Driver, out: &Output, args: SetArgs) -> anyhow::Result<()> {
    let bytes = read_input(&args.value)?;
    let tag = args.tag.unwrap_or_else(timestamp_tag);
    let archive = archive()?;

    let mut value = Value::new(&args.key, bytes);
    driver
        .save_tag(&mut value, Some(&archive), &tag)
        .with_context(|| format!("cannot archive {} as {tag}", args.key))?;
    driver
        .save_tag(&mut value, None, &tag)
        .with_context(|| format!("cannot set {}", args.key))?;

    if out.json() {
        out.print_json(serde_json::json!({ "key": args.key, "tag": tag }))
    } else {
        println!("{} Set {} ({})", "✓".green().bold(), args.key.bold(), tag.yellow());
        Ok(())
    }
}

fn cmd_rollback(driver: &Driver, out: &Output, args: RollbackArgs) -> anyhow::Result<()> {
    let archive = archive()?;
    let new_tag = timestamp_tag();

    let mut value = Value::empty(&args.key);
    rollback(driver, &mut value, &archive, &args.tag, &new_tag)
        .with_context(|| format!("cannot roll {} back to {}", args.key, args.tag))?;

    if out.json() {
        out.print_json(serde_json::json!({
            "key": args.key,
            "restored": args.tag,
            "tag": new_tag,
        }))
    } else {
        println!(
            "{} Rolled {} back to {} (saved as {})",
            "✓".green().bold(),
            args.key.bold(),
            args.tag.yellow(),
            new_tag.yellow()
        );
        Ok(())
    }
}

fn cmd_list(driver: &Driver, out: &Output, args: ListArgs) -> anyhow::Result<()> {
    let archive = archive()?;
    let versions = driver
        .get_versions(&Value::empty(&args.key), Some(&archive))
        .with_context(|| format!("cannot list versions of {}", args.key))?;

    if out.json() {
        return out.print_json(serde_json::json!({ "key": args.key, "versions": versions }));
    }
    if versions.is_empty() {
        println!("No versions of {}.", args.key.bold());
    }
    for version in &versions {
        if version == tskv_types::LATEST {
            println!("  {}", version.green());
        } else {
            println!("  {}", version.yellow());
        }
    }
    Ok(())
}

fn cmd_keys(driver: &Driver, out: &Output, args: KeysArgs) -> anyhow::Result<()> {
    let folders = driver
        .get_keys(&args.prefix, &args.separator)
        .with_context(|| format!("cannot list keys under {}", args.prefix))?;

    if out.json() {
        return out.print_json(serde_json::json!({ "prefix": args.prefix, "keys": folders }));
    }
    if folders.is_empty() {
        println!("No keys under {}.", args.prefix.bold());
    }
    for folder in &folders {
        println!("  {}", folder.cyan());
    }
    Ok(())
}

fn cmd_lock(driver: &Driver, out: &Output, args: LockArgs) -> anyhow::Result<()> {
    let owner = args.value.unwrap_or_else(generate_uuid);
    driver
        .lock(&args.key, &owner)
        .with_context(|| format!("cannot lock {}", args.key))?;

    if out.json() {
        out.print_json(serde_json::json!({ "key": args.key, "owner": owner }))
    } else {
        println!("{} Locked {} ({})", "✓".green().bold(), args.key.bold(), owner.dimmed());
        Ok(())
    }
}

fn cmd_unlock(driver: &Driver, out: &Output, args: UnlockArgs) -> anyhow::Result<()> {
    driver
        .unlock(&args.key)
        .with_context(|| format!("cannot unlock {}", args.key))?;

    if out.json() {
        out.print_json(serde_json::json!({ "key": args.key, "unlocked": true }))
    } else {
        println!("{} Unlocked {}", "✓".green().bold(), args.key.bold());
        Ok(())
    }
}
