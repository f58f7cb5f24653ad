use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context as _};
use arca_archive::{Archive, ArchiveConfig, CustomData, MetadataRecord, CONFIG_FILE};
use arca_types::ContentId;
use chrono::{DateTime, Local};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;

struct Context {
    root: PathBuf,
    format: OutputFormat,
}

impl Context {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Open the archive at `--root`; it must have been initialized.
    fn open(&self) -> anyhow::Result<Archive> {
        if !self.root.join(CONFIG_FILE).exists() {
            bail!(
                "no archive at {} (run `arca init` first)",
                self.root.display()
            );
        }
        Archive::open(&self.root)
            .with_context(|| format!("opening archive at {}", self.root.display()))
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context {
        root: cli.root,
        format: cli.format,
    };
    match cli.command {
        Command::Init(args) => cmd_init(&ctx, args),
        Command::Add(args) => cmd_add(&ctx, args),
        Command::Get(args) => cmd_get(&ctx, args),
        Command::Cat(args) => cmd_cat(&ctx, args),
        Command::Rm(args) => cmd_rm(&ctx, args),
        Command::Ls(args) => cmd_ls(&ctx, args),
        Command::Touch(args) => cmd_touch(&ctx, args),
        Command::Alias(args) => cmd_alias(&ctx, args),
        Command::Verify(args) => cmd_verify(&ctx, args),
        Command::Hash(args) => cmd_hash(&ctx, args),
        Command::Custom(args) => cmd_custom(&ctx, args.action),
    }
}

fn parse_id(s: &str) -> anyhow::Result<ContentId> {
    ContentId::parse(s).with_context(|| format!("invalid id {s:?}"))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn record_json(record: &MetadataRecord, modified: Option<SystemTime>) -> Value {
    json!({
        "id": record.id.as_str(),
        "filenames": record.filenames,
        "size": record.size,
        "checksum": record.checksum.to_hex(),
        "has_custom": record.custom.is_some(),
        "modified": modified.map(|t| DateTime::<Local>::from(t).to_rfc3339()),
    })
}

fn format_time(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn cmd_init(ctx: &Context, args: InitArgs) -> anyhow::Result<()> {
    let config_path = ctx.root.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("archive already initialized at {}", ctx.root.display());
    }
    let mut config = ArchiveConfig {
        name: args.name,
        ..ArchiveConfig::default()
    };
    config.blobs.sync_writes = args.sync;
    config.metadata.sync_writes = args.sync;
    config.save(&ctx.root)?;
    let archive = Archive::open_with_config(&ctx.root, config)?;

    if ctx.json() {
        return print_json(&json!({
            "name": archive.name(),
            "root": ctx.root.display().to_string(),
        }));
    }
    println!(
        "{} Initialized archive {} in {}",
        "✓".green().bold(),
        archive.name().bold(),
        ctx.root.display()
    );
    Ok(())
}

fn display_name(path: &Path, name: Option<&str>) -> String {
    name.map(str::to_string)
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn cmd_add(ctx: &Context, args: AddArgs) -> anyhow::Result<()> {
    if args.name.is_some() && args.paths.len() > 1 {
        bail!("--name can only be used with a single path");
    }
    let archive = ctx.open()?;
    let mut added = Vec::new();
    for path in &args.paths {
        let name = display_name(path, args.name.as_deref());
        debug!(path = %path.display(), stream = args.stream, "adding file");
        let id = if args.stream {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            archive.write_stream(&name, BufReader::new(file))?
        } else {
            let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            archive.add_file(&name, &data)?
        };
        let record = archive.get_meta(&id)?;
        if !ctx.json() {
            println!(
                "  {} {} {} ({})",
                "added:".green(),
                id.as_str().yellow(),
                record.canonical_name().unwrap_or_default(),
                human_size(record.size)
            );
        }
        added.push(record_json(&record, None));
    }
    if ctx.json() {
        print_json(&Value::Array(added))?;
    }
    Ok(())
}

fn cmd_get(ctx: &Context, args: GetArgs) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let id = parse_id(&args.id)?;
    let record = archive.get_meta(&id)?;
    let modified = archive.last_touched(&id)?;

    let mut written = None;
    if let Some(out) = &args.output {
        let mut reader = archive.get_file_reader(&id)?;
        let mut file =
            File::create(out).with_context(|| format!("creating {}", out.display()))?;
        written = Some(io::copy(&mut reader, &mut file)?);
        file.flush()?;
    }

    if ctx.json() {
        let mut value = record_json(&record, Some(modified));
        if let (Some(out), Some(n)) = (&args.output, written) {
            value["written"] = json!({ "path": out.display().to_string(), "bytes": n });
        }
        return print_json(&value);
    }

    println!("{}  {}", "id".bold(), record.id.as_str().yellow());
    println!("{}  {}", "names".bold(), record.filenames.join(", "));
    println!("{}  {} ({} bytes)", "size".bold(), human_size(record.size), record.size);
    println!("{}  {}", "checksum".bold(), record.checksum.to_hex().dimmed());
    println!("{}  {}", "touched".bold(), format_time(modified));
    if record.custom.is_some() {
        println!("{}  {}", "custom".bold(), "present".cyan());
    }
    if let (Some(out), Some(n)) = (&args.output, written) {
        println!("{} Wrote {} bytes to {}", "✓".green().bold(), n, out.display());
    }
    Ok(())
}

fn cmd_cat(ctx: &Context, args: IdArg) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let id = parse_id(&args.id)?;
    let mut reader = archive.get_file_reader(&id)?;
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    io::copy(&mut reader, &mut lock)?;
    lock.flush()?;
    Ok(())
}

fn cmd_rm(ctx: &Context, args: RmArgs) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let mut removed = Vec::new();
    for raw in &args.ids {
        let id = parse_id(raw)?;
        archive.remove_file(&id)?;
        debug!(%id, "removed");
        if !ctx.json() {
            println!("  {} {}", "removed:".red(), id.as_str().yellow());
        }
        removed.push(id.to_string());
    }
    if ctx.json() {
        print_json(&json!({ "removed": removed }))?;
    }
    Ok(())
}

fn cmd_ls(ctx: &Context, args: LsArgs) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let records = match &args.prefix {
        Some(prefix) => archive.list_prefix(prefix)?,
        None => archive.list()?,
    };

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let modified = archive.last_touched(&record.id)?;
        rows.push((record, modified));
    }
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    if ctx.json() {
        let values = rows
            .iter()
            .map(|(record, modified)| record_json(record, Some(*modified)))
            .collect();
        return print_json(&Value::Array(values));
    }

    if rows.is_empty() {
        println!("No files stored.");
        return Ok(());
    }
    for (record, modified) in &rows {
        println!(
            "{:<16} {:>10}  {}  {}",
            record.id.as_str().yellow(),
            human_size(record.size),
            format_time(*modified).dimmed(),
            record.filenames.join(", ")
        );
    }
    println!("{} file(s)", rows.len().to_string().bold());
    Ok(())
}

fn cmd_touch(ctx: &Context, args: IdArg) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let id = parse_id(&args.id)?;
    archive.touch(&id)?;
    if ctx.json() {
        return print_json(&json!({ "touched": id.as_str() }));
    }
    println!("{} Touched {}", "✓".green(), id.as_str().yellow());
    Ok(())
}

fn cmd_alias(ctx: &Context, args: AliasArgs) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let id = parse_id(&args.id)?;
    archive.add_filename(&id, &args.name)?;
    let record = archive.get_meta(&id)?;
    if ctx.json() {
        return print_json(&record_json(&record, None));
    }
    println!(
        "{} {} is now known as {}",
        "✓".green(),
        id.as_str().yellow(),
        record.filenames.join(", ")
    );
    Ok(())
}

fn cmd_verify(ctx: &Context, args: VerifyArgs) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    let ids = if args.ids.is_empty() {
        archive.list()?.into_iter().map(|r| r.id).collect()
    } else {
        args.ids
            .iter()
            .map(|s| parse_id(s))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut failed = Vec::new();
    let mut results = Vec::new();
    for id in &ids {
        let intact = archive.verify_file(id)?;
        if !intact {
            failed.push(id.to_string());
        }
        if ctx.json() {
            results.push(json!({ "id": id.as_str(), "intact": intact }));
        } else if intact {
            println!("  {} {}", "ok".green(), id.as_str());
        } else {
            println!("  {} {}", "CORRUPT".red().bold(), id.as_str());
        }
    }
    let leftovers = archive.staging_keys()?;
    debug!(checked = ids.len(), leftovers = leftovers.len(), "verification done");
    if ctx.json() {
        print_json(&json!({ "files": results, "staging_leftovers": leftovers }))?;
    } else {
        if failed.is_empty() {
            println!("{} {} file(s) verified", "✓".green().bold(), ids.len());
        }
        if !leftovers.is_empty() {
            println!(
                "  {} {} staging blob(s) left by interrupted ingestion",
                "note:".yellow(),
                leftovers.len()
            );
        }
    }
    if !failed.is_empty() {
        bail!("{} file(s) failed verification: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn cmd_hash(ctx: &Context, args: HashArgs) -> anyhow::Result<()> {
    let data = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let archive = Archive::in_memory("hash");
    let id = archive.identify(&data)?;
    if ctx.json() {
        return print_json(&json!({ "path": args.path.display().to_string(), "id": id.as_str() }));
    }
    println!("{}  {}", id.as_str().yellow(), args.path.display());
    Ok(())
}

fn cmd_custom(ctx: &Context, action: CustomAction) -> anyhow::Result<()> {
    let archive = ctx.open()?;
    match action {
        CustomAction::Set { id, value, raw } => {
            let id = parse_id(&id)?;
            if raw {
                archive.set_custom(&id, CustomData::new(value.into_bytes()))?;
            } else {
                let parsed: Value =
                    serde_json::from_str(&value).context("value is not valid JSON (use --raw for text)")?;
                archive.set_custom_json(&id, &parsed)?;
            }
            if !ctx.json() {
                println!("{} Custom data set on {}", "✓".green(), id.as_str().yellow());
            }
            Ok(())
        }
        CustomAction::Get { id } => {
            let id = parse_id(&id)?;
            let Some(data) = archive.get_custom(&id)? else {
                if ctx.json() {
                    return print_json(&Value::Null);
                }
                println!("No custom data on {}", id.as_str().yellow());
                return Ok(());
            };
            match data.to_json::<Value>() {
                Ok(value) => print_json(&value),
                Err(_) if ctx.json() => print_json(&json!({ "hex": String::from(data) })),
                Err(_) => match std::str::from_utf8(data.as_bytes()) {
                    Ok(text) => {
                        println!("{text}");
                        Ok(())
                    }
                    Err(_) => {
                        println!("{}", String::from(data));
                        Ok(())
                    }
                },
            }
        }
        CustomAction::Clear { id } => {
            let id = parse_id(&id)?;
            archive.clear_custom(&id)?;
            if !ctx.json() {
                println!("{} Custom data cleared on {}", "✓".green(), id.as_str().yellow());
            }
            Ok(())
        }
    }
}
