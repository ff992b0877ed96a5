mod render;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use claimlog_core::catalog::{Catalog, ConditionDefinition};
use claimlog_core::config::Settings;
use claimlog_core::correlation;
use claimlog_core::entry::{FieldValue, LogData};
use claimlog_core::export::{export, export_filename, parse_export, ExportFormat};
use claimlog_core::filter::{apply_with_catalog, DateRange, FilterCriteria, SeverityRange, SortBy};
use claimlog_core::logbook::{ImportMode, LogBook};
use claimlog_core::stats::{condition_stats_with_catalog, overview};
use claimlog_core::store::FileStore;
use claimlog_core::templates::{SeverityTier, Templates};

#[derive(Parser)]
#[command(name = "claimlog", version, about = "Condition journal and VA rating estimates")]
struct Cli {
    /// JSON log file (defaults to the configured data file)
    #[arg(long, global = true, env = "CLAIMLOG_DATA")]
    data: Option<PathBuf>,
    /// Start with an empty journal instead of the sample dataset
    #[arg(long, global = true)]
    no_seed: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the conditions that can be logged and their fields
    Conditions {
        #[arg(long)]
        json: bool,
    },
    /// Log a new occurrence of a condition
    Add {
        condition: String,
        /// Prefill fields from a template (mild, moderate, severe)
        #[arg(long)]
        template: Option<SeverityTier>,
        /// Field value as name=value (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing entry
    Edit {
        id: String,
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
        /// Remove a field (repeatable)
        #[arg(long)]
        clear: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry
    Delete { id: String },
    /// Show one entry
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// List entries with optional filters
    List {
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        min_severity: Option<f64>,
        #[arg(long)]
        max_severity: Option<f64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "newest")]
        sort: SortBy,
        #[arg(long)]
        json: bool,
    },
    /// Per-condition statistics and rating estimate
    Stats {
        condition: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Conditions that tend to be logged on the same day
    Correlations {
        #[arg(long)]
        json: bool,
    },
    /// Export the whole journal
    Export {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// File or directory to write; prints to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import entries from a JSON export
    Import {
        file: PathBuf,
        /// Replace the journal instead of merging
        #[arg(long)]
        replace: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show the resolved settings and where each value came from
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Print version information
    Version,
}

#[derive(Copy, Clone, ValueEnum)]
enum Format {
    Json,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Json => ExportFormat::Json,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CLAIMLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let mut settings = Settings::resolve(&cwd)?;
    if let Some(path) = &cli.data {
        settings = settings.with_data_file(path.clone());
    }
    if cli.no_seed {
        settings = settings.without_seed();
    }
    Ok(settings)
}

fn open_logbook(cli: &Cli) -> Result<LogBook<FileStore>> {
    let settings = settings(cli)?;
    let mut store = FileStore::new(settings.data_file.value.clone());
    if !settings.seed_on_first_run.value {
        store = store.without_seed();
    }
    debug!(
        path = %store.path().display(),
        source = %settings.data_file.source,
        "opening log file"
    );
    Ok(LogBook::new(store, settings.load_catalog()?))
}

fn condition<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a ConditionDefinition> {
    catalog.get(id).ok_or_else(|| {
        let known: Vec<&str> = catalog.conditions().iter().map(|c| c.id.as_str()).collect();
        anyhow!("Unknown condition '{}' (known: {})", id, known.join(", "))
    })
}

fn apply_fields(condition: &ConditionDefinition, data: &mut LogData, fields: &[String]) -> Result<()> {
    for raw in fields {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("Field must be name=value: {}", raw))?;
        let name = name.trim();
        let parsed = if name == claimlog_core::entry::TAGS_FIELD {
            FieldValue::List(
                value
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect(),
            )
        } else {
            let schema = condition
                .field(name)
                .ok_or_else(|| anyhow!("{} has no field '{}'", condition.id, name))?;
            schema.parse_input(value)?
        };
        data.insert(name.to_string(), parsed);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_export(out: &Path, format: ExportFormat, body: &str) -> Result<PathBuf> {
    let path = if out.is_dir() {
        out.join(export_filename(Utc::now().date_naive(), format))
    } else {
        out.to_path_buf()
    };
    fs::write(&path, body).with_context(|| format!("write export to {}", path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Command::Version => {
            println!("claimlog {}", claimlog_core::version());
        }
        Command::Config { json } => {
            let settings = settings(&cli)?;
            if *json {
                print_json(&settings)?;
            } else {
                println!("{}", render::settings_block(&settings));
            }
        }
        Command::Conditions { json } => {
            let catalog = settings(&cli)?.load_catalog()?;
            if *json {
                print_json(&catalog.conditions())?;
            } else {
                let blocks: Vec<String> = catalog
                    .conditions()
                    .iter()
                    .map(render::condition_block)
                    .collect();
                println!("{}", blocks.join("\n\n"));
            }
        }
        Command::Add {
            condition: condition_id,
            template,
            fields,
            json,
        } => {
            let book = open_logbook(&cli)?;
            let definition = condition(book.catalog(), condition_id)?;
            let mut data = LogData::new();
            if let Some(tier) = template {
                let prefill = Templates::builtin()
                    .prefill_for(definition, *tier)
                    .ok_or_else(|| anyhow!("No {} template for {}", tier, condition_id))?;
                data.extend(prefill);
            }
            if definition.field("date").is_some() {
                let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
                data.entry("date".to_string()).or_insert(FieldValue::Text(today));
            }
            apply_fields(definition, &mut data, fields)?;
            let entry = book.create(condition_id, data)?;
            if *json {
                print_json(&entry)?;
            } else {
                println!("Logged {}", render::entry_line(&entry, book.catalog()));
            }
        }
        Command::Edit {
            id,
            fields,
            clear,
            json,
        } => {
            let book = open_logbook(&cli)?;
            let existing = book
                .get(id)?
                .ok_or_else(|| anyhow!("Log entry not found: {}", id))?;
            let definition = condition(book.catalog(), &existing.condition_id)?;
            let mut data = existing.data.clone();
            for name in clear {
                data.remove(name);
            }
            apply_fields(definition, &mut data, fields)?;
            let entry = book.update(id, data)?;
            if *json {
                print_json(&entry)?;
            } else {
                println!("Updated {}", render::entry_line(&entry, book.catalog()));
            }
        }
        Command::Delete { id } => {
            let book = open_logbook(&cli)?;
            if book.delete(id)? {
                println!("Deleted {}", id);
            } else {
                println!("No entry {}", id);
            }
        }
        Command::Show { id, json } => {
            let book = open_logbook(&cli)?;
            let entry = book
                .get(id)?
                .ok_or_else(|| anyhow!("Log entry not found: {}", id))?;
            if *json {
                print_json(&entry)?;
            } else {
                println!("{}", render::entry_detail(&entry, book.catalog()));
            }
        }
        Command::List {
            condition: condition_id,
            from,
            to,
            min_severity,
            max_severity,
            search,
            sort,
            json,
        } => {
            let book = open_logbook(&cli)?;
            if let Some(id) = condition_id {
                condition(book.catalog(), id)?;
            }
            let criteria = FilterCriteria {
                condition: condition_id.clone(),
                date_range: DateRange {
                    from: *from,
                    to: *to,
                },
                severity_range: SeverityRange {
                    min: *min_severity,
                    max: *max_severity,
                },
                search_text: search.clone().unwrap_or_default(),
                sort_by: *sort,
            };
            let entries = apply_with_catalog(&book.entries()?, &criteria, book.catalog());
            if *json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("No matching entries.");
            } else {
                for entry in &entries {
                    println!("{}", render::entry_line(entry, book.catalog()));
                }
            }
        }
        Command::Stats {
            condition: condition_id,
            json,
        } => {
            let book = open_logbook(&cli)?;
            let entries = book.entries()?;
            let now = Utc::now();
            let stats = match condition_id {
                Some(id) => {
                    condition(book.catalog(), id)?;
                    vec![condition_stats_with_catalog(&entries, book.catalog(), id, now)]
                }
                None => overview(&entries, book.catalog(), now),
            };
            if *json {
                print_json(&stats)?;
            } else {
                let blocks: Vec<String> = stats
                    .iter()
                    .map(|s| render::stats_block(s, book.catalog()))
                    .collect();
                println!("{}", blocks.join("\n\n"));
            }
        }
        Command::Correlations { json } => {
            let book = open_logbook(&cli)?;
            let report = correlation::analyze(&book.entries()?);
            if *json {
                print_json(&report)?;
            } else {
                println!("{}", render::correlation_block(&report, book.catalog()));
            }
        }
        Command::Export { format, out } => {
            let book = open_logbook(&cli)?;
            let format = ExportFormat::from(*format);
            let body = export(&book.entries()?, format)?;
            match out {
                Some(out) => {
                    let path = write_export(out, format, &body)?;
                    eprintln!("Exported to {}", path.display());
                }
                None => print!("{}", body),
            }
        }
        Command::Import {
            file,
            replace,
            json,
        } => {
            let book = open_logbook(&cli)?;
            let text = fs::read_to_string(file)
                .with_context(|| format!("read import file {}", file.display()))?;
            let entries = parse_export(&text)?;
            if entries.is_empty() && *replace {
                bail!("Refusing to replace the journal with an empty import");
            }
            let mode = if *replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let report = book.import(entries, mode)?;
            if *json {
                print_json(&report)?;
            } else {
                println!(
                    "Imported {} entries ({} skipped), {} total",
                    report.added, report.skipped, report.total
                );
            }
        }
    }
    Ok(())
}
