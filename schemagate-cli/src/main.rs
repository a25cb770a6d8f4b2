use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use schemagate::config::parse_config;
use schemagate::introspection::{generate_sdl, inspect_collection, inspect_table, TableRows};
use schemagate::migration::{plan_all, plan_table, MigrationPlan};
use schemagate::schema::{CollectionSchemas, DbType};
use schemagate::validation::{validate_create, validate_update, OperationKind};
use schemagate::{SchemaSnapshot, Value};
use std::path::{Path, PathBuf};
use std::process;

/// SchemaGate CLI: check documents, updates and DDL plans against a gateway config
#[derive(Parser)]
#[command(name = "schemagate", version, about)]
struct Cli {
    /// Path to the gateway config
    #[arg(long, default_value = "schemagate.yaml")]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, ValueEnum)]
enum UpdateOp {
    One,
    All,
    Upsert,
}

impl From<UpdateOp> for OperationKind {
    fn from(op: UpdateOp) -> Self {
        match op {
            UpdateOp::One => OperationKind::One,
            UpdateOp::All => OperationKind::All,
            UpdateOp::Upsert => OperationKind::Upsert,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the parsed schemas
    Schema {
        /// Database alias (default: all)
        #[arg(long)]
        db: Option<String>,
        /// Table name
        #[arg(long)]
        table: Option<String>,
    },

    /// Validate a document (or array of documents) for a create request
    Validate {
        #[arg(long)]
        db: String,
        #[arg(long)]
        table: String,
        /// JSON literal, or @path to a JSON file
        #[arg(long)]
        doc: String,
    },

    /// Validate an update request
    Update {
        #[arg(long)]
        db: String,
        #[arg(long)]
        table: String,
        #[arg(long, default_value = "one")]
        op: UpdateOp,
        /// Update operators as JSON, or @path
        #[arg(long)]
        update: String,
        /// Filter as JSON, or @path (used by upserts)
        #[arg(long, default_value = "{}")]
        find: String,
    },

    /// Plan the DDL needed to migrate live tables to the declared schema
    Plan {
        #[arg(long)]
        db: String,
        /// Only plan this table and the tables it references
        #[arg(long)]
        table: Option<String>,
        /// YAML/JSON file of introspected rows per live table
        #[arg(long)]
        current: Option<PathBuf>,
    },

    /// Render the SDL of a live table from its introspected rows
    Inspect {
        #[arg(long)]
        db: String,
        #[arg(long)]
        table: String,
        /// YAML/JSON file of introspected rows per live table
        #[arg(long)]
        current: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_config(&cli.config)?;
    let snapshot = SchemaSnapshot::from_config(&config)?;
    log::debug!("Loaded gateway config from {}", cli.config.display());

    match cli.command {
        Command::Schema { db, table } => {
            let output = match (db, table) {
                (None, _) => serde_json::to_value(snapshot.schemas())?,
                (Some(db), None) => serde_json::to_value(collection(&snapshot, &db)?)?,
                (Some(db), Some(table)) => {
                    let fields = snapshot
                        .table(&db, &table)
                        .ok_or_else(|| format!("Table '{table}' not found in database '{db}'"))?;
                    serde_json::to_value(fields)?
                }
            };
            print_output(&output, &cli.format)?;
        }

        Command::Validate { db, table, doc } => {
            let docs = Value::from(read_json_arg(&doc)?);
            let validated = validate_create(&snapshot, &db, &table, &docs)?;
            print_output(&serde_json::Value::from(validated), &cli.format)?;
        }

        Command::Update {
            db,
            table,
            op,
            update,
            find,
        } => {
            let (db_type, _) = database(&snapshot, &db)?;
            let update = Value::document_from_json(read_json_arg(&update)?)
                .ok_or("--update must be a JSON object")?;
            let find = Value::document_from_json(read_json_arg(&find)?).ok_or("--find must be a JSON object")?;
            let validated = validate_update(
                db_type,
                &table,
                collection(&snapshot, &db)?,
                op.into(),
                &update,
                &find,
            )?;
            print_output(&serde_json::Value::from(Value::Object(validated)), &cli.format)?;
        }

        Command::Plan { db, table, current } => {
            let (db_type, db_name) = database(&snapshot, &db)?;
            let desired = collection(&snapshot, &db)?;
            let live = match current {
                Some(path) => inspect_collection(db_type, &read_rows(&path)?, Some(desired))?,
                None => CollectionSchemas::new(),
            };
            let plan = match table {
                Some(table) => plan_table(db_type, &db_name, &table, desired, &live)?,
                None => plan_all(db_type, &db_name, desired, &live)?,
            };
            print_output(&plan_output(&plan), &cli.format)?;
        }

        Command::Inspect { db, table, current } => {
            let (db_type, _) = database(&snapshot, &db)?;
            let rows = read_rows(&current)?;
            let table_rows = rows
                .get(&table)
                .ok_or_else(|| format!("No introspection rows for table '{table}'"))?;
            let previous = snapshot.table(&db, &table);
            let fields = inspect_table(db_type, &table, &table_rows.columns, &table_rows.indexes, previous)?;
            println!("{}", generate_sdl(&table, &fields));
        }
    }

    Ok(())
}

fn database(snapshot: &SchemaSnapshot, db: &str) -> Result<(DbType, String), String> {
    snapshot
        .database(db)
        .map(|info| (info.db_type, info.name.clone()))
        .ok_or_else(|| format!("Unknown database alias '{db}'"))
}

fn collection<'a>(snapshot: &'a SchemaSnapshot, db: &str) -> Result<&'a CollectionSchemas, String> {
    snapshot
        .collection(db)
        .ok_or_else(|| format!("Unknown database alias '{db}'"))
}

/// `@path` reads the JSON from a file, anything else is a JSON literal.
fn read_json_arg(arg: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{path}': {e}"))?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&content)?)
}

fn read_rows(path: &Path) -> Result<IndexMap<String, TableRows>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    Ok(serde_yaml::from_str(&content)?)
}

fn plan_output(plan: &MigrationPlan) -> serde_json::Value {
    let statements: Vec<_> = plan
        .statements
        .iter()
        .map(|s| {
            serde_json::json!({
                "description": s.describe(),
                "destructive": s.is_destructive(),
                "sql": s.to_sql(plan.db_type, &plan.db_name),
            })
        })
        .collect();
    serde_json::json!({
        "db_type": plan.db_type,
        "statements": statements,
        "sql": plan.to_sql(),
    })
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
