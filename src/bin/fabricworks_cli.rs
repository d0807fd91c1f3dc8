//! FabricWorks CLI - JSON-lines front end for the workshop
//!
//! Commands: session, summary, export, report
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when an operation was rejected

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use fabricworks_core::{
    aggregates::{self, Summary},
    export, logging, report,
    ports::{self, DirectoryBackupSink, JsonFlagStore},
    snapshot, Collection, EntityId, FabricForm, Inventory, Outcome, Prompt, ProductForm,
    ProductionForm, Settings, Workshop, WorkshopError,
};

#[derive(Parser)]
#[command(name = "fabricworks-cli")]
#[command(about = "FabricWorks CLI - Fabric stock and production tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to settings file
    #[arg(short, long, default_value = "fabricworks.json", global = true)]
    config: PathBuf,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-memory session reading one JSON command per line from stdin
    Session {
        /// Backup file to restore before the first command
        #[arg(long)]
        restore: Option<PathBuf>,

        /// Start empty instead of with the sample catalog
        #[arg(long)]
        no_samples: bool,

        /// Accept every backup reminder
        #[arg(long)]
        auto_backup: bool,
    },

    /// Print the dashboard summary of a backup
    Summary {
        #[arg(long)]
        from: PathBuf,
    },

    /// Print one collection of a backup as delimited text
    Export {
        #[arg(long)]
        from: PathBuf,

        #[arg(long, value_enum)]
        collection: CollectionArg,
    },

    /// Render the HTML report of a backup
    Report {
        #[arg(long)]
        from: PathBuf,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Fabrics,
    Products,
    Production,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Fabrics => Collection::Fabrics,
            CollectionArg::Products => Collection::Products,
            CollectionArg::Production => Collection::Production,
        }
    }
}

/// One line of session input. `confirmed` is read separately from the line.
#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum SessionCommand {
    AddFabric { form: FabricForm },
    EditFabric { id: EntityId, form: FabricForm },
    DuplicateFabric { id: EntityId },
    DeleteFabric { id: EntityId },
    AddProduct { form: ProductForm },
    EditProduct { id: EntityId, form: ProductForm },
    DuplicateProduct { id: EntityId },
    DeleteProduct { id: EntityId },
    DeleteAllProducts,
    CreateProduction { form: ProductionForm },
    EditProduction { id: EntityId, form: ProductionForm },
    DeleteProduction { id: EntityId },
    List { collection: Collection },
    Summary,
    LowStock,
    RecentProduction,
    Usage,
    Export { collection: Collection },
    Import { collection: Collection, path: PathBuf },
    Snapshot,
    Backup,
    Restore { path: PathBuf },
    Report { path: Option<PathBuf> },
}

/// Non-interactive prompt: confirmations come from `--yes` or the command line.
#[derive(Default)]
struct CliPrompt {
    assume_yes: bool,
    auto_backup: bool,
    confirmed: bool,
    notices: Vec<String>,
}

impl CliPrompt {
    fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

impl Prompt for CliPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        let accepted = self.assume_yes || self.confirmed;
        if !accepted {
            self.notices.push(format!("Not confirmed: {message}"));
        }
        accepted
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn offer_backup(&mut self, total_records: usize) -> bool {
        if !self.auto_backup {
            self.notices.push(format!(
                "You now have {total_records} records. Run a backup so nothing is lost."
            ));
        }
        self.auto_backup
    }
}

type CliWorkshop = Workshop<CliPrompt, DirectoryBackupSink>;

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            println!("{}", json!({ "ok": false, "error": format!("Failed to load settings: {e}") }));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Session { restore, no_samples, auto_backup } => {
            let prompt = CliPrompt { assume_yes: cli.yes, auto_backup, ..Default::default() };
            run_session(&settings, prompt, restore.as_deref(), no_samples)
        }

        Commands::Summary { from } => match load_inventory(&from) {
            Ok(inventory) => {
                print_json(&json!({ "ok": true, "summary": Summary::of(&inventory).rounded() }));
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },

        Commands::Export { from, collection } => {
            let inventory = match load_inventory(&from) {
                Ok(i) => i,
                Err(code) => return code,
            };
            let delimiter = match settings.delimiter_byte() {
                Ok(d) => d,
                Err(e) => return fail(&e.to_string()),
            };
            match export::export_collection(&inventory, collection.into(), delimiter) {
                Ok(exported) => {
                    print!("{}", exported.text);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&e.to_string()),
            }
        }

        Commands::Report { from, out } => {
            let inventory = match load_inventory(&from) {
                Ok(i) => i,
                Err(code) => return code,
            };
            let html = report::render(&inventory, chrono::Local::now());
            match out {
                Some(path) => match fs::write(&path, html) {
                    Ok(()) => {
                        print_json(&json!({ "ok": true, "path": path }));
                        ExitCode::SUCCESS
                    }
                    Err(e) => fail(&format!("Failed to write {}: {e}", path.display())),
                },
                None => {
                    print!("{html}");
                    ExitCode::SUCCESS
                }
            }
        }
    }
}

fn run_session(settings: &Settings, prompt: CliPrompt, restore: Option<&Path>, no_samples: bool) -> ExitCode {
    let sink = DirectoryBackupSink::new(settings.backup_dir.clone());
    let mut workshop: CliWorkshop = match Workshop::with_settings(settings, prompt, sink) {
        Ok(w) => w,
        Err(e) => return fail(&e.to_string()),
    };

    match JsonFlagStore::open(settings.flag_file.clone()) {
        Ok(mut flags) => {
            if let Err(e) = ports::show_welcome(workshop.prompt_mut(), &mut flags) {
                error!(error = %e, "Failed to record welcome flag");
            }
        }
        Err(e) => error!(error = %e, "Failed to open flag store"),
    }

    if let Some(path) = restore {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => return fail(&format!("Failed to read {}: {e}", path.display())),
        };
        workshop.prompt_mut().confirmed = true;
        let restored = workshop.restore(&text);
        workshop.prompt_mut().confirmed = false;
        if let Err(e) = restored {
            return fail(&e.to_string());
        }
    } else if settings.load_samples && !no_samples {
        workshop.load_samples();
    }

    let notices = workshop.prompt_mut().take_notices();
    if !notices.is_empty() {
        print_json(&json!({ "ok": true, "notices": notices }));
    }

    let mut rejected = false;
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => return fail(&format!("Failed to read stdin: {e}")),
        };
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                rejected = true;
                print_json(&json!({ "ok": false, "error": format!("Invalid command: {e}") }));
                continue;
            }
        };
        let confirmed = value.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
        let command: SessionCommand = match serde_json::from_value(value) {
            Ok(c) => c,
            Err(e) => {
                rejected = true;
                print_json(&json!({ "ok": false, "error": format!("Invalid command: {e}") }));
                continue;
            }
        };

        workshop.prompt_mut().confirmed = confirmed;
        let result = execute(&mut workshop, command);
        workshop.prompt_mut().confirmed = false;
        let notices = workshop.prompt_mut().take_notices();

        match result {
            Ok(value) => print_json(&json!({ "ok": true, "result": value, "notices": notices })),
            Err(e) => {
                rejected = true;
                print_json(&json!({ "ok": false, "error": e.to_string(), "notices": notices }));
            }
        }
    }

    if !workshop.inventory().is_empty() {
        let records = workshop.inventory().total_records();
        info!(records, "Session ended with unsaved data");
        print_json(&json!({
            "ok": true,
            "notices": [format!("Session ended with {records} records in memory. Anything not backed up or exported is now lost.")],
        }));
    }

    if rejected {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn execute(workshop: &mut CliWorkshop, command: SessionCommand) -> Result<Value, WorkshopError> {
    let value = match command {
        SessionCommand::AddFabric { form } => json!({ "id": workshop.add_fabric(&form)? }),
        SessionCommand::EditFabric { id, form } => {
            workshop.edit_fabric(id, &form)?;
            json!({ "id": id })
        }
        SessionCommand::DuplicateFabric { id } => json!({ "id": workshop.duplicate_fabric(id)? }),
        SessionCommand::DeleteFabric { id } => outcome(workshop.delete_fabric(id)?),
        SessionCommand::AddProduct { form } => json!({ "id": workshop.add_product(&form)? }),
        SessionCommand::EditProduct { id, form } => {
            workshop.edit_product(id, &form)?;
            json!({ "id": id })
        }
        SessionCommand::DuplicateProduct { id } => json!({ "id": workshop.duplicate_product(id)? }),
        SessionCommand::DeleteProduct { id } => outcome(workshop.delete_product(id)?),
        SessionCommand::DeleteAllProducts => outcome(workshop.delete_all_products()?),
        SessionCommand::CreateProduction { form } => {
            json!({ "id": workshop.create_production(&form)? })
        }
        SessionCommand::EditProduction { id, form } => {
            workshop.edit_production(id, &form)?;
            json!({ "id": id })
        }
        SessionCommand::DeleteProduction { id } => outcome(workshop.delete_production(id)?),
        SessionCommand::List { collection } => {
            let inventory = workshop.inventory();
            match collection {
                Collection::Fabrics => json!(inventory.fabrics),
                Collection::Products => json!(inventory.products),
                Collection::Production => json!(inventory.production_records),
            }
        }
        SessionCommand::Summary => json!(workshop.summary().rounded()),
        SessionCommand::LowStock => {
            json!(aggregates::low_stock(workshop.inventory()).collect::<Vec<_>>())
        }
        SessionCommand::RecentProduction => json!(aggregates::recent_production(workshop.inventory())),
        SessionCommand::Usage => json!(aggregates::usage_by_fabric(workshop.inventory())),
        SessionCommand::Export { collection } => {
            let exported = workshop.export(collection)?;
            json!({ "collection": collection, "rows": exported.rows, "sample": exported.sample, "text": exported.text })
        }
        SessionCommand::Import { collection, path } => {
            let text = read_port_file(&path)?;
            let (applied, rows) = workshop.import(collection, &text)?;
            json!({ "outcome": applied, "rows": rows })
        }
        SessionCommand::Snapshot => json!(workshop.snapshot()),
        SessionCommand::Backup => json!({ "path": workshop.backup()? }),
        SessionCommand::Restore { path } => {
            let text = read_port_file(&path)?;
            outcome(workshop.restore(&text)?)
        }
        SessionCommand::Report { path } => {
            let html = workshop.report();
            match path {
                Some(path) => {
                    fs::write(&path, html).map_err(|source| ports::PortError::Io { path: path.clone(), source })?;
                    json!({ "path": path })
                }
                None => json!({ "html": html }),
            }
        }
    };
    Ok(value)
}

fn outcome(outcome: Outcome) -> Value {
    json!({ "outcome": outcome })
}

fn read_port_file(path: &Path) -> Result<String, WorkshopError> {
    fs::read_to_string(path).map_err(|source| {
        ports::PortError::Io { path: path.to_path_buf(), source }.into()
    })
}

fn load_inventory(path: &Path) -> Result<Inventory, ExitCode> {
    let text = fs::read_to_string(path)
        .map_err(|e| fail(&format!("Failed to read {}: {e}", path.display())))?;
    snapshot::parse_backup(&text)
        .map(|backup| backup.inventory)
        .map_err(|e| fail(&e.to_string()))
}

fn print_json(value: &Value) {
    println!("{value}");
}

fn fail(message: &str) -> ExitCode {
    error!("{message}");
    print_json(&json!({ "ok": false, "error": message }));
    ExitCode::FAILURE
}
