use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockdeck::api::inventory::{InventoryUpdate, ListQuery};
use stockdeck::api::brands::BrandInput;
use stockdeck::client::transport::{FileUpload, HttpTransport};
use stockdeck::config::Config;
use stockdeck::jobs::{JobKind, JobStatusPoller};
use stockdeck::session::persist::SessionFile;
use stockdeck::session::SessionStore;
use stockdeck::AppState;

#[derive(Parser, Debug)]
#[command(name = "stockdeck")]
#[command(author, version, about = "Admin console client for inventory, brands and bulk jobs", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "stockdeck.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and persist the session
    Login {
        username: String,
        password: String,
    },
    /// Clear the session
    Logout,
    /// Show the authenticated user's profile
    Profile,
    /// Brand management
    Brands {
        #[command(subcommand)]
        command: BrandsCommand,
    },
    /// Inventory management
    Inventory {
        #[command(subcommand)]
        command: InventoryCommand,
    },
    /// Background job status
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BrandsCommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Bulk-create brands from a file upload
    Import {
        file: PathBuf,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum InventoryCommand {
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        search: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        quantity: Option<i64>,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Submit a bulk update file; progress shows up under `jobs watch`
    BulkUpdate {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// Poll job status until interrupted
    Watch,
    /// Cancel a running job (kind: product, listing or inventory)
    Cancel {
        kind: String,
        job_id: String,
    },
}

fn parse_kind(kind: &str) -> Result<JobKind> {
    match kind {
        "product" => Ok(JobKind::Product),
        "listing" => Ok(JobKind::Listing),
        "inventory" => Ok(JobKind::Inventory),
        other => bail!("unknown job kind: {other} (expected product, listing or inventory)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stockdeck v{}", env!("CARGO_PKG_VERSION"));

    let session_file = SessionFile::new(&config.storage.session_file);
    let store = SessionStore::rehydrate(session_file.load()?);
    store.attach_storage(session_file);

    let transport = Arc::new(
        HttpTransport::new(Duration::from_secs(config.api.timeout_secs))
            .map_err(|e| anyhow::anyhow!("failed to build HTTP transport: {e}"))?,
    );
    let state = AppState::new(config, store, transport);

    match cli.command {
        Command::Login { username, password } => {
            let user = state.auth.login(&username, &password).await?;
            println!("Logged in as {} ({:?})", user.username, user.role);
        }
        Command::Logout => {
            state.auth.logout().await;
            println!("Logged out");
        }
        Command::Profile => {
            let user = state.auth.profile().await?;
            println!("{} <{}> role={:?}", user.username, user.email, user.role);
        }
        Command::Brands { command } => match command {
            BrandsCommand::List => {
                for brand in state.brands.list().await? {
                    println!("{}  {}", brand.id, brand.name);
                }
            }
            BrandsCommand::Create { name, description } => {
                let brand = state.brands.create(&BrandInput { name, description }).await?;
                println!("Created brand {}", brand.id);
            }
            BrandsCommand::Import { file } => {
                let upload = read_upload(&file)?;
                let brands = state.brands.create_from_file(upload).await?;
                println!("Imported {} brands", brands.len());
            }
            BrandsCommand::Delete { id } => {
                state.brands.delete(&id).await?;
                println!("Deleted brand {id}");
            }
        },
        Command::Inventory { command } => match command {
            InventoryCommand::List { page, search } => {
                let result = state
                    .inventory
                    .list(ListQuery {
                        page,
                        per_page: None,
                        search,
                    })
                    .await?;
                for item in &result.items {
                    println!(
                        "{}  {}  qty={}  price={:.2}",
                        item.sku, item.name, item.quantity, item.price
                    );
                }
                println!("{} of {} items", result.items.len(), result.total);
            }
            InventoryCommand::Update { id, quantity, price } => {
                let item = state
                    .inventory
                    .update_item(&id, &InventoryUpdate { quantity, price })
                    .await?;
                println!("Updated {}: qty={} price={:.2}", item.sku, item.quantity, item.price);
            }
            InventoryCommand::BulkUpdate { file } => {
                let upload = read_upload(&file)?;
                let accepted = state.inventory.bulk_update_from_file(upload).await?;
                println!("Accepted as job {}", accepted.job_id);
            }
        },
        Command::Jobs { command } => match command {
            JobsCommand::Watch => {
                let interval = Duration::from_secs(state.config.polling.interval_secs);
                let (poller, handle) =
                    JobStatusPoller::new(state.jobs, state.store.clone(), interval);
                let poller_task = tokio::spawn(poller.run());

                let mut snapshots = handle.snapshots();
                loop {
                    tokio::select! {
                        changed = snapshots.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            if let Some(snapshot) = snapshots.borrow().as_ref() {
                                print_snapshot(snapshot);
                            }
                        }
                        _ = tokio::signal::ctrl_c() => {
                            handle.stop();
                            break;
                        }
                    }
                }
                poller_task.await.ok();
            }
            JobsCommand::Cancel { kind, job_id } => {
                let kind = parse_kind(&kind)?;
                state.jobs.cancel(kind, &job_id).await?;
                println!("Cancellation requested for {job_id}");
            }
        },
    }

    Ok(())
}

fn read_upload(path: &PathBuf) -> Result<FileUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    Ok(FileUpload { file_name, bytes })
}

fn print_snapshot(snapshot: &stockdeck::jobs::StatusSnapshot) {
    let groups = [
        ("products", &snapshot.products),
        ("listings", &snapshot.listings),
        ("inventory", &snapshot.inventory),
    ];
    for (label, jobs) in groups {
        for job in jobs.iter() {
            println!(
                "[{label}] {}  {:?}  {}% ({}/{})",
                job.id, job.status, job.progress, job.processed_items, job.total_items
            );
        }
    }
}
