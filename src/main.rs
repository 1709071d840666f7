//! # Cardkeep CLI (`cards`)
//!
//! The `cards` binary scans business card photos into contact records and
//! manages the stored contacts. It also starts the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! cards --config ./config/cards.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cards init` | Create the SQLite database and run schema migrations |
//! | `cards list [--search <q>]` | List contacts, newest first |
//! | `cards show <id>` | Print every field of one contact |
//! | `cards scan <photo>` | Crop, extract, duplicate-check, and save |
//! | `cards edit <id> --name ...` | Change fields of a contact |
//! | `cards rotate <id>` | Turn the suggested rotation 90° clockwise |
//! | `cards image <id> --out <file>` | Write the stored card image |
//! | `cards delete <id>` | Delete a contact |
//! | `cards serve` | Start the HTTP API |
//! | `cards completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! cards init --config ./config/cards.toml
//!
//! # Scan a card, saving even when the name already exists
//! GEMINI_API_KEY=... cards scan ./IMG_0042.jpg --on-duplicate save
//!
//! # Fix a misread phone number
//! cards edit 7 --phone "+886 2 2345 6789"
//! ```
//!
//! Logs go to stderr. `RUST_LOG` overrides `--log-level`.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use cardkeep::config;
use cardkeep::contacts::{self, OnDuplicate};
use cardkeep::migrate;
use cardkeep::server;
use cardkeep_core::models::{ContactEdit, Rotation};

/// Cardkeep CLI: photograph a business card, get a contact record.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cards.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cards",
    about = "Cardkeep: a local-first business card scanner",
    version,
    long_about = "Cardkeep crops a photographed business card to the card frame, \
    extracts the contact fields with a multimodal model, warns about duplicate names, \
    and stores the result in SQLite. Contacts can be browsed, edited, and served over HTTP."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cards.toml`.
    #[arg(long, global = true, default_value = "./config/cards.toml")]
    config: PathBuf,

    /// Log level for Cardkeep's own events (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `contacts` table, or
    /// upgrades an existing one. Safe to run repeatedly.
    Init,

    /// List stored contacts, newest first.
    List {
        /// Case-insensitive substring matched against name and company.
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Show every field of one contact.
    Show {
        /// Contact id.
        id: i64,
    },

    /// Scan a card photo into a new contact.
    ///
    /// The photo is cropped to the card frame, sent to the configured
    /// extractor, and saved unless a contact with the same name exists.
    Scan {
        /// Path to the photo (JPEG, PNG, or WebP).
        photo: PathBuf,

        /// What to do when the extracted name already exists.
        #[arg(long, value_enum, default_value = "ask")]
        on_duplicate: OnDuplicate,
    },

    /// Edit fields of a contact. Unspecified fields are left unchanged.
    Edit {
        /// Contact id.
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        company: Option<String>,
        /// Office phone.
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        website: Option<String>,
        /// Rotation in degrees: 0, 90, 180, or 270.
        #[arg(long, value_parser = parse_rotation)]
        rotation: Option<Rotation>,
    },

    /// Turn the stored rotation 90° clockwise.
    Rotate {
        /// Contact id.
        id: i64,
    },

    /// Write the stored card image of a contact to a file.
    Image {
        /// Contact id.
        id: i64,
        /// Output path.
        #[arg(long, short)]
        out: PathBuf,
    },

    /// Delete a contact. Deleting a missing id is not an error.
    Delete {
        /// Contact id.
        id: i64,
    },

    /// Start the HTTP API.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

/// Parse a `--rotation` value; only the four cardinal angles are accepted.
fn parse_rotation(s: &str) -> Result<Rotation, String> {
    let degrees: i64 = s
        .parse()
        .map_err(|_| format!("invalid rotation '{}': expected an integer", s))?;
    Rotation::try_from(degrees).map_err(|e| e.to_string())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cardkeep={log_level},cardkeep_core={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "cards", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&cli.log_level);
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::List { search } => {
            contacts::run_list(&cfg, search.as_deref()).await?;
        }
        Commands::Show { id } => {
            contacts::run_show(&cfg, id).await?;
        }
        Commands::Scan {
            photo,
            on_duplicate,
        } => {
            contacts::run_scan(&cfg, &photo, on_duplicate).await?;
        }
        Commands::Edit {
            id,
            name,
            title,
            company,
            phone,
            mobile,
            email,
            address,
            website,
            rotation,
        } => {
            let edit = ContactEdit {
                name,
                title,
                company,
                phone,
                mobile_phone: mobile,
                email,
                address,
                website,
                suggested_rotation: rotation,
            };
            contacts::run_edit(&cfg, id, edit).await?;
        }
        Commands::Rotate { id } => {
            contacts::run_rotate(&cfg, id).await?;
        }
        Commands::Image { id, out } => {
            contacts::run_image(&cfg, id, &out).await?;
        }
        Commands::Delete { id } => {
            contacts::run_delete(&cfg, id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
