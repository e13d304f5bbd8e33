//! # Poster Labels CLI (`posters`)
//!
//! ## Usage
//!
//! ```bash
//! posters --config ./config/posters.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `posters init` | Create the SQLite database and run schema migrations |
//! | `posters process <csv>` | Turn a price list into poster labels |
//! | `posters edit <csv> --item N` | Correct one entry and learn from the edit |
//! | `posters learn <orig> <corr> --field F` | Teach a correction directly |
//! | `posters corrections` | List learned corrections |
//! | `posters history` | Show the learn log, newest first |
//! | `posters stats` | Correction counts |
//! | `posters deactivate/activate/remove <id>` | Manage one correction |
//! | `posters sweep` | Purge invalid and degenerate corrections |
//!
//! ## Examples
//!
//! ```bash
//! posters process ofertas.csv --user maria --company loja-centro
//! posters edit ofertas.csv --item 2 --name "REFRIGERANTE COCA-COLA" --price "10,49"
//! posters learn "REFRI" "REFRIGERANTE" --field NOME
//! posters corrections --state inactive --field GRAMAGEM
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use poster_labels::config::{self, Config};
use poster_labels::{learning, logging, migrate, process_cmd};
use poster_labels_core::models::{CorrectionState, FieldKind};
use poster_labels_core::process::{ItemEdit, PrintLayout};

const DEFAULT_CONFIG: &str = "./config/posters.toml";

/// Poster Labels CLI: turns price lists into two-line poster labels and
/// learns from your corrections.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/posters.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "posters",
    about = "Poster Labels - turns supermarket price lists into poster labels",
    version,
    long_about = "Poster Labels parses `description;price` lists, extracts name, weight and \
    variety, groups product families, and formats two-line 16-character poster labels. \
    Every correction made during review is learned and applied to future lists."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/posters.toml`; built-in defaults are used when
    /// that default file does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// User id that scopes corrections. Overrides `[tenant].user_id`.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Company id that scopes corrections. Overrides `[tenant].company_id`.
    #[arg(long, global = true)]
    company: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the corrections and history
    /// tables. Safe to run repeatedly.
    Init,

    /// Turn a price list into poster entries.
    ///
    /// Reads `description;price` rows (no header), extracts and corrects
    /// each field, merges same-name products into families, and prints the
    /// label, price and a summary.
    Process {
        /// Path to the price list.
        csv: PathBuf,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Print layout used for the poster count: `two-per-page` or `one-per-page`.
        #[arg(long, default_value = "two-per-page")]
        layout: PrintLayout,
    },

    /// Correct one entry of a price list and learn from the change.
    ///
    /// Entry ids are the ones printed by `posters process` for the same file.
    Edit {
        /// Path to the price list.
        csv: PathBuf,

        /// Id of the entry to edit.
        #[arg(long)]
        item: i64,

        /// New base name.
        #[arg(long)]
        name: Option<String>,

        /// New weight / volume.
        #[arg(long)]
        weight: Option<String>,

        /// New variety.
        #[arg(long)]
        variety: Option<String>,

        /// New price (`4,50`, `4.50` or `R$ 4,50`).
        #[arg(long)]
        price: Option<String>,

        /// Session id recorded in the history. Random when omitted.
        #[arg(long)]
        session: Option<String>,
    },

    /// Teach a correction directly.
    Learn {
        /// Text as extracted.
        original: String,

        /// Text it should become.
        corrected: String,

        /// Field kind: NOME, GRAMAGEM or VARIEDADE.
        #[arg(long)]
        field: FieldKind,

        /// Session id recorded in the history. Random when omitted.
        #[arg(long)]
        session: Option<String>,
    },

    /// List learned corrections, most used first.
    Corrections {
        /// `active`, `inactive` or `all`.
        #[arg(long, default_value = "active")]
        state: CorrectionState,

        /// Only one field kind: NOME, GRAMAGEM or VARIEDADE.
        #[arg(long)]
        field: Option<FieldKind>,
    },

    /// Show the learn log, newest first.
    History {
        /// Maximum number of entries.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show correction counts.
    Stats,

    /// Stop applying a correction without deleting it.
    Deactivate { id: i64 },

    /// Apply a deactivated correction again.
    Activate { id: i64 },

    /// Delete a correction. Its history is kept.
    Remove { id: i64 },

    /// Remove invalid and degenerate corrections for every tenant.
    Sweep,
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

fn session_or_random(session: Option<String>) -> String {
    session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    logging::init(&cfg.log.filter)?;
    debug!(config = %cli.config.display(), "configuration loaded");

    let tenant = cfg.tenant.key(cli.user.as_deref(), cli.company.as_deref());

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Process { csv, json, layout } => {
            process_cmd::run_process(&cfg, &csv, &tenant, layout, json).await?;
        }
        Commands::Edit {
            csv,
            item,
            name,
            weight,
            variety,
            price,
            session,
        } => {
            let edit = ItemEdit {
                name,
                weight,
                variety,
                price,
            };
            let session = session_or_random(session);
            process_cmd::run_edit(&cfg, &csv, item, &edit, &tenant, &session).await?;
        }
        Commands::Learn {
            original,
            corrected,
            field,
            session,
        } => {
            let session = session_or_random(session);
            learning::run_learn(&cfg, &original, &corrected, field, &tenant, &session).await?;
        }
        Commands::Corrections { state, field } => {
            learning::run_list(&cfg, &tenant, state, field).await?;
        }
        Commands::History { limit } => {
            learning::run_history(&cfg, &tenant, limit).await?;
        }
        Commands::Stats => {
            learning::run_stats(&cfg, &tenant).await?;
        }
        Commands::Deactivate { id } => {
            learning::run_deactivate(&cfg, &tenant, id).await?;
        }
        Commands::Activate { id } => {
            learning::run_activate(&cfg, &tenant, id).await?;
        }
        Commands::Remove { id } => {
            learning::run_remove(&cfg, &tenant, id).await?;
        }
        Commands::Sweep => {
            learning::run_sweep(&cfg).await?;
        }
    }

    Ok(())
}
