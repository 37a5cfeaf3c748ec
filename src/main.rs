use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod engine;
mod storage;
mod sync;

/// wordloop - spaced-repetition vocabulary trainer
/// Recall, spell, and let the schedule bring words back
#[derive(Parser)]
#[command(name = "wordloop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Spaced-repetition vocabulary trainer", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and default settings
    Init,

    /// Show today's review and new-word counts
    Today,

    /// List today's study queue without starting a session
    Queue {
        /// Study mode: all, review, new
        #[arg(long, default_value = "all")]
        mode: String,
    },

    /// Start an interactive study session
    Study {
        /// Study mode: all, review, new
        #[arg(long, default_value = "all")]
        mode: String,
    },

    /// Manage wordlists
    Wordlist {
        #[command(subcommand)]
        action: WordlistAction,
    },

    /// Manage words
    Word {
        #[command(subcommand)]
        action: WordAction,
    },

    /// Read or change learner settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show recent study sessions
    History {
        /// Number of sessions to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Export progress to a file
    Export {
        /// Output file path
        #[arg(long, default_value = "wordloop-progress.json")]
        output: String,
        /// Encrypt the export with a passphrase
        #[arg(long)]
        encrypted: bool,
        /// Passphrase for encryption (reads from WORDLOOP_SYNC_KEY env var if not provided)
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Import progress from a file
    Import {
        /// Input file path
        input: String,
        /// Passphrase for decryption (reads from WORDLOOP_SYNC_KEY env var if not provided)
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Sync progress through a shared directory
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum WordlistAction {
    /// Create a wordlist (or rename an existing one)
    Create {
        id: String,
        /// Display name, defaults to the id
        #[arg(long)]
        name: Option<String>,
    },

    /// List wordlists; the active one is starred
    List,
}

#[derive(Subcommand)]
enum WordAction {
    /// Add a word to a wordlist
    Add {
        /// Target wordlist id
        #[arg(long)]
        list: String,
        word: String,
        meaning: String,
        #[arg(long)]
        phonetic: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective settings
    List,

    Get { key: String },

    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Point sync at a shared directory
    Init {
        /// Directory other devices also see (cloud drive, network mount)
        #[arg(long)]
        dir: String,
        /// Store progress in plain JSON
        #[arg(long)]
        no_encrypt: bool,
    },

    /// Export progress to the shared directory
    Push {
        /// Passphrase for encryption (reads from WORDLOOP_SYNC_KEY env var if not provided)
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Merge progress from the shared directory
    Pull {
        /// Passphrase for decryption (reads from WORDLOOP_SYNC_KEY env var if not provided)
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Show sync status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // stdout belongs to the study prompts
        .init();

    match cli.command {
        Commands::Init => {
            info!("Initializing wordloop");
            commands::init().await?;
        }
        Commands::Today => {
            commands::show_today().await?;
        }
        Commands::Queue { mode } => {
            commands::show_queue(&mode).await?;
        }
        Commands::Study { mode } => {
            commands::study(&mode).await?;
        }
        Commands::Wordlist { action } => match action {
            WordlistAction::Create { id, name } => {
                commands::create_wordlist(&id, name.as_deref()).await?;
            }
            WordlistAction::List => {
                commands::list_wordlists().await?;
            }
        },
        Commands::Word { action } => match action {
            WordAction::Add { list, word, meaning, phonetic } => {
                commands::add_word(&list, &word, &meaning, phonetic.as_deref()).await?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::List => commands::config_list().await?,
            ConfigAction::Get { key } => commands::config_get(&key).await?,
            ConfigAction::Set { key, value } => commands::config_set(&key, &value).await?,
        },
        Commands::History { limit } => {
            commands::history(limit).await?;
        }
        Commands::Export { output, encrypted, passphrase } => {
            commands::export(&output, encrypted, passphrase).await?;
        }
        Commands::Import { input, passphrase } => {
            commands::import(&input, passphrase).await?;
        }
        Commands::Sync { action } => match action {
            SyncAction::Init { dir, no_encrypt } => {
                commands::sync_init(&dir, no_encrypt).await?;
            }
            SyncAction::Push { passphrase } => {
                commands::sync_push(passphrase).await?;
            }
            SyncAction::Pull { passphrase } => {
                commands::sync_pull(passphrase).await?;
            }
            SyncAction::Status => {
                commands::sync_status().await?;
            }
        },
    }

    Ok(())
}
