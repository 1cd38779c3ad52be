use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ramble::document::{self, FileBuffer};
use ramble::{init_logging, Config, EnvConfig, Llm};
use tracing::info;

/// Chat with language models inside markdown transcript files
#[derive(Parser)]
#[command(name = "ramble")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the config file path, creating a default config if none exists
    Config,
    /// Start a new transcript, replacing the file's contents
    Open {
        /// Transcript file
        file: PathBuf,
        /// Provider written to the front matter
        #[arg(long, default_value_t = Llm::OpenAI)]
        llm: Llm,
        /// System prompt; repeat for several system messages
        #[arg(long = "system", value_name = "TEXT")]
        system: Vec<String>,
    },
    /// Append a user message
    Append {
        /// Transcript file
        file: PathBuf,
        /// Message text
        question: String,
    },
    /// Stream a reply to the trailing user message into the file
    Chat {
        /// Transcript file
        file: PathBuf,
    },
    /// Rewrite the file in canonical form
    Format {
        /// Transcript file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let env = EnvConfig::from_env();
    init_logging(&env).context("failed to initialize logging")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Config => {
            let path = env.config_file_path()?;
            Config::load_or_bootstrap(&path)?;
            println!("{}", path.display());
        }
        Commands::Open { file, llm, system } => {
            let mut buffer = open_buffer(&file)?;
            document::open(&mut buffer, llm, &system)
                .with_context(|| format!("failed to open transcript {}", file.display()))?;
        }
        Commands::Append { file, question } => {
            let mut buffer = open_buffer(&file)?;
            document::append(&mut buffer, &question)
                .with_context(|| format!("failed to append to {}", file.display()))?;
        }
        Commands::Chat { file } => {
            let path = env.config_file_path()?;
            let config = Config::load_or_bootstrap(&path)?;
            let registry = config.model_registry();

            let mut buffer = open_buffer(&file)?;
            let reply = document::chat(&mut buffer, &registry)
                .with_context(|| format!("chat failed for {}", file.display()))?;
            match reply {
                Some(text) => println!("{text}"),
                None => info!(file = %file.display(), "no reply produced"),
            }
        }
        Commands::Format { file } => {
            let mut buffer = open_buffer(&file)?;
            document::format(&mut buffer)
                .with_context(|| format!("failed to format {}", file.display()))?;
        }
    }

    Ok(())
}

fn open_buffer(file: &Path) -> Result<FileBuffer> {
    FileBuffer::open(file).with_context(|| format!("failed to read {}", file.display()))
}
