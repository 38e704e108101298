//! wyrm CLI - Offline command assistant over a local reference corpus.

mod logging;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use wyrm_core::{VectorIndex, WyrmConfig, WyrmError};
use wyrm_embed::{GuardedEmbedder, OnnxEmbedder};
use wyrm_generate::OllamaGenerator;
use wyrm_pipeline::{Assistant, IngestOptions, IngestPipeline, SessionRecorder};
use wyrm_query::RetrieverConfig;
use wyrm_store::SqliteIndex;

use crate::logging::{setup_logging, LOG_ONLY};

type Embedder = GuardedEmbedder<OnnxEmbedder>;

/// wyrm - Offline AI-assisted command suggestions from local manual pages
#[derive(Parser)]
#[command(name = "wyrm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/wyrm/config.toml or ./wyrm.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Index path (overrides the configuration)
    #[arg(short, long, global = true)]
    index: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process and store a directory of reference files
    Ingest {
        /// Corpus directory (default: ingest.directory)
        directory: Option<PathBuf>,
    },

    /// Ask for a command suggestion
    Query {
        /// Query text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Start an interactive chat session
    Chat,

    /// View previous session history
    History,

    /// Show index statistics
    Stats,
}

fn load_config(cli: &Cli) -> Result<WyrmConfig, WyrmError> {
    let mut config = match &cli.config {
        Some(path) => WyrmConfig::load(path)?,
        None => WyrmConfig::load_default()?,
    };

    if let Some(index) = &cli.index {
        config.index.path = index.clone();
    }

    Ok(config)
}

/// Log and print a fatal error, then exit with status 1.
fn fatal(e: WyrmError) -> ! {
    error!(target: LOG_ONLY, "{}", e);
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn open_index(config: &WyrmConfig) -> Result<Arc<SqliteIndex>, WyrmError> {
    let index = SqliteIndex::open(&config.index.path, config.index.dimension)?;
    Ok(Arc::new(index))
}

fn open_embedder(config: &WyrmConfig) -> Result<Arc<Embedder>, WyrmError> {
    let embedder = OnnxEmbedder::new(&config.embedding)?;
    Ok(Arc::new(GuardedEmbedder::new(embedder, config.embedding.policy())))
}

fn build_assistant(
    config: &WyrmConfig,
) -> Result<Assistant<Embedder, SqliteIndex, OllamaGenerator>, WyrmError> {
    let embedder = open_embedder(config)?;
    let index = open_index(config)?;
    let generator = Arc::new(OllamaGenerator::new(&config.generation)?);

    Ok(Assistant::new(
        embedder,
        index,
        generator,
        SessionRecorder::new(&config.session.history_path),
        RetrieverConfig::from(&config.retrieval),
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    setup_logging(&config.logging.path, &config.logging.level, cli.verbose);

    match cli.command {
        Commands::Ingest { directory } => {
            let directory = directory.unwrap_or_else(|| config.ingest.directory.clone());
            if let Err(e) = ingest(&config, directory).await {
                fatal(e);
            }
        }
        Commands::Query { text } => {
            let assistant = build_assistant(&config).unwrap_or_else(|e| fatal(e));
            let query = text.join(" ");
            match assistant.ask(&query).await {
                Ok(response) => println!("{}", response),
                Err(e) => fatal(e),
            }
        }
        Commands::Chat => {
            let assistant = build_assistant(&config).unwrap_or_else(|e| fatal(e));
            chat(&assistant).await?;
        }
        Commands::History => {
            history(&SessionRecorder::new(&config.session.history_path));
        }
        Commands::Stats => {
            let index = open_index(&config).unwrap_or_else(|e| fatal(e));
            stats(index.as_ref(), &config).await;
        }
    }

    Ok(())
}

/// Index `directory`. A missing directory is reported and is not an error.
async fn ingest(config: &WyrmConfig, directory: PathBuf) -> Result<(), WyrmError> {
    let embedder = open_embedder(config)?;
    let index = open_index(config)?;
    let pipeline = IngestPipeline::new(embedder, index, IngestOptions::from(config))?;

    match pipeline.ingest(&directory).await {
        Ok(report) => {
            println!("{}", report);
            for (file, reason) in &report.files_failed {
                eprintln!("  {} - Error: {}", file, reason);
            }
            Ok(())
        }
        Err(e @ WyrmError::DirectoryNotFound { .. }) => {
            error!(target: LOG_ONLY, "{}", e);
            eprintln!("Error: {}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn chat(
    assistant: &Assistant<Embedder, SqliteIndex, OllamaGenerator>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("AI Hacking Assistant (type 'exit' to quit)");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            println!("Exiting chat...");
            break;
        }

        match assistant.ask(input).await {
            Ok(response) => println!("\nAI: {}", response),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn history(recorder: &SessionRecorder) {
    match recorder.history() {
        Ok(Some(content)) => print!("{}", content),
        Ok(None) => println!("No session history found."),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn stats(index: &SqliteIndex, config: &WyrmConfig) {
    match index.stats().await {
        Ok(stats) => {
            println!("Index: {}", config.index.path.display());
            println!("Entries: {}", stats.entries);
            println!("Documents: {}", stats.documents);
            println!("Dimension: {}", stats.dimension);
            println!("Storage: {} bytes", stats.storage_bytes);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_words() {
        let cli = Cli::try_parse_from(["wyrm", "query", "list", "hidden", "files"]).unwrap();
        match cli.command {
            Commands::Query { text } => assert_eq!(text.join(" "), "list hidden files"),
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn test_query_requires_text() {
        assert!(Cli::try_parse_from(["wyrm", "query"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "wyrm",
            "ingest",
            "manpages",
            "--index",
            "/tmp/idx.sqlite",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.index, Some(PathBuf::from("/tmp/idx.sqlite")));
        assert!(matches!(
            cli.command,
            Commands::Ingest { directory: Some(ref d) } if d == &PathBuf::from("manpages")
        ));
    }

    #[test]
    fn test_index_override() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("wyrm.toml");
        std::fs::write(&config_path, "[retrieval]\ntop_k = 5\n").unwrap();

        let cli = Cli::try_parse_from([
            "wyrm",
            "--config",
            config_path.to_str().unwrap(),
            "--index",
            "custom.sqlite",
            "stats",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.index.path, PathBuf::from("custom.sqlite"));
    }

    fn config_in(dir: &std::path::Path) -> WyrmConfig {
        let mut config = WyrmConfig::default();
        config.index.path = dir.join("index.sqlite");
        config.embedding.model_path = dir.join("model.onnx");
        config.embedding.tokenizer_path = dir.join("tokenizer.json");
        config
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = open_embedder(&config).err().unwrap();
        assert_eq!(err.error_code(), "MODEL_UNAVAILABLE");
        assert!(err.is_fatal());

        let err = build_assistant(&config).err().unwrap();
        assert_eq!(err.error_code(), "MODEL_UNAVAILABLE");
    }

    #[test]
    fn test_unopenable_index_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.index.path = dir.path().to_path_buf();

        let err = open_index(&config).err().unwrap();
        assert_eq!(err.error_code(), "INDEX_UNAVAILABLE");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_ingest_fails_on_model_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        // The directory is missing too, but the model is checked first.
        let err = ingest(&config, dir.path().join("missing")).await.unwrap_err();
        assert_eq!(err.error_code(), "MODEL_UNAVAILABLE");
        assert!(!config.index.path.exists());
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("Exit"));
        assert!(!is_exit_command("exit now"));
    }
}
