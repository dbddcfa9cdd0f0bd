use pocketlm::config::PocketlmConfig;
use pocketlm::credentials::{CredentialStore, FileCredentialStore};
use pocketlm::engine::mock::MockProvider;
use pocketlm::model::{DownloadState, ModelDescriptor};
use pocketlm::session::SessionManager;
use pocketlm::VERSION;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pocketlm", version, about = "On-device LLM session manager")]
struct CliArgs {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List known models and their download status
    Models,
    /// Download a model's weight file
    Download {
        /// Model id from the catalog
        id: String,
    },
    /// Show or set the access token used for gated downloads
    Token {
        /// New token value; omit to show whether one is stored
        value: Option<String>,
    },
    /// Interactive chat over a simulated engine (for plumbing checks)
    Chat {
        /// Model id from the catalog
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("pocketlm v{} starting", VERSION);

    let exit_code = match run(&args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: &CliArgs) -> Result<()> {
    let config = PocketlmConfig::from_env().context("Failed to load configuration")?;
    config
        .ensure_data_dir()
        .context("Failed to prepare data directory")?;
    let credentials = Arc::new(FileCredentialStore::new(&config.data_dir));

    match &args.command {
        Commands::Models => handle_models(config, credentials),
        Commands::Download { id } => handle_download(config, credentials, id).await,
        Commands::Token { value } => handle_token(credentials, value.as_deref()),
        Commands::Chat { id } => handle_chat(config, credentials, id).await,
    }
}

fn find_model(id: &str) -> Result<ModelDescriptor> {
    ModelDescriptor::find_builtin(id).with_context(|| {
        let known: Vec<String> = ModelDescriptor::builtin()
            .into_iter()
            .map(|m| m.id)
            .collect();
        format!("Unknown model '{}'. Known models: {}", id, known.join(", "))
    })
}

fn handle_models(config: PocketlmConfig, credentials: Arc<FileCredentialStore>) -> Result<()> {
    let manager = SessionManager::new(config, Arc::new(MockProvider::new()), credentials)?;

    for model in ModelDescriptor::builtin() {
        let status = if manager.is_downloaded(&model) {
            "downloaded"
        } else {
            "not downloaded"
        };
        println!("{:<12} {:<24} [{}]", model.id, model.display_name, status);
    }
    Ok(())
}

async fn handle_download(
    config: PocketlmConfig,
    credentials: Arc<FileCredentialStore>,
    id: &str,
) -> Result<()> {
    let model = find_model(id)?;
    let manager = SessionManager::new(config, Arc::new(MockProvider::new()), credentials)?;

    if manager.is_downloaded(&model) {
        println!("{} is already downloaded", model.id);
        return Ok(());
    }

    let bar = ProgressBar::new_spinner();
    let mut events = manager.acquire(&model);
    while let Some(event) = events.next().await {
        match event {
            DownloadState::Started => bar.set_message(format!("Downloading {}", model.id)),
            DownloadState::Progress {
                bytes_done,
                bytes_total,
            } => {
                if let Some(total) = bytes_total {
                    if bar.length() != Some(total) {
                        bar.set_length(total);
                        bar.set_style(
                            ProgressStyle::with_template(
                                "{msg} [{bar:40}] {bytes}/{total_bytes} ({eta})",
                            )
                            .unwrap_or_else(|_| ProgressStyle::default_bar()),
                        );
                    }
                }
                bar.set_position(bytes_done);
            }
            DownloadState::Complete { path } => {
                bar.finish_and_clear();
                println!("Downloaded to {}", path.display());
            }
            DownloadState::Error(e) => {
                bar.finish_and_clear();
                if e.needs_credentials() {
                    bail!(
                        "{}\nThis model looks gated. Store a token with: pocketlm token <value>",
                        e
                    );
                }
                bail!("{}", e);
            }
        }
    }
    Ok(())
}

fn handle_token(credentials: Arc<FileCredentialStore>, value: Option<&str>) -> Result<()> {
    match value {
        Some(token) => {
            credentials
                .set_token(token)
                .context("Failed to store token")?;
            println!("Token stored");
        }
        None => match credentials.token() {
            Some(_) => println!("A token is stored"),
            None => println!("No token stored"),
        },
    }
    Ok(())
}

async fn handle_chat(
    config: PocketlmConfig,
    credentials: Arc<FileCredentialStore>,
    id: &str,
) -> Result<()> {
    let model = find_model(id)?;
    let manager = SessionManager::new(config, Arc::new(MockProvider::new()), credentials)?;

    if !manager.is_downloaded(&model) {
        bail!(
            "{} is not downloaded yet. Run: pocketlm download {}",
            model.id,
            model.id
        );
    }

    let backend = manager.initialize(&model).await?;
    println!(
        "{} ready on {} (simulated engine). Empty line exits.",
        model.display_name, backend
    );

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        let mut response = manager.send(line).await?;
        while let Some(chunk) = response.next().await {
            match chunk {
                Ok(text) => {
                    print!("{}", text);
                    std::io::stdout().flush()?;
                }
                Err(e) => {
                    eprintln!("\n[interrupted: {}]", e);
                    break;
                }
            }
        }
        println!();
    }

    manager.cleanup().await;
    Ok(())
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            let level_str = env::var("POCKETLM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            parse_level(&level_str)
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            filter = filter
                .add_directive(format!("pocketlm={}", level).parse().unwrap())
                .add_directive("h2=warn".parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("reqwest=warn".parse().unwrap());
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}
