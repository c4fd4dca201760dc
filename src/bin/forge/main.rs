mod brain;
mod dom;
mod engine;
mod face;
mod hands;
mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use face::{AgentEvent, Command};
use scenario_forge::codegen::CodeProjector;
use scenario_forge::gherkin::author_feature;
use scenario_forge::llm::ChatClient;
use scenario_forge::pipeline::{execute_feature, generate_code};
use scenario_forge::{
    Config, Framework, HistoryAggregator, InteractionRecorder, MergePolicy, Platform, SessionStore,
    store,
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::engine::ChromeEngine;

/// User story → Gherkin → recorded browser run → test automation code.
#[derive(Parser)]
#[command(name = "scenario-forge", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Page every scenario starts from
    #[arg(long, global = true)]
    entry_url: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// How urls/action names/errors merge across scenarios
    #[arg(long, global = true, value_parser = parse_policy)]
    merge_policy: Option<MergePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported target frameworks
    Frameworks,
    /// Write a Gherkin feature for a user story
    Gherkin {
        /// File holding the user story or manual test cases
        story: PathBuf,
        /// Write the feature here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Author for a mobile app instead of a web application
        #[arg(long)]
        mobile: bool,
    },
    /// Execute a feature in the browser and save the normalized history
    Run {
        feature: PathBuf,
        #[arg(long, default_value = "history.json")]
        history_out: PathBuf,
    },
    /// Generate automation code from a feature and a saved history
    Codegen {
        feature: PathBuf,
        #[arg(long, default_value = "history.json")]
        history: PathBuf,
        #[arg(short, long, value_parser = Framework::lookup)]
        framework: Framework,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Execute a feature and generate code in one go
    Pipeline {
        feature: PathBuf,
        #[arg(short, long, value_parser = Framework::lookup)]
        framework: Framework,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value = "history.json")]
        history_out: PathBuf,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn parse_policy(s: &str) -> Result<MergePolicy, String> {
    s.parse().map_err(|e: scenario_forge::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.entry_url {
        config.entry_url = url;
    }
    if cli.headed {
        config.headless = false;
    }
    if let Some(policy) = cli.merge_policy {
        config.merge_policy = policy;
    }
    config.validate()?;

    match cli.command {
        Commands::Frameworks => {
            for framework in Framework::ALL {
                println!(
                    "{:<24} {:<32} .{}",
                    framework.id(),
                    framework.display_name(),
                    framework.file_extension()
                );
            }
        }
        Commands::Gherkin { story, out, mobile } => {
            let client = ChatClient::new(&config)?;
            let story = read(&story)?;
            let platform = if mobile { Platform::Mobile } else { Platform::Web };
            let feature = author_feature(&story, platform, &client).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &feature)?;
                    info!("wrote {}", path.display());
                }
                None => println!("{}", feature),
            }
        }
        Commands::Run {
            feature,
            history_out,
        } => {
            let gherkin = read(&feature)?;
            let client = ChatClient::new(&config)?;
            let engine = ChromeEngine::new(&config, client);
            let mut session = SessionStore::new();
            let history = execute_feature(&mut session, &recorder(&config), &engine, &gherkin).await?;
            store::save_json(&history_out, &*history)?;
            info!("saved history to {}", history_out.display());
        }
        Commands::Codegen {
            feature,
            history,
            framework,
            out_dir,
        } => {
            let gherkin = read(&feature)?;
            let history = store::load_history(&history)?
                .with_context(|| format!("no saved history at {}", history.display()))?;
            let client = ChatClient::new(&config)?;
            let mut session = SessionStore::new();
            session.commit_history(&gherkin, history);
            let artifact = generate_code(&mut session, &CodeProjector::new(&client), framework).await?;
            artifact.write_to(&out_dir)?;
        }
        Commands::Pipeline {
            feature,
            framework,
            out_dir,
            history_out,
        } => {
            let gherkin = read(&feature)?;
            let client = ChatClient::new(&config)?;
            let engine = ChromeEngine::new(&config, client.clone());
            let mut session = SessionStore::new();
            let history = execute_feature(&mut session, &recorder(&config), &engine, &gherkin).await?;
            store::save_json(&history_out, &*history)?;
            let artifact = generate_code(&mut session, &CodeProjector::new(&client), framework).await?;
            artifact.write_to(&out_dir)?;
        }
        Commands::Serve { port } => serve(&config, port).await?,
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn recorder(config: &Config) -> InteractionRecorder {
    InteractionRecorder::new(&config.entry_url, HistoryAggregator::new(config.merge_policy))
        .with_audit_trail(&config.history_path)
}

/// Owns the session store; the HTTP handlers only talk to it through commands.
async fn serve(config: &Config, port: u16) -> Result<()> {
    let (mut cmd_rx, event_tx) = face::start_server(port).await?;
    let client = ChatClient::new(config)?;
    let engine = ChromeEngine::new(config, client.clone()).with_events(event_tx.clone());
    let recorder = recorder(config);
    let projector = CodeProjector::new(&client);
    let mut session = SessionStore::new();

    info!("ready, waiting for commands (model {})", client.model());
    while let Some(command) = cmd_rx.recv().await {
        match command {
            Command::Author {
                story,
                platform,
                reply,
            } => {
                let result = author_feature(&story, platform, &client).await;
                if let Ok(feature) = &result {
                    session.set_gherkin(feature.clone());
                }
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            Command::Execute { gherkin, reply } => {
                let result = execute_feature(&mut session, &recorder, &engine, &gherkin).await;
                if let Err(e) = &result {
                    error!("execution failed: {}", e);
                    notify(&event_tx, AgentEvent::RunError { message: e.to_string() });
                }
                notify(&event_tx, AgentEvent::Ready);
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            Command::Generate { framework, reply } => {
                let result = generate_code(&mut session, &projector, framework).await;
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            Command::History { reply } => {
                let _ = reply.send(Ok(session.history()));
            }
        }
    }

    Ok(())
}

fn notify(events: &broadcast::Sender<AgentEvent>, event: AgentEvent) {
    let _ = events.send(event);
}
