//! Terminal chat front end: one conversation at a time, replies streamed to stdout.

mod settings;

use std::{
    io::Write,
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use zhipu_ox::{
    ChatSession, ConfigOverrides, ConfigResolver, EnvSource, LayeredConfig, StoreSource, Zhipu,
    config::API_KEY_SETTING,
    session::{ERROR_MARKER, user_facing_message},
};

use crate::settings::{JsonFileStore, SettingField, mask_key};

#[derive(Debug, Parser)]
#[command(name = "zhipu-chat", version, about = "Chat with Zhipu AI models from the terminal")]
struct Cli {
    /// API key; overrides the environment and the settings file
    #[arg(long)]
    api_key: Option<String>,

    /// Chat-completions endpoint URL
    #[arg(long)]
    base_url: Option<String>,

    /// Model name, e.g. glm-4 or glm-4-flash
    #[arg(long)]
    model: Option<String>,

    /// System prompt for new sessions
    #[arg(long)]
    system: Option<String>,

    /// Settings file (defaults to <config dir>/zhipu-chat/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Persist a setting
    Set { field: SettingField, value: String },
    /// Remove a persisted setting
    Unset { field: SettingField },
    /// Print persisted settings and the configuration the next request would use
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .or_else(JsonFileStore::default_path)
        .context("no config directory on this system; pass --settings <FILE>")?;
    let store = Arc::new(JsonFileStore::open(settings_path)?);

    let resolver = LayeredConfig::new()
        .with_layer(ConfigOverrides {
            api_key: cli.api_key.clone(),
            base_url: cli.base_url.clone(),
            model: cli.model.clone(),
        })
        .with_layer(EnvSource::default())
        .with_layer(StoreSource::new(Arc::clone(&store)));

    match cli.command {
        Some(Command::Config { action }) => run_config(&store, &resolver, action),
        None => run_repl(Zhipu::with_resolver(resolver), cli.system).await,
    }
}

fn run_config(store: &JsonFileStore, resolver: &LayeredConfig, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Set { field, value } => {
            store.set(field, value);
            store.save()?;
            println!("saved {} to {}", field.key(), store.path().display());
        }
        ConfigAction::Unset { field } => {
            if store.unset(field) {
                store.save()?;
                println!("removed {}", field.key());
            } else {
                println!("{} was not set", field.key());
            }
        }
        ConfigAction::Show => {
            println!("settings file: {}", store.path().display());
            for (key, value) in store.entries() {
                let shown = if key == API_KEY_SETTING { mask_key(&value) } else { value };
                println!("  {key} = {shown}");
            }

            let resolved = resolver.resolve();
            println!("effective configuration:");
            println!(
                "  api key  = {}",
                resolved.valid_api_key().map_or_else(|| "<missing>".to_string(), mask_key)
            );
            println!("  base url = {}", resolved.base_url);
            println!("  model    = {}", resolved.model);
        }
    }
    Ok(())
}

async fn run_repl(client: Zhipu, system: Option<String>) -> anyhow::Result<()> {
    let new_session = || match &system {
        Some(prompt) => ChatSession::with_system_prompt(prompt.clone()),
        None => ChatSession::new(),
    };
    let mut session = new_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("model {}; /new starts over, /quit exits", client.config().model);

    loop {
        prompt("> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/new" => {
                session = new_session();
                eprintln!("started a new session");
                continue;
            }
            _ => {}
        }

        let mut stdout = std::io::stdout();
        let outcome = session
            .send(&client, &line, |delta| {
                // a closed stdout is not worth aborting the reply for
                let _ = write!(stdout, "{delta}").and_then(|()| stdout.flush());
            })
            .await;

        match outcome {
            None => continue,
            Some(Ok(_)) => println!(),
            Some(Err(e)) => println!("\n{ERROR_MARKER}: {}", user_facing_message(&e)),
        }
    }

    log::debug!("session {} ended with {} message(s)", session.id, session.messages.len());
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{text}")?;
    stdout.flush()
}
