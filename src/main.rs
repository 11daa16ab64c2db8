//! Command-line front end for chorus.

use anyhow::{bail, Context, Result};
use chorus::config::{self, ChorusConfig};
use chorus::credentials::{CredentialStore, StorageTier};
use chorus::facade::{Chorus, Participant, StreamCallbacks};
use chorus::llm::{capabilities, provider_ids, ClientFactory};
use chorus::logging::{init_logging, LogLevel};
use chorus::messages::{ConversationMessage, GenerationSettings};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Chat with OpenAI, Anthropic, Grok and Gemini through one interface.
#[derive(Parser, Debug)]
#[command(name = "chorus", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,

    /// Configuration file; defaults to ./chorus.toml, then the user config directory.
    #[arg(long, global = true, env = "CHORUS_CONFIG")]
    config: Option<PathBuf>,

    /// Credential storage tier override (persistent, session or none).
    #[arg(long, global = true)]
    tier: Option<StorageTier>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the reply.
    Send {
        /// Message text.
        text: String,
        /// Provider id; defaults to the configured default provider.
        #[arg(long, short)]
        provider: Option<String>,
        /// Model id; defaults to the provider's default model.
        #[arg(long, short)]
        model: Option<String>,
        /// Print tokens as they arrive.
        #[arg(long, short)]
        stream: bool,
        /// System instructions sent before the message.
        #[arg(long)]
        system: Option<String>,
        /// Sampling temperature.
        #[arg(long)]
        temperature: Option<f32>,
        /// Maximum tokens to generate.
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// List models and capabilities.
    Models {
        /// Only show this provider.
        #[arg(long, short)]
        provider: Option<String>,
    },
    /// Manage stored API keys.
    Key {
        /// Key subcommand.
        #[command(subcommand)]
        action: KeyCommand,
    },
    /// Check an API key against its provider.
    Validate {
        /// Provider id.
        provider: String,
        /// Key to check; defaults to the available one.
        #[arg(long)]
        key: Option<String>,
    },
}

/// Key management subcommands.
#[derive(Subcommand, Debug)]
enum KeyCommand {
    /// Store a key; reads it from stdin when omitted.
    Set {
        /// Provider id.
        provider: String,
        /// API key.
        key: Option<String>,
    },
    /// Remove a stored key.
    Remove {
        /// Provider id.
        provider: String,
    },
    /// List providers with a stored key.
    List,
    /// Move every stored key to another tier.
    Move {
        /// Destination tier.
        to: StorageTier,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => config::from_path(path)?,
        None => config::load()?,
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    init_logging(&logging)?;

    let tier = cli.tier.unwrap_or(config.credential_storage);
    let chorus = build(&config, tier)?;

    match cli.command {
        Command::Send {
            text,
            provider,
            model,
            stream,
            system,
            temperature,
            max_tokens,
        } => {
            let provider = provider
                .or_else(|| config.effective_default().map(str::to_string))
                .unwrap_or_else(|| provider_ids::OPENAI.to_string());

            let mut settings = GenerationSettings::new();
            settings.temperature = temperature;
            settings.max_tokens = max_tokens;

            let mut participant = Participant::new(provider, model.unwrap_or_default());
            if settings != GenerationSettings::default() {
                participant = participant.with_settings(settings);
            }

            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(ConversationMessage::system(system));
            }
            messages.push(ConversationMessage::user(text));

            send(&chorus, &messages, &participant, stream).await
        }
        Command::Models { provider } => {
            list_models(&chorus, provider.as_deref());
            Ok(())
        }
        Command::Key { action } => manage_keys(&chorus, action),
        Command::Validate { provider, key } => {
            if chorus.validate_credential(&provider, key.as_deref()).await {
                println!("{provider}: valid");
                Ok(())
            } else {
                bail!("{provider}: the key is missing, invalid, or could not be checked");
            }
        }
    }
}

fn build(config: &ChorusConfig, tier: StorageTier) -> Result<Chorus> {
    let factory = ClientFactory::with_builtin_providers(&config.providers)?;
    let store = CredentialStore::open(tier)
        .with_context(|| format!("failed to open {tier} credential storage"))?;
    Ok(Chorus::new(Arc::new(factory), Arc::new(store))
        .with_environment_credentials(&config.providers))
}

async fn send(
    chorus: &Chorus,
    messages: &[ConversationMessage],
    participant: &Participant,
    stream: bool,
) -> Result<()> {
    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut callbacks = StreamCallbacks::new(|token| {
        print!("{token}");
        let _ = std::io::stdout().flush();
    });
    let callbacks = stream.then_some(&mut callbacks);

    match chorus
        .send_message(messages, participant, None, callbacks, cancellation)
        .await
    {
        Ok(reply) => {
            if !stream {
                print!("{}", reply.text);
            }
            println!();
            Ok(())
        }
        Err(error) => {
            if stream {
                println!();
            }
            bail!("{} ({})", error.explanation(), error.message);
        }
    }
}

fn list_models(chorus: &Chorus, only: Option<&str>) {
    for id in chorus.provider_ids() {
        if only.is_some_and(|only| only != id) {
            continue;
        }
        let Ok(client) = chorus.factory().get_client(&id) else {
            continue;
        };

        let key = if chorus.has_credential(&id) { "key set" } else { "no key" };
        println!("{} ({id}, {key})", client.provider_name());
        if let Some(caps) = capabilities(&id) {
            println!(
                "  streaming: {}  system messages: {}  context: {} tokens",
                caps.supports_streaming, caps.supports_system_messages, caps.max_context_length
            );
        }

        let default = client.default_model();
        for model in client.available_models() {
            let marker = if model == default { "*" } else { " " };
            println!("  {marker} {model}");
        }
    }
}

fn manage_keys(chorus: &Chorus, action: KeyCommand) -> Result<()> {
    let store = chorus.credentials();
    match action {
        KeyCommand::Set { provider, key } => {
            if !chorus.factory().is_registered(&provider) {
                bail!("unknown provider '{provider}'");
            }
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin()
                        .lock()
                        .read_line(&mut line)
                        .context("failed to read key from stdin")?;
                    line
                }
            };
            if key.trim().is_empty() {
                bail!("no key given");
            }
            chorus.set_credential(&provider, &key)?;
            println!("{provider}: key stored ({})", store.tier());
        }
        KeyCommand::Remove { provider } => {
            if chorus.remove_credential(&provider)? {
                println!("{provider}: key removed");
            } else {
                println!("{provider}: no key stored");
            }
        }
        KeyCommand::List => {
            for provider in store.providers() {
                let key = store.get(&provider).unwrap_or_default();
                println!("{provider}: {}", mask(&key));
            }
        }
        KeyCommand::Move { to } => {
            let from = store.tier();
            store.set_tier(to)?;
            println!("moved {} key(s) from {from} to {to}", store.providers().len());
        }
    }
    Ok(())
}

/// Shows the last four characters of a key.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
