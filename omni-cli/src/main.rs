use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use omni_core::message::{MediaKind, MediaStatus};
use omni_core::models::{AspectRatio, ContentKind, Provider};
use omni_core::secrets;
use omni_core::settings::StudioSettings;
use omni_engine::providers::OllamaClient;
use omni_engine::{ApiCredential, Studio, StudioEvent};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

mod chat;
mod host;
mod logging;
mod output;

#[derive(Parser)]
#[command(author, version, about = "Chat with local and cloud models and generate images and videos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// The provider to use: 'local' (Ollama) or 'cloud' (Gemini)
    #[arg(long)]
    provider: Option<Provider>,
    /// The model to use; must belong to the selected provider
    #[arg(long)]
    model: Option<String>,
    /// Sampling temperature between 0.0 and 1.0
    #[arg(long)]
    temperature: Option<f32>,
    /// Aspect ratio for images and videos: 1:1, 16:9 or 9:16
    #[arg(long)]
    aspect_ratio: Option<AspectRatio>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// What to generate: text, image or video
    #[arg(long, default_value = "text")]
    kind: ContentKind,
    #[command(flatten)]
    config: ConfigArgs,
    /// The file path to save the result to
    #[arg(long)]
    output: Option<PathBuf>,
    /// The prompt
    #[arg(required = true, trailing_var_arg = true)]
    prompt: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new OmniStudio workspace
    Init,
    /// Manage encrypted secrets
    Secrets {
        #[command(subcommand)]
        action: SecretsCommand,
    },
    /// Inspect the available models
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },
    /// Run a single generation and print the result
    Generate {
        #[command(flatten)]
        args: GenerateArgs,
    },
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Subcommand)]
enum SecretsCommand {
    /// Set a secret; prompts for the value when it is omitted
    Set {
        /// The name of the secret
        key: String,
        /// The value of the secret
        value: Option<String>,
    },
    /// Remove a secret
    Rm {
        /// The name of the secret to remove
        key: String,
    },
    /// List all secret keys
    #[clap(alias = "list")]
    Ls,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List the model catalog and any models found on the local server
    #[clap(alias = "list")]
    Ls {
        /// Only show models of this provider
        #[arg(long)]
        provider: Option<Provider>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let current_path = match env::current_dir() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: Failed to get current directory - {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Init = &cli.command {
        match omni_core::initialize_project(&current_path) {
            Ok(_) => println!("Successfully initialized OmniStudio workspace in ./.omni"),
            Err(e) => {
                eprintln!("Error: Failed to initialize workspace - {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = omni_core::verify_project_initialized(&current_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let log_guard = logging::init(&current_path);
    let result = run(cli.command, &current_path).await;
    drop(log_guard);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, current_path: &Path) -> Result<()> {
    match command {
        Commands::Init => Ok(()),
        Commands::Secrets { action } => run_secrets(action, current_path),
        Commands::Models { action } => match action {
            ModelsCommand::Ls { provider } => list_models(current_path, provider).await,
        },
        Commands::Generate { args } => generate(current_path, args).await,
        Commands::Chat { config } => {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let studio = build_studio(current_path, Some(tx))?;
            apply_config(&studio, &config)?;
            info!("chat session started");
            chat::run(studio, rx).await
        }
    }
}

fn run_secrets(action: SecretsCommand, current_path: &Path) -> Result<()> {
    match action {
        SecretsCommand::Set { key, value } => {
            secrets::set_secret(current_path, &key, value)
                .map_err(|e| anyhow!("Failed to set secret - {}", e))?;
            println!("Secret '{}' set successfully.", key);
        }
        SecretsCommand::Rm { key } => {
            secrets::remove_secret(current_path, &key)
                .map_err(|e| anyhow!("Failed to remove secret - {}", e))?;
            println!("Secret '{}' removed successfully.", key);
        }
        SecretsCommand::Ls => {
            let keys = secrets::list_secrets(current_path)
                .map_err(|e| anyhow!("Failed to list secrets - {}", e))?;
            if keys.is_empty() {
                println!("No secrets found.");
            } else {
                println!("Available secrets:");
                for key in keys {
                    println!("- {}", key);
                }
            }
        }
    }
    Ok(())
}

async fn list_models(current_path: &Path, provider: Option<Provider>) -> Result<()> {
    let settings = StudioSettings::load(current_path)?;
    let providers = match provider {
        Some(provider) => vec![provider],
        None => Provider::ALL.to_vec(),
    };

    println!("{:<10} {:<30} {}", "PROVIDER", "MODEL", "NOTE");
    for provider in providers {
        for model in provider.models() {
            let note = if *model == provider.default_model() { "default" } else { "" };
            println!("{:<10} {:<30} {}", provider.short_name(), model, note);
        }
        if provider == Provider::Local {
            let installed = OllamaClient::new(&settings.local_endpoint)
                .list_local_models()
                .await;
            for name in installed {
                let base = name.split(':').next().unwrap_or(&name);
                if !provider.models().contains(&base) {
                    println!("{:<10} {:<30} {}", provider.short_name(), name, "(discovered)");
                }
            }
        }
    }
    Ok(())
}

fn build_studio(current_path: &Path, events: Option<UnboundedSender<StudioEvent>>) -> Result<Studio> {
    let settings = StudioSettings::load(current_path)?;
    let credential = Arc::new(ApiCredential::new(secrets::resolve_api_key(current_path)));
    let selector = Arc::new(host::TerminalKeySelector::new(current_path.to_path_buf()));
    Ok(omni_engine::studio_from_settings(&settings, credential, selector, events)?)
}

fn apply_config(studio: &Studio, config: &ConfigArgs) -> Result<()> {
    if let Some(provider) = config.provider {
        studio.set_provider(provider);
    }
    if let Some(model) = &config.model {
        studio.set_model(model)?;
    }
    if let Some(temperature) = config.temperature {
        studio.set_temperature(temperature)?;
    }
    if let Some(aspect_ratio) = config.aspect_ratio {
        studio.set_aspect_ratio(aspect_ratio);
    }
    Ok(())
}

async fn generate(current_path: &Path, args: GenerateArgs) -> Result<()> {
    let studio = build_studio(current_path, None)?;
    apply_config(&studio, &args.config)?;

    let prompt = args.prompt.join(" ");
    let turn = studio.submit(&prompt, args.kind).await?;
    if let Some(failure) = turn.failure {
        return Err(failure.into());
    }
    let reply = turn.reply;
    println!("{}", reply.content);

    let Some(item) = reply.media.first() else {
        if let Some(path) = &args.output {
            fs::write(path, &reply.content)?;
            println!("Successfully saved text to {}", path.display());
        }
        return Ok(());
    };

    let item = if item.status == MediaStatus::Pending {
        eprintln!("Waiting for the video to finish rendering...");
        studio.settle().await;
        studio
            .media_item(&reply.id, &item.id)
            .ok_or_else(|| anyhow!("the pending video is no longer part of the conversation"))?
    } else {
        item.clone()
    };

    if item.status == MediaStatus::Failed {
        bail!(
            "Video generation failed: {}",
            item.failure.as_deref().unwrap_or("unknown error")
        );
    }

    let kind = match item.kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    };
    match &args.output {
        Some(path) => {
            output::save_media(&item, path)?;
            println!("Successfully saved {} to {}", kind, path.display());
        }
        None if item.content.is_empty() => println!("No {} data was returned.", kind),
        None => println!("The {} is ready. Use --output to save it.", kind),
    }
    Ok(())
}
