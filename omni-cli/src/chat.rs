//! Interactive chat session.
//!
//! Plain lines are submitted as prompts in the current mode. Lines starting
//! with `/` are commands. Studio events are rendered as they arrive, so video
//! results show up while the prompt is idle.

use crate::output;
use anyhow::{bail, Result};
use colored::Colorize;
use omni_core::message::{MediaContent, MediaItem, MediaKind, MediaStatus, Message, Role};
use omni_core::models::{AspectRatio, ContentKind, Provider};
use omni_engine::{Studio, StudioEvent};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

const HELP: &str = "\
Commands:
  /text | /image | /video     switch what prompts generate
  /provider <local|cloud>     select the model provider
  /model <name>               select a model of the current provider
  /temperature <0.0-1.0>      set the sampling temperature
  /aspect <1:1|16:9|9:16>     set the aspect ratio for images and videos
  /config                     show the active configuration
  /history                    print the conversation
  /save <path>                write the most recent media result to a file
  /reset                      clear the conversation
  /quit                       leave the session";

#[derive(PartialEq)]
enum Flow {
    Continue,
    Quit,
}

pub async fn run(studio: Studio, mut events: UnboundedReceiver<StudioEvent>) -> Result<()> {
    let mut mode = ContentKind::Text;
    println!("{}", "OmniStudio chat. Type /help for commands.".bold());
    println!("{}", studio.config());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    show_prompt(mode);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if handle_line(&studio, &mut mode, &line).await? == Flow::Quit {
                    break;
                }
                while let Ok(event) = events.try_recv() {
                    render_event(&event);
                }
                show_prompt(mode);
            }
            Some(event) = events.recv() => {
                println!();
                render_event(&event);
                show_prompt(mode);
            }
        }
    }

    let pending = studio.pending_polls();
    if pending > 0 {
        println!("{} video(s) still rendering will be abandoned.", pending);
    }
    Ok(())
}

fn show_prompt(mode: ContentKind) {
    print!("{} ", format!("[{}]>", mode).cyan());
    let _ = std::io::stdout().flush();
}

async fn handle_line(studio: &Studio, mode: &mut ContentKind, line: &str) -> Result<Flow> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Flow::Continue);
    }
    if line.starts_with('/') {
        return match run_command(studio, mode, line) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                println!("{}", e.to_string().yellow());
                Ok(Flow::Continue)
            }
        };
    }

    if let Err(e) = studio.submit(line, *mode).await {
        println!("{}", e.to_string().yellow());
    }
    Ok(Flow::Continue)
}

fn run_command(studio: &Studio, mode: &mut ContentKind, line: &str) -> Result<Flow> {
    let words = shell_words::split(line)?;
    let (command, args) = match words.split_first() {
        Some((command, args)) => (command.as_str(), args),
        None => return Ok(Flow::Continue),
    };

    match (command, args) {
        ("/quit" | "/exit", _) => return Ok(Flow::Quit),
        ("/help", _) => println!("{}", HELP),
        ("/text", []) => *mode = ContentKind::Text,
        ("/image", []) => *mode = ContentKind::Image,
        ("/video", []) => *mode = ContentKind::Video,
        ("/provider", [provider]) => {
            studio.set_provider(provider.parse::<Provider>()?);
            println!("{}", studio.config());
        }
        ("/model", [model]) => {
            studio.set_model(model)?;
            println!("{}", studio.config());
        }
        ("/temperature", [value]) => {
            let temperature: f32 = value.parse()?;
            studio.set_temperature(temperature)?;
            println!("{}", studio.config());
        }
        ("/aspect", [value]) => {
            studio.set_aspect_ratio(value.parse::<AspectRatio>()?);
            println!("{}", studio.config());
        }
        ("/config", []) => {
            println!("{}", studio.config());
            println!("Mode: {}", mode);
        }
        ("/history", []) => {
            for message in studio.messages() {
                render_message(&message);
            }
        }
        ("/save", [path]) => {
            let item = latest_media(studio)
                .ok_or_else(|| anyhow::anyhow!("No media in this conversation yet."))?;
            let path = PathBuf::from(path);
            output::save_media(&item, &path)?;
            println!("Successfully saved {} to {}", kind_name(item.kind), path.display());
        }
        ("/reset", []) => {
            studio.reset();
            info!("conversation reset from chat");
        }
        _ => bail!("Unknown or malformed command '{}'. Type /help for commands.", line),
    }
    Ok(Flow::Continue)
}

fn latest_media(studio: &Studio) -> Option<MediaItem> {
    studio
        .messages()
        .into_iter()
        .rev()
        .flat_map(|message| message.media.into_iter().rev())
        .find(|item| item.status == MediaStatus::Completed && !item.content.is_empty())
}

fn render_event(event: &StudioEvent) {
    match event {
        StudioEvent::MessageAppended(message) if message.role == Role::Assistant => {
            render_message(message)
        }
        StudioEvent::MessageAppended(_) => {}
        StudioEvent::MediaUpdated { media, .. } if media.status == MediaStatus::Completed => {
            println!("{} {}", "[video ready]".green(), describe_media(media));
        }
        StudioEvent::MediaUpdated { .. } => {}
        StudioEvent::Reset => println!("{}", "Conversation cleared.".dimmed()),
    }
}

fn render_message(message: &Message) {
    let label = match message.role {
        Role::User => "you:".blue().bold(),
        Role::Assistant => "omni:".magenta().bold(),
    };
    println!("{} {}", label, message.content);
    for item in &message.media {
        println!("      {}", describe_media(item));
    }
}

fn kind_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    }
}

fn describe_media(item: &MediaItem) -> String {
    let mut tags = vec![kind_name(item.kind).to_string()];
    if let Some(aspect) = item.metadata.aspect_ratio {
        tags.push(aspect.to_string());
    }
    if let Some(resolution) = &item.metadata.resolution {
        tags.push(resolution.clone());
    }
    let detail = match (&item.status, &item.content) {
        (MediaStatus::Pending, _) => "rendering...".to_string(),
        (MediaStatus::Failed, _) => format!("failed: {}", item.failure.as_deref().unwrap_or("unknown")),
        (MediaStatus::Completed, MediaContent::Empty) => "no data returned".to_string(),
        (MediaStatus::Completed, MediaContent::DataUrl(url)) => {
            format!("inline data ({} bytes encoded), use /save to write it", url.len())
        }
        (MediaStatus::Completed, MediaContent::Blob(blob)) => {
            format!("{} ({})", blob.url(), blob.path.display())
        }
    };
    format!("[{}] {}", tags.join(" "), detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_description_hides_inline_payload() {
        let item = MediaItem::completed_image("cat", "data:image/png;base64,AAAA".into(), AspectRatio::Portrait);
        let text = describe_media(&item);
        assert!(text.starts_with("[image 9:16]"));
        assert!(!text.contains("AAAA"));
    }

    #[test]
    fn pending_video_is_described_as_rendering() {
        let item = MediaItem::pending_video("surf", "operations/1", AspectRatio::Landscape, "720p");
        assert_eq!(describe_media(&item), "[video 16:9 720p] rendering...");
    }
}
