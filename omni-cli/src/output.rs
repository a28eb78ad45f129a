use anyhow::{anyhow, bail, Context, Result};
use base64::Engine as _;
use omni_core::message::{MediaContent, MediaItem};
use std::fs;
use std::path::Path;

/// Writes the payload of a completed media item to `path`.
pub fn save_media(item: &MediaItem, path: &Path) -> Result<()> {
    match &item.content {
        MediaContent::Empty => bail!("the {:?} result carries no data", item.kind),
        MediaContent::DataUrl(url) => {
            let bytes = decode_data_url(url)?;
            fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
        }
        MediaContent::Blob(blob) => fs::copy(&blob.path, path)
            .map(|_| ())
            .with_context(|| format!("copying {} to {}", blob.path.display(), path.display())),
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| anyhow!("malformed data URL"))?;
    if !header.ends_with(";base64") {
        bail!("unsupported data URL encoding '{}'", header);
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decoding base64 payload")
}
