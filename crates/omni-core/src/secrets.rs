//! Encrypted secrets stored in `.omni/secrets.json`.

use crate::project::workspace_dir;
use magic_crypt::{new_magic_crypt, MagicCryptTrait};
use rpassword::prompt_password;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name under which the cloud API key is stored and exported.
pub const API_KEY_SECRET: &str = "GEMINI_API_KEY";

// Hardcoded until secrets are bound to a user passphrase.
const ENCRYPTION_KEY: &str = "omni-studio-local-secrets-key";

#[derive(Serialize, Deserialize, Debug)]
struct SecretsContainer {
    encrypted_data: String,
}

fn secrets_path(base_path: &Path) -> PathBuf {
    workspace_dir(base_path).join("secrets.json")
}

/// Sets a secret. Without a value the user is prompted with hidden input.
pub fn set_secret(base_path: &Path, key: &str, value: Option<String>) -> io::Result<()> {
    let final_value = match value {
        Some(v) => v,
        None => prompt_password(format!("Enter value for '{}': ", key))?,
    };
    if final_value.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Secret '{}' cannot be empty.", key),
        ));
    }

    let mut secrets = read_all_secrets(base_path)?;
    secrets.insert(key.to_string(), final_value);
    write_all_secrets(base_path, &secrets)
}

pub fn remove_secret(base_path: &Path, key: &str) -> io::Result<()> {
    let mut secrets = read_all_secrets(base_path)?;
    if secrets.remove(key).is_none() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Secret '{}' not found.", key),
        ));
    }
    write_all_secrets(base_path, &secrets)
}

/// Lists the keys of all stored secrets, sorted.
pub fn list_secrets(base_path: &Path) -> io::Result<Vec<String>> {
    let secrets = read_all_secrets(base_path)?;
    let mut keys: Vec<String> = secrets.into_keys().collect();
    keys.sort();
    Ok(keys)
}

pub fn read_secret(base_path: &Path, key: &str) -> io::Result<String> {
    read_all_secrets(base_path)?
        .remove(key)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("Secret '{}' not found.", key)))
}

/// The cloud API key: the environment wins over the stored secret.
pub fn resolve_api_key(base_path: &Path) -> Option<String> {
    if let Ok(key) = env::var(API_KEY_SECRET) {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    read_secret(base_path, API_KEY_SECRET).ok()
}

fn read_all_secrets(base_path: &Path) -> io::Result<HashMap<String, String>> {
    let crypt = new_magic_crypt!(ENCRYPTION_KEY, 256);
    let file_content = match fs::read_to_string(secrets_path(base_path)) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e),
    };

    if file_content.trim().is_empty() || file_content.trim() == "{}" {
        return Ok(HashMap::new());
    }

    let container: SecretsContainer = serde_json::from_str(&file_content)?;
    let decrypted = crypt
        .decrypt_base64_to_string(&container.encrypted_data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    serde_json::from_str(&decrypted).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_all_secrets(base_path: &Path, secrets: &HashMap<String, String>) -> io::Result<()> {
    let crypt = new_magic_crypt!(ENCRYPTION_KEY, 256);
    let plain = serde_json::to_string(secrets)?;
    let container = SecretsContainer {
        encrypted_data: crypt.encrypt_str_to_base64(&plain),
    };
    fs::write(secrets_path(base_path), serde_json::to_string_pretty(&container)?)
}
