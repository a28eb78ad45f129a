use crate::settings::StudioSettings;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

pub const WORKSPACE_DIR: &str = ".omni";

pub fn workspace_dir(base_path: &Path) -> PathBuf {
    base_path.join(WORKSPACE_DIR)
}

/// Creates the `.omni` directory with empty secrets, default settings and a
/// log directory. Existing files are left untouched.
pub fn initialize_project(base_path: &Path) -> std::io::Result<()> {
    let omni_dir = workspace_dir(base_path);
    fs::create_dir_all(&omni_dir)?;

    let secrets_path = omni_dir.join("secrets.json");
    if !secrets_path.exists() {
        fs::write(secrets_path, "{}")?;
    }

    let settings_path = omni_dir.join("settings.json");
    if !settings_path.exists() {
        StudioSettings::default()
            .save(base_path)
            .map_err(|e| Error::new(ErrorKind::Other, e))?;
    }

    fs::create_dir_all(omni_dir.join("logs"))?;
    Ok(())
}

pub fn verify_project_initialized(base_path: &Path) -> std::io::Result<()> {
    let omni_dir = workspace_dir(base_path);
    if !omni_dir.is_dir() {
        return Err(Error::new(
            ErrorKind::NotFound,
            "Workspace not initialized. Please run `omni init` first.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn initialize_creates_layout_and_keeps_existing_files() {
        let dir = tempdir().unwrap();
        let base_path = dir.path();
        assert!(verify_project_initialized(base_path).is_err());

        initialize_project(base_path).unwrap();
        let omni_dir = base_path.join(".omni");
        assert!(omni_dir.join("logs").is_dir());
        assert_eq!(fs::read_to_string(omni_dir.join("secrets.json")).unwrap(), "{}");
        assert!(fs::read_to_string(omni_dir.join("settings.json"))
            .unwrap()
            .contains("pollIntervalSecs"));

        fs::write(omni_dir.join("secrets.json"), "{\"encrypted_data\":\"x\"}").unwrap();
        initialize_project(base_path).unwrap();
        assert_eq!(
            fs::read_to_string(omni_dir.join("secrets.json")).unwrap(),
            "{\"encrypted_data\":\"x\"}"
        );
        assert!(verify_project_initialized(base_path).is_ok());
    }
}
