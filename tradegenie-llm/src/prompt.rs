use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::LlmConfig;

/// Read a prompt template from `prompt_dir`.
///
/// Only the file name of `file_path` is used, so configured paths may point
/// anywhere and still resolve inside the prompt directory. Missing or
/// unreadable files are logged and yield an empty prompt.
pub fn load_prompt_from_file(prompt_dir: &Path, file_path: &Path) -> String {
    let Some(full_path) = resolve_prompt_path(prompt_dir, file_path) else {
        error!(path = %file_path.display(), "prompt path has no file name");
        return String::new();
    };

    match fs::read_to_string(&full_path) {
        Ok(value) => value.trim().to_owned(),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            error!(path = %full_path.display(), "prompt file not found");
            String::new()
        }
        Err(err) => {
            error!(?err, path = %full_path.display(), "failed to load prompt file");
            String::new()
        }
    }
}

fn resolve_prompt_path(prompt_dir: &Path, file_path: &Path) -> Option<PathBuf> {
    file_path.file_name().map(|name| prompt_dir.join(name))
}

/// Load the base system prompt named by `config`, or an empty string.
pub fn load_system_prompt(config: &LlmConfig) -> String {
    let Some(path) = config.system_prompt_path.as_deref() else {
        return String::new();
    };

    let prompt = load_prompt_from_file(&config.prompt_dir, path);
    if prompt.is_empty() {
        warn!(path = %path.display(), "could not load base system prompt; continuing without one");
    } else {
        info!(chars = prompt.chars().count(), "base system prompt loaded");
    }

    prompt
}
