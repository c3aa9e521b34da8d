use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tradegenie_utils::env::{env_opt, env_str, env_u64};

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_PROMPT_DIR: &str = "prompts/";
pub const DEFAULT_SYSTEM_PROMPT_FILE: &str = "deepseek_base_system.txt";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_IMAGE_SIZE_MB: u64 = 2;

/// Connection and prompt settings for one OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// Bearer token. `None` makes every completion fail fast.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    /// Per-request timeout unless the request sets its own.
    pub timeout: Duration,
    pub prompt_dir: PathBuf,
    /// Base system prompt, resolved inside `prompt_dir` by file name.
    pub system_prompt_path: Option<PathBuf>,
    /// Images above this size are left out of vision requests.
    pub max_image_bytes: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            prompt_dir: PathBuf::from(DEFAULT_PROMPT_DIR),
            system_prompt_path: Some(PathBuf::from(DEFAULT_SYSTEM_PROMPT_FILE)),
            max_image_bytes: mb_to_bytes(DEFAULT_MAX_IMAGE_SIZE_MB),
        }
    }
}

impl LlmConfig {
    /// Read `LLM_*` variables, falling back to the DeepSeek defaults.
    ///
    /// `DEEPSEEK_API_KEY` is still honoured when `LLM_API_KEY` is unset.
    pub fn from_env() -> Self {
        let api_key = env_opt("LLM_API_KEY").or_else(|| env_opt("DEEPSEEK_API_KEY"));
        let timeout_secs = env_u64("LLM_TIMEOUT_SECONDS", DEFAULT_TIMEOUT.as_secs()).max(1);
        let system_prompt_path = match env_opt("SYSTEM_PROMPT_PATH") {
            Some(path) if path.eq_ignore_ascii_case("none") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_SYSTEM_PROMPT_FILE)),
        };

        Self {
            api_key,
            api_url: env_str("LLM_API_URL", DEFAULT_API_URL),
            model: env_str("LLM_MODEL", DEFAULT_MODEL),
            timeout: Duration::from_secs(timeout_secs),
            prompt_dir: PathBuf::from(env_str("PROMPT_DIR", DEFAULT_PROMPT_DIR)),
            system_prompt_path,
            max_image_bytes: mb_to_bytes(env_u64("MAX_IMAGE_SIZE_MB", DEFAULT_MAX_IMAGE_SIZE_MB)),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

// Keep the key out of logs.
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("prompt_dir", &self.prompt_dir)
            .field("system_prompt_path", &self.system_prompt_path)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}

fn mb_to_bytes(megabytes: u64) -> usize {
    usize::try_from(megabytes.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
}
