pub mod config;

use tradegenie_llm::LlmService;
use tradegenie_session::SharedConversationStore;
use tradegenie_utils::risk::PositionSizer;

pub use config::AppConfig;

pub type Error = anyhow::Error;

/// Everything a message handler needs, cheap to clone.
#[derive(Clone, Debug)]
pub struct Data {
    pub config: AppConfig,
    pub llm: Option<LlmService>,
    pub sizer: PositionSizer,
    pub sessions: SharedConversationStore,
}

impl Data {
    /// Wire components from `config`. The LLM client is skipped when disabled.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let llm = if config.llm_enabled {
            Some(LlmService::new(config.llm.clone())?)
        } else {
            None
        };

        Ok(Self {
            sizer: PositionSizer::new(config.risk.clone()),
            sessions: tradegenie_session::store::shared_store(),
            llm,
            config,
        })
    }
}
