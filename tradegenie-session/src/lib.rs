pub mod impls;
pub mod model;
pub mod store;

pub use impls::cleanup::{cleanup_old_user_data, spawn_cleanup_task};
pub use model::conversation::ConversationRecord;
pub use store::{ConversationStore, SessionConfig, SharedConversationStore};
