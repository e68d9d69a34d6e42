pub mod chat_llm;
pub mod db;
pub mod file_store;
pub mod identity;
pub mod tts;

pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use file_store::LocalFileStore;
pub use identity::SocialIdentityVerifier;
pub use tts::OpenAiTtsAdapter;
