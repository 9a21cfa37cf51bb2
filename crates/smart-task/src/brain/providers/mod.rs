//! Language-model oracle providers

mod openai;
mod provider_trait;

pub use openai::OpenAIProvider;
pub use provider_trait::{
    ChatConfig, ChatMessage, ChatRequest, MessageRole, OracleClient, ProviderError, ProviderType,
};
