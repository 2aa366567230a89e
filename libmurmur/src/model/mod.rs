//! Language model seam used for the reply gate and reply generation

use async_trait::async_trait;

use crate::error::Result;

pub mod chat;
pub mod mock;

pub use chat::ChatCompletionModel;
pub use mock::ScriptedModel;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `prompt`, returning at most `max_tokens` tokens of text
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
