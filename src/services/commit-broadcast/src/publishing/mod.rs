//! Outbound collaborators: post generation and channel publishing

pub mod ai;
pub mod prompt;
pub mod telegram;

use async_trait::async_trait;

use crate::error::BroadcastResult;
use crate::mode::PublishProfile;

pub use ai::ChatCompletionGenerator;
pub use prompt::{render_prompt, PromptContext};
pub use telegram::TelegramPublisher;

/// Turns a commit summary into post text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate(
        &self,
        summary: &str,
        repository: &str,
        profile: &PublishProfile,
    ) -> BroadcastResult<String>;
}

/// Delivers post text to a channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, bot_token: &str, channel_id: &str, text: &str) -> BroadcastResult<()>;
}
