//! Timeline decision pipeline
//!
//! For each post, in order: skip our own posts, ask the model whether to
//! reply, generate and truncate the reply, then post it (or only simulate).
//! A pass never runs two model calls or two platform calls at once.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Persona, PipelineConfig};
use crate::error::Result;
use crate::model::LanguageModel;
use crate::platforms::Platform;
use crate::store::PostStore;
use crate::types::{now_timestamp, Decision, Post, PostRecord, Reply, Verdict};

pub mod prompts;

/// Token budget for the YES/NO gate answer
pub const GATE_MAX_TOKENS: u32 = 200;
/// Token budget for reply generation
pub const REPLY_MAX_TOKENS: u32 = 300;

const ELLIPSIS: &str = "...";

/// Result of one pass over a batch of posts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Posted (or, in simulation, would-be) replies, in input order
    pub replied: Vec<Reply>,
    /// Posts the gate rejected, in input order
    pub ignored: Vec<Post>,
    /// Posts approved for a reply that could not be generated or posted
    pub failed: Vec<Post>,
    /// True when the pass stopped early on cancellation
    pub cancelled: bool,
}

pub struct DecisionPipeline {
    platform: Arc<dyn Platform>,
    model: Arc<dyn LanguageModel>,
    posts: Arc<dyn PostStore>,
    persona: Persona,
    self_account_id: String,
    settings: PipelineConfig,
    gate_max_tokens: u32,
    reply_max_tokens: u32,
    cancel: Option<CancellationToken>,
}

impl DecisionPipeline {
    pub fn new(
        platform: Arc<dyn Platform>,
        model: Arc<dyn LanguageModel>,
        posts: Arc<dyn PostStore>,
        persona: Persona,
        self_account_id: impl Into<String>,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            platform,
            model,
            posts,
            persona,
            self_account_id: self_account_id.into(),
            settings,
            gate_max_tokens: GATE_MAX_TOKENS,
            reply_max_tokens: REPLY_MAX_TOKENS,
            cancel: None,
        }
    }

    pub fn with_token_budgets(mut self, gate: u32, reply: u32) -> Self {
        self.gate_max_tokens = gate;
        self.reply_max_tokens = reply;
        self
    }

    /// Checked between posts; a post already being processed finishes
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Gate one post and, if approved, generate its reply text
    ///
    /// Never touches the platform. A failing gate call counts as IGNORE.
    pub async fn decide(&self, post: &Post) -> Result<Decision> {
        if post.author_id == self.self_account_id {
            tracing::debug!(post_id = %post.id, "Skipping own post");
            return Ok(Decision::ignore(post.clone()));
        }

        let gate = prompts::gate_prompt(&self.persona, post);
        let answer = match self.model.generate(&gate, self.gate_max_tokens).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(post_id = %post.id, error = %e, "Gate call failed; ignoring post");
                return Ok(Decision::ignore(post.clone()));
            }
        };
        if !answer.trim().to_uppercase().starts_with("YES") {
            return Ok(Decision::ignore(post.clone()));
        }

        let prompt = prompts::reply_prompt(&self.persona, post, self.settings.max_reply_chars);
        let text = self.model.generate(&prompt, self.reply_max_tokens).await?;
        Ok(Decision::reply(
            post.clone(),
            truncate_reply(text.trim(), self.settings.max_reply_chars),
        ))
    }

    /// Decide on every post in order, posting replies when `commit` is set
    pub async fn process_batch(&self, posts: &[Post], commit: bool) -> PassOutcome {
        let mut outcome = PassOutcome::default();

        for post in posts {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::info!("Pass cancelled before post {}", post.id);
                outcome.cancelled = true;
                break;
            }

            let decision = match self.decide(post).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!(post_id = %post.id, error = %e, "Reply generation failed");
                    outcome.failed.push(post.clone());
                    continue;
                }
            };

            let text = match (decision.verdict, decision.reply_text) {
                (Verdict::Reply, Some(text)) => text,
                _ => {
                    outcome.ignored.push(decision.post);
                    continue;
                }
            };

            if !commit {
                tracing::info!(post_id = %post.id, reply = %text, "Would reply");
                outcome.replied.push(Reply {
                    original: decision.post,
                    text,
                    reply_id: None,
                });
                continue;
            }

            match self.platform.reply_to(&post.id, &text).await {
                Ok(reply_id) => {
                    tracing::info!(post_id = %post.id, reply_id = %reply_id, "Posted reply");
                    let record = PostRecord {
                        post_id: reply_id.clone(),
                        prompt: prompts::reply_prompt(
                            &self.persona,
                            post,
                            self.settings.max_reply_chars,
                        ),
                        content: text.clone(),
                        is_reply: true,
                        posted_at: now_timestamp(),
                    };
                    if let Err(e) = self.posts.add(&record).await {
                        tracing::error!(reply_id = %reply_id, error = %e, "Failed to record reply");
                    }
                    outcome.replied.push(Reply {
                        original: decision.post,
                        text,
                        reply_id: Some(reply_id),
                    });
                }
                Err(e) => {
                    tracing::error!(post_id = %post.id, error = %e, "Failed to post reply");
                    outcome.failed.push(decision.post);
                }
            }
        }

        tracing::info!(
            replied = outcome.replied.len(),
            ignored = outcome.ignored.len(),
            failed = outcome.failed.len(),
            "Processed {} posts",
            posts.len()
        );
        outcome
    }

    /// Fetch our timeline and process it
    ///
    /// A timeline fetch failure aborts the pass; per-post failures do not.
    pub async fn run_pass(&self, commit: bool) -> Result<PassOutcome> {
        let timeline = self
            .platform
            .get_timeline(&self.self_account_id, self.settings.timeline_length)
            .await?;
        tracing::info!(count = timeline.len(), "Retrieved timeline");
        Ok(self.process_batch(&timeline, commit).await)
    }
}

/// Cap `text` at `max_chars` characters, marking a cut with `...`
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reply_unchanged() {
        let text = "a".repeat(280);
        assert_eq!(truncate_reply(&text, 280), text);
    }

    #[test]
    fn test_long_reply_truncated_to_limit() {
        let truncated = truncate_reply(&"a".repeat(281), 280);
        assert_eq!(truncated.chars().count(), 280);
        assert!(truncated.ends_with("..."));
        assert_eq!(&truncated[..277], "a".repeat(277));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "🦀".repeat(300);
        let truncated = truncate_reply(&text, 280);
        assert_eq!(truncated.chars().count(), 280);
        assert!(truncated.starts_with("🦀"));
    }
}
