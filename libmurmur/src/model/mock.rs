//! Deterministic model for tests
//!
//! Answers with the first rule whose needles all occur in the prompt, or the
//! fallback. Prompts are recorded in call order.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{ModelError, Result};
use crate::model::LanguageModel;

#[derive(Debug, Clone)]
enum Answer {
    Text(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<(Vec<String>, Answer)>,
    fallback: Option<String>,
    prompts: Vec<String>,
}

#[derive(Clone, Default)]
pub struct ScriptedModel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer `response` to prompts containing every needle
    pub fn when(self, needles: &[&str], response: &str) -> Self {
        let needles = needles.iter().map(|n| n.to_string()).collect();
        self.script()
            .rules
            .push((needles, Answer::Text(response.to_string())));
        self
    }

    /// Fail prompts containing every needle
    pub fn fail_when(self, needles: &[&str], reason: &str) -> Self {
        let needles = needles.iter().map(|n| n.to_string()).collect();
        self.script()
            .rules
            .push((needles, Answer::Fail(reason.to_string())));
        self
    }

    pub fn otherwise(self, response: &str) -> Self {
        self.script().fallback = Some(response.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script().prompts.clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let mut script = self.script();
        script.prompts.push(prompt.to_string());

        let answer = script
            .rules
            .iter()
            .find(|(needles, _)| needles.iter().all(|n| prompt.contains(n.as_str())))
            .map(|(_, answer)| answer.clone());

        match answer {
            Some(Answer::Text(text)) => Ok(text),
            Some(Answer::Fail(reason)) => Err(ModelError::Request(reason).into()),
            None => script
                .fallback
                .clone()
                .ok_or_else(|| ModelError::EmptyResponse.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let model = ScriptedModel::new()
            .when(&["Should we reply", "crab"], "YES")
            .when(&["Should we reply"], "NO")
            .otherwise("fallback");

        assert_eq!(model.generate("Should we reply to crab?", 10).await.unwrap(), "YES");
        assert_eq!(model.generate("Should we reply to fish?", 10).await.unwrap(), "NO");
        assert_eq!(model.generate("anything", 10).await.unwrap(), "fallback");
        assert_eq!(model.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let model = ScriptedModel::new().fail_when(&["boom"], "server down");
        assert!(model.generate("boom", 10).await.is_err());
        assert!(model.generate("quiet", 10).await.is_err());
    }
}
