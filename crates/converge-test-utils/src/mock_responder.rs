// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI responder for deterministic testing.
//!
//! `MockResponder` implements `Responder` with a scripted outcome queue,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use converge_core::{ConvergeError, Responder, Turn, UserId};

/// One scripted outcome for a `generate` call.
enum ScriptedOutcome {
    Reply(String),
    Failure(String),
}

/// A `generate` call exactly as the responder saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub user_id: UserId,
    pub text: String,
    pub history: Vec<Turn>,
}

/// A mock AI responder that returns pre-scripted outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty, a
/// default "mock reply" text is returned. Every call is recorded and
/// retrievable via [`MockResponder::requests`].
pub struct MockResponder {
    script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockResponder {
    /// Create a new mock responder with an empty script.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock responder pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        let script = replies.into_iter().map(ScriptedOutcome::Reply).collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a successful reply to the end of the script.
    pub async fn push_reply(&self, text: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(ScriptedOutcome::Reply(text.into()));
    }

    /// Add a provider failure to the end of the script.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(ScriptedOutcome::Failure(message.into()));
    }

    /// How many `generate` calls have been made.
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every recorded `generate` call, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn generate(
        &self,
        user_id: &UserId,
        history: &[Turn],
        text: &str,
    ) -> Result<String, ConvergeError> {
        self.requests.lock().await.push(RecordedRequest {
            user_id: user_id.clone(),
            text: text.to_string(),
            history: history.to_vec(),
        });

        match self.script.lock().await.pop_front() {
            Some(ScriptedOutcome::Reply(reply)) => Ok(reply),
            Some(ScriptedOutcome::Failure(message)) => {
                Err(ConvergeError::Provider { message, source: None })
            }
            None => Ok("mock reply".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use converge_core::TurnRole;

    #[tokio::test]
    async fn default_reply_when_script_empty() {
        let responder = MockResponder::new();
        let reply = responder
            .generate(&UserId::from("U1"), &[], "hello")
            .await
            .unwrap();
        assert_eq!(reply, "mock reply");
    }

    #[tokio::test]
    async fn scripted_outcomes_pop_in_order() {
        let responder = MockResponder::with_replies(vec!["first".to_string()]);
        responder.push_failure("upstream 503").await;
        responder.push_reply("third").await;

        let user = UserId::from("U1");
        assert_eq!(responder.generate(&user, &[], "a").await.unwrap(), "first");
        let err = responder.generate(&user, &[], "b").await.unwrap_err();
        assert!(matches!(err, ConvergeError::Provider { .. }));
        assert!(err.is_retryable());
        assert_eq!(responder.generate(&user, &[], "c").await.unwrap(), "third");
        // Script exhausted, falls back to the default.
        assert_eq!(
            responder.generate(&user, &[], "d").await.unwrap(),
            "mock reply"
        );
    }

    #[tokio::test]
    async fn every_call_is_recorded_with_history() {
        let responder = MockResponder::new();
        let history = vec![
            Turn::new(TurnRole::User, "What is Rust?"),
            Turn::new(TurnRole::Assistant, "A systems language."),
        ];
        responder
            .generate(&UserId::from("U1"), &history, "Tell me more")
            .await
            .unwrap();

        assert_eq!(responder.request_count().await, 1);
        let recorded = responder.requests().await;
        assert_eq!(recorded[0].user_id, UserId::from("U1"));
        assert_eq!(recorded[0].text, "Tell me more");
        assert_eq!(recorded[0].history, history);
    }
}
