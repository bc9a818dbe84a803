//! Scripted chat model for stage tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use pagewright::{AutomationError, ChatMessage, ChatModel, ChatReply, Result, TokenUsage};

/// Replays canned completions in order and records every prompt it saw.
pub struct MockModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.replies.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AutomationError::Llm("mock model ran out of replies".to_string()))?;
        Ok(ChatReply {
            text,
            usage: TokenUsage::default(),
        })
    }
}
