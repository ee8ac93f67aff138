//! Conversation/notification collaborator.
//!
//! Peer transfers post a system-authored message into the conversation
//! between sender and recipient. The monetary operation is authoritative;
//! anything failing here is logged and otherwise ignored.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::AccountId;

pub type ConversationId = Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("messaging service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Conversations: Send + Sync {
    /// Locate the conversation between two accounts, creating it if absent.
    async fn find_or_create(
        &self,
        a: &AccountId,
        b: &AccountId,
    ) -> Result<ConversationId, NotifyError>;

    async fn post(
        &self,
        conversation: ConversationId,
        sender: &AccountId,
        text: &str,
    ) -> Result<(), NotifyError>;
}

pub use memory::MemoryConversations;

mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::{AccountId, ConversationId, Conversations, NotifyError, Uuid, async_trait};

    #[derive(Debug, Clone)]
    pub struct Message {
        pub sender: AccountId,
        pub text: String,
    }

    #[derive(Debug, Default)]
    struct Inner {
        by_pair: HashMap<(AccountId, AccountId), ConversationId>,
        messages: HashMap<ConversationId, Vec<Message>>,
    }

    /// In-memory conversation service.
    #[derive(Debug, Default)]
    pub struct MemoryConversations {
        inner: RwLock<Inner>,
    }

    impl MemoryConversations {
        pub fn new() -> Self {
            Self::default()
        }

        /// Messages in the conversation between two accounts, if any.
        pub async fn messages_between(&self, a: &AccountId, b: &AccountId) -> Vec<Message> {
            let inner = self.inner.read().await;
            inner
                .by_pair
                .get(&pair_key(a, b))
                .and_then(|id| inner.messages.get(id))
                .cloned()
                .unwrap_or_default()
        }
    }

    // The pair key ignores direction: A-B and B-A are one conversation.
    fn pair_key(a: &AccountId, b: &AccountId) -> (AccountId, AccountId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    #[async_trait]
    impl Conversations for MemoryConversations {
        async fn find_or_create(
            &self,
            a: &AccountId,
            b: &AccountId,
        ) -> Result<ConversationId, NotifyError> {
            let mut inner = self.inner.write().await;
            let id = *inner
                .by_pair
                .entry(pair_key(a, b))
                .or_insert_with(Uuid::new_v4);
            inner.messages.entry(id).or_default();
            Ok(id)
        }

        async fn post(
            &self,
            conversation: ConversationId,
            sender: &AccountId,
            text: &str,
        ) -> Result<(), NotifyError> {
            let mut inner = self.inner.write().await;
            inner
                .messages
                .get_mut(&conversation)
                .ok_or_else(|| {
                    NotifyError::Unavailable(format!("unknown conversation {conversation}"))
                })?
                .push(Message {
                    sender: sender.clone(),
                    text: text.to_string(),
                });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AccountId {
        AccountId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn find_or_create_is_direction_agnostic() {
        let conversations = MemoryConversations::new();
        let ab = conversations.find_or_create(&id("a"), &id("b")).await.unwrap();
        let ba = conversations.find_or_create(&id("b"), &id("a")).await.unwrap();
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn posted_messages_are_readable_by_pair() {
        let conversations = MemoryConversations::new();
        let conv = conversations.find_or_create(&id("a"), &id("b")).await.unwrap();
        conversations.post(conv, &id("a"), "hello").await.unwrap();

        let messages = conversations.messages_between(&id("b"), &id("a")).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, id("a"));
        assert_eq!(messages[0].text, "hello");
    }

    #[tokio::test]
    async fn post_to_unknown_conversation_fails() {
        let conversations = MemoryConversations::new();
        let result = conversations.post(Uuid::new_v4(), &id("a"), "hi").await;
        assert!(result.is_err());
    }
}
