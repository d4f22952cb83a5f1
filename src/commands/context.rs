//! Invocation context and message model for prefix commands
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Edited messages convert from gateway update events
//! - 1.0.0: Platform-neutral message, responder and invocation context

use anyhow::Result;
use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::event::MessageUpdateEvent;
use serenity::model::id::ChannelId;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::chunk_for_message;

/// The account a message is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: u64,
    pub name: String,
    /// Automated accounts, including this bot
    pub bot: bool,
}

/// Platform-neutral view of a created or edited chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: u64,
    pub channel_id: u64,
    /// Absent for direct messages
    pub guild_id: Option<u64>,
    pub author: Principal,
    pub content: String,
    pub edited: bool,
}

impl IncomingMessage {
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Build from a gateway edit event
    ///
    /// Edits that only touch embeds or pins arrive without content or
    /// author and yield `None`.
    pub fn from_update(event: &MessageUpdateEvent) -> Option<Self> {
        let author = event.author.as_ref()?;
        let content = event.content.clone()?;

        Some(Self {
            id: event.id.0,
            channel_id: event.channel_id.0,
            guild_id: event.guild_id.map(|g| g.0),
            author: Principal {
                id: author.id.0,
                name: author.name.clone(),
                bot: author.bot,
            },
            content,
            edited: true,
        })
    }
}

impl From<&Message> for IncomingMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.0,
            channel_id: msg.channel_id.0,
            guild_id: msg.guild_id.map(|g| g.0),
            author: Principal {
                id: msg.author.id.0,
                name: msg.author.name.clone(),
                bot: msg.author.bot,
            },
            content: msg.content.clone(),
            edited: msg.edited_timestamp.is_some(),
        }
    }
}

/// Outbound channel for command bodies
///
/// The dispatcher never replies on its own; only commands and their
/// failure handlers talk back to the chat surface.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn say(&self, channel_id: u64, content: &str) -> Result<()>;
}

/// Responder backed by serenity's REST client
pub struct HttpResponder {
    http: Arc<Http>,
}

impl HttpResponder {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn say(&self, channel_id: u64, content: &str) -> Result<()> {
        ChannelId(channel_id).say(&self.http, content).await?;
        Ok(())
    }
}

/// One attempt to run a command, created per matching message
#[derive(Clone)]
pub struct InvocationContext {
    /// Correlates every log line of this invocation
    pub request_id: Uuid,
    pub principal: Principal,
    /// Guild the message came from, `None` in DMs
    pub container: Option<u64>,
    pub message: IncomingMessage,
    /// The prefix that matched
    pub prefix: String,
    /// Lookup key after prefix stripping and optional case folding
    pub invoke_name: String,
    pub arguments: Vec<String>,
    responder: Arc<dyn Responder>,
}

impl InvocationContext {
    pub fn new(
        message: IncomingMessage,
        prefix: String,
        invoke_name: String,
        arguments: Vec<String>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            principal: message.author.clone(),
            container: message.guild_id,
            message,
            prefix,
            invoke_name,
            arguments,
            responder,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Guild id as text, or `DM`
    pub fn container_label(&self) -> String {
        self.container
            .map(|id| id.to_string())
            .unwrap_or_else(|| "DM".to_string())
    }

    /// Send text to the originating channel, split to fit message limits
    pub async fn reply(&self, content: &str) -> Result<()> {
        for chunk in chunk_for_message(content) {
            self.responder.say(self.message.channel_id, &chunk).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("principal", &self.principal)
            .field("container", &self.container)
            .field("invoke_name", &self.invoke_name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_takes_principal_and_container_from_message() {
        let responder = Arc::new(RecordingResponder::default());
        let ctx = context(guild_message(42, 7, "!ping"), "ping", &[], responder);

        assert_eq!(ctx.principal.id, 7);
        assert_eq!(ctx.container, Some(42));
        assert_eq!(ctx.container_label(), "42");
    }

    #[test]
    fn test_direct_message_label() {
        let responder = Arc::new(RecordingResponder::default());
        let ctx = context(direct_message(7, "!ping"), "ping", &[], responder);

        assert!(ctx.message.is_direct());
        assert_eq!(ctx.container_label(), "DM");
    }

    fn gateway_user(id: u64, bot: bool) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "username": format!("user{id}"),
            "discriminator": "0001",
            "avatar": null,
            "bot": bot,
        })
    }

    fn update_event(value: serde_json::Value) -> MessageUpdateEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_edit_event_becomes_edited_message() {
        let event = update_event(json!({
            "id": "10",
            "channel_id": "20",
            "guild_id": "30",
            "author": gateway_user(7, false),
            "content": "!ping again",
        }));

        let msg = IncomingMessage::from_update(&event).unwrap();
        assert_eq!(msg.id, 10);
        assert_eq!(msg.channel_id, 20);
        assert_eq!(msg.guild_id, Some(30));
        assert_eq!(msg.author, principal(7));
        assert_eq!(msg.content, "!ping again");
        assert!(msg.edited);
    }

    #[test]
    fn test_edit_event_without_content_or_author_is_skipped() {
        let no_content = update_event(json!({
            "id": "10",
            "channel_id": "20",
            "author": gateway_user(7, false),
        }));
        assert!(IncomingMessage::from_update(&no_content).is_none());

        let no_author = update_event(json!({
            "id": "10",
            "channel_id": "20",
            "content": "!ping",
        }));
        assert!(IncomingMessage::from_update(&no_author).is_none());
    }

    #[test]
    fn test_edit_event_in_direct_message() {
        let event = update_event(json!({
            "id": "10",
            "channel_id": "20",
            "author": gateway_user(7, true),
            "content": "!ping",
        }));

        let msg = IncomingMessage::from_update(&event).unwrap();
        assert!(msg.is_direct());
        assert!(msg.author.bot);
    }

    #[test]
    fn test_created_message_conversion() {
        let mut value = json!({
            "id": "10",
            "channel_id": "20",
            "guild_id": "30",
            "author": gateway_user(7, false),
            "content": "!stats week",
            "timestamp": "2024-05-01T12:00:00.000000+00:00",
            "edited_timestamp": null,
            "tts": false,
            "mention_everyone": false,
            "mentions": [],
            "mention_roles": [],
            "attachments": [],
            "embeds": [],
            "pinned": false,
            "type": 0,
        });
        let message: Message = serde_json::from_value(value.clone()).unwrap();
        let msg = IncomingMessage::from(&message);
        assert_eq!(msg.guild_id, Some(30));
        assert_eq!(msg.content, "!stats week");
        assert!(!msg.edited);

        value["edited_timestamp"] = json!("2024-05-01T12:01:00.000000+00:00");
        let message: Message = serde_json::from_value(value).unwrap();
        assert!(IncomingMessage::from(&message).edited);
    }

    #[tokio::test]
    async fn test_reply_goes_to_origin_channel_in_chunks() {
        let responder = Arc::new(RecordingResponder::default());
        let ctx = context(
            guild_message(1, 2, "!help"),
            "help",
            &[],
            responder.clone(),
        );

        ctx.reply(&"line\n".repeat(900)).await.unwrap();

        let sent = responder.sent.lock().await;
        assert!(sent.len() >= 2);
        assert!(sent.iter().all(|(channel, _)| *channel == 100));
    }
}
