//! Serenity gateway binding for the dispatcher
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use log::{debug, info};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

use super::Dispatcher;
use crate::commands::{HttpResponder, IncomingMessage, Responder};

/// Routes gateway message events into the dispatcher
///
/// Every callback returns as soon as the message is handed off; the
/// pipeline runs on its own task.
pub struct DispatchHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// The message an edit event should dispatch, if any
    ///
    /// `None` when edits are switched off or the edit carries no content.
    pub fn edited_message(&self, event: &MessageUpdateEvent) -> Option<IncomingMessage> {
        if !self.dispatcher.options().parse_edits {
            return None;
        }
        let msg = IncomingMessage::from_update(event);
        if msg.is_none() {
            debug!("Edit of message {} carried no content, skipping", event.id);
        }
        msg
    }

    fn route(&self, ctx: &Context, msg: IncomingMessage) {
        let message_id = msg.id;
        let responder: Arc<dyn Responder> = Arc::new(HttpResponder::new(ctx.http.clone()));
        if self.dispatcher.dispatch(msg, responder).is_none() {
            debug!("Message {message_id} filtered before dispatch");
        }
    }
}

#[async_trait]
impl EventHandler for DispatchHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        self.route(&ctx, IncomingMessage::from(&msg));
    }

    async fn message_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        if let Some(msg) = self.edited_message(&event) {
            self.route(&ctx, msg);
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }

        self.dispatcher.set_bot_user_id(ready.user.id.0);
    }
}
