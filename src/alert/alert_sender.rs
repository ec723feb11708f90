//! Abstraction used by the pollers to deliver alerts.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::ChannelId;

use super::{Alert, AlertError};

/// A way to deliver an [`Alert`] to a channel.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_alert(&self, channel_id: &str, alert: &Alert) -> Result<(), AlertError>;
}

#[async_trait]
impl<T: AlertSender + ?Sized> AlertSender for Arc<T> {
    async fn send_alert(&self, channel_id: &str, alert: &Alert) -> Result<(), AlertError> {
        (**self).send_alert(channel_id, alert).await
    }
}

/// Discord delivery over the REST client, no gateway connection needed.
pub struct DiscordAlertSender {
    http: Arc<Http>,
}

impl DiscordAlertSender {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl AlertSender for DiscordAlertSender {
    async fn send_alert(&self, channel_id: &str, alert: &Alert) -> Result<(), AlertError> {
        let channel = parse_channel_id(channel_id)?;
        let message = CreateMessage::new().embed(alert.to_embed());

        channel.send_message(&self.http, message).await?;
        Ok(())
    }
}

pub fn parse_channel_id(channel_id: &str) -> Result<ChannelId, AlertError> {
    match channel_id.trim().parse::<u64>() {
        Ok(id) if id != 0 => Ok(ChannelId::new(id)),
        _ => Err(AlertError::InvalidChannel(channel_id.to_string())),
    }
}
