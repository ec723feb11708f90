//! Alerts posted to Discord: the structured payload, the sender abstraction
//! and the builders turning poll results into payloads.

use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use thiserror::Error;

pub mod alert_sender;
pub mod embeds;

pub use alert_sender::AlertSender;
pub use embeds::{MatchOutcome, match_alert, recap_alert};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Discord error: {0}")]
    Discord(Box<serenity::Error>),

    #[error("Invalid channel id: {0}")]
    InvalidChannel(String),
}

impl From<serenity::Error> for AlertError {
    fn from(err: serenity::Error) -> Self {
        AlertError::Discord(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Platform independent message payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub colour: u32,
    pub fields: Vec<AlertField>,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    pub footer: Option<String>,
}

impl Alert {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(AlertField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn to_embed(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().title(&self.title).colour(self.colour);

        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        if let Some(url) = &self.url {
            embed = embed.url(url);
        }
        if let Some(thumbnail) = &self.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }
        if let Some(image) = &self.image {
            embed = embed.image(image);
        }
        if let Some(footer) = &self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }

        embed.fields(
            self.fields
                .iter()
                .map(|f| (f.name.clone(), f.value.clone(), f.inline)),
        )
    }
}
