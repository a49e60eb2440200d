//! Message dispatch.
//!
//! A fixed table from message kind to handler, built once from the
//! configured categories. Write kinds forward each record to the gateway;
//! the sync-request kind assembles the one reply the protocol has.

use crate::config::CategoryConfig;
use crate::error::ServerError;
use scoutsync_gateway::Gateway;
use scoutsync_protocol::{Message, MessageKind};
use serde_json::Value;
use std::sync::Arc;

/// A resolved record category.
#[derive(Debug, Clone)]
pub struct Category {
    pub kind: MessageKind,
    pub name: String,
    pub location: String,
    pub key_fields: Vec<String>,
}

impl Category {
    /// Resolves a configured category, rejecting unknown wire tags.
    pub fn from_config(config: &CategoryConfig) -> Result<Self, ServerError> {
        let tag = config.tag.as_bytes().first().copied().unwrap_or(0);
        let kind = MessageKind::from_tag(tag)?;
        Ok(Self {
            kind,
            name: config.name.clone(),
            location: config.location().to_string(),
            key_fields: config.key_fields.clone(),
        })
    }
}

/// Routes decoded messages to their handler.
pub struct Dispatcher {
    gateway: Arc<Gateway>,
    categories: Vec<Category>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<Gateway>, categories: Vec<Category>) -> Self {
        Self {
            gateway,
            categories,
        }
    }

    /// Handles one message, returning the reply to send, if any.
    ///
    /// Only a sync request produces a reply; write kinds are acknowledged at
    /// the frame level and nothing more.
    pub async fn dispatch(&self, message: Message) -> Result<Option<Message>, ServerError> {
        match message.kind {
            MessageKind::SyncRequest => self.handle_sync().await.map(Some),
            _ => {
                self.handle_write(&message).await?;
                Ok(None)
            }
        }
    }

    /// Writes every record of the message through the gateway.
    ///
    /// Records are processed independently: one malformed record is logged
    /// and skipped, its siblings still land.
    async fn handle_write(&self, message: &Message) -> Result<(), ServerError> {
        let category = self
            .category_for(message.kind)
            .ok_or(ServerError::UnknownCategory(message.kind.tag() as char))?;

        for record in message.records() {
            let key = match derive_key(category, record) {
                Ok(key) => key,
                Err(reason) => {
                    tracing::warn!(
                        "Skipping malformed '{}' record: {}",
                        category.name,
                        reason
                    );
                    continue;
                }
            };

            match self
                .gateway
                .put(&category.location, &key, record.clone())
                .await
            {
                Ok(outcome) => {
                    tracing::debug!(
                        "Stored '{}' record {} ({:?})",
                        category.name,
                        key,
                        outcome
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping '{}' record {}: {}",
                        category.name,
                        key,
                        e
                    );
                }
            }
        }

        Ok(())
    }

    /// Builds the full-sync reply: one object keyed by category name, each
    /// value the array of that category's cached records.
    async fn handle_sync(&self) -> Result<Message, ServerError> {
        let mut reply = serde_json::Map::new();
        for category in &self.categories {
            let records = self.gateway.read_all(&category.location).await?;
            reply.insert(category.name.clone(), Value::Array(records));
        }
        Ok(Message::new(MessageKind::SyncRequest, Value::Object(reply)))
    }

    fn category_for(&self, kind: MessageKind) -> Option<&Category> {
        self.categories.iter().find(|c| c.kind == kind)
    }
}

/// Derives the storage key for a record by joining its key-field values.
///
/// A record that is not an object, or is missing a usable value for any key
/// field, is malformed.
fn derive_key(category: &Category, record: &Value) -> Result<String, String> {
    let obj = record
        .as_object()
        .ok_or_else(|| "record is not a JSON object".to_string())?;

    let mut parts = Vec::with_capacity(category.key_fields.len());
    for field in &category.key_fields {
        let part = match obj.get(field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return Err(format!("missing key field '{}'", field)),
        };
        parts.push(sanitize(&part));
    }

    Ok(parts.join("_"))
}

/// Replaces anything not filesystem/URL-safe in a key segment.
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
