//! Text and image generation models.
//!
//! Every backend implements [`Model`]. Backends behind a managed inference
//! gateway share [`GatewayModel`] and only provide the functions that encode
//! the request body and decode the response body.

pub mod bedrock;
pub mod stability;

use crate::{FrameError, Result};
use async_trait::async_trait;
use base64::Engine;
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Content>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Content::Text { text: text.into() }],
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|content| match content {
            Content::Text { text } => Some(text.as_str()),
        })
    }
}

/// Text of the first message, which single-prompt backends send.
pub(crate) fn prompt_text(messages: &[Message]) -> Result<&str> {
    messages
        .first()
        .and_then(Message::text)
        .ok_or_else(|| FrameError::Prompt("no text to send".into()))
}

#[async_trait]
pub trait Model<T>: Send + Sync {
    fn model_id(&self) -> &str;
    async fn invoke(&self, messages: &[Message]) -> Result<T>;
}

/// Transport to a managed inference gateway: a JSON body goes in, a JSON body comes out.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>>;
}

pub type Encode = fn(&[Message], &Map<String, Value>) -> Result<Value>;
pub type Decode<T> = fn(&Value) -> Result<T>;

/// A model served by a [`Gateway`].
pub struct GatewayModel<T> {
    gateway: Arc<dyn Gateway>,
    model_id: String,
    args: Map<String, Value>,
    encode: Encode,
    decode: Decode<T>,
}

impl<T> GatewayModel<T> {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        model_id: impl Into<String>,
        args: Map<String, Value>,
        encode: Encode,
        decode: Decode<T>,
    ) -> Self {
        Self {
            gateway,
            model_id: model_id.into(),
            args,
            encode,
            decode,
        }
    }

    /// Build from resolved arguments: the injected gateway, `model_id`, and
    /// whatever else is passed through to the request body.
    pub fn from_arguments(
        mut args: crate::registry::Arguments,
        encode: Encode,
        decode: Decode<T>,
    ) -> Result<Self> {
        let gateway = args.gateway()?;
        let model_id: String = args.require("model_id")?;
        Ok(Self::new(gateway, model_id, args.into_values(), encode, decode))
    }
}

#[async_trait]
impl<T: Send + 'static> Model<T> for GatewayModel<T> {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, messages: &[Message]) -> Result<T> {
        let body = (self.encode)(messages, &self.args)?;
        let response = self
            .gateway
            .invoke_model(&self.model_id, serde_json::to_vec(&body)?)
            .await?;
        let response: Value = serde_json::from_slice(&response)
            .map_err(|e| FrameError::Decode(format!("{}: {}", self.model_id, e)))?;
        info!("{} responded {}", self.model_id, redact(&response));
        (self.decode)(&response)
    }
}

/// Response fields holding image payloads.
const PAYLOAD_FIELDS: [&str; 2] = ["images", "artifacts"];

/// A copy of a response without its image payloads, for logging.
pub fn redact(response: &Value) -> Value {
    match response {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(key, _)| !PAYLOAD_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Look up a JSON pointer, e.g. `/content/0/text`.
pub(crate) fn field<'a>(response: &'a Value, pointer: &str) -> Result<&'a Value> {
    response
        .pointer(pointer)
        .ok_or_else(|| FrameError::Decode(format!("missing `{}`", pointer)))
}

pub(crate) fn string_field(response: &Value, pointer: &str) -> Result<String> {
    field(response, pointer)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| FrameError::Decode(format!("`{}` is not a string", pointer)))
}

pub(crate) fn base64_image(response: &Value, pointer: &str) -> Result<image::DynamicImage> {
    let data = base64::engine::general_purpose::STANDARD.decode(string_field(response, pointer)?)?;
    Ok(image::load_from_memory(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn message() {
        let message = Message::user("Draw a cat");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "user", "content": [{"type": "text", "text": "Draw a cat"}]})
        );
        assert_eq!(message.text(), Some("Draw a cat"));
        assert_eq!(assert_ok!(prompt_text(&[message])), "Draw a cat");
        assert_err!(prompt_text(&[]));
    }

    #[test]
    fn redact() {
        let response = json!({"seeds": [1], "images": ["aGk="], "artifacts": [{"base64": "aGk="}]});
        assert_eq!(super::redact(&response), json!({"seeds": [1]}));
        assert_eq!(super::redact(&json!("text")), json!("text"));
    }

    #[test]
    fn fields() {
        let response = json!({"content": [{"text": "hi"}], "count": 1});
        assert_eq!(assert_ok!(string_field(&response, "/content/0/text")), "hi");
        assert_err!(string_field(&response, "/content/1/text"));
        assert_err!(string_field(&response, "/count"));
        assert_err!(base64_image(&json!({"images": ["not base64!"]}), "/images/0"));
    }
}
