//! Models served by the AWS Bedrock runtime.

use super::{base64_image, prompt_text, string_field, Gateway, GatewayModel, Message, Model};
use crate::{registry::Arguments, FrameError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{error::DisplayErrorContext, primitives::Blob};
use image::DynamicImage;
use serde_json::{json, Map, Value};

/// Bedrock runtime client, configured from the environment.
pub struct Bedrock {
    client: aws_sdk_bedrockruntime::Client,
}

impl Bedrock {
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self {
            client: aws_sdk_bedrockruntime::Client::new(&config),
        }
    }
}

#[async_trait]
impl Gateway for Bedrock {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| FrameError::Gateway(DisplayErrorContext(&e).to_string()))?;
        Ok(output.body().as_ref().to_vec())
    }
}

/// `body` followed by the configured arguments, which take precedence.
fn with_args(mut body: Map<String, Value>, args: &Map<String, Value>) -> Value {
    body.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(body)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn anthropic(args: Arguments) -> Result<Box<dyn Model<String>>> {
    Ok(Box::new(GatewayModel::from_arguments(
        args,
        encode_anthropic,
        |response| string_field(response, "/content/0/text"),
    )?))
}

fn encode_anthropic(messages: &[Message], args: &Map<String, Value>) -> Result<Value> {
    let body = object(json!({ "messages": messages }));
    Ok(with_args(body, args))
}

pub fn meta(args: Arguments) -> Result<Box<dyn Model<String>>> {
    Ok(Box::new(GatewayModel::from_arguments(
        args,
        encode_meta,
        |response| string_field(response, "/generation"),
    )?))
}

/// Llama 3 takes a raw prompt in its chat template.
fn encode_meta(messages: &[Message], args: &Map<String, Value>) -> Result<Value> {
    let prompt = format!(
        "<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n{}\n<|eot_id|>\n<|start_header_id|>assistant<|end_header_id|>",
        prompt_text(messages)?
    );
    Ok(with_args(object(json!({ "prompt": prompt })), args))
}

pub fn stable_image(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(GatewayModel::from_arguments(
        args,
        encode_stable_image,
        |response| base64_image(response, "/images/0"),
    )?))
}

fn encode_stable_image(messages: &[Message], args: &Map<String, Value>) -> Result<Value> {
    let body = object(json!({
        "prompt": prompt_text(messages)?,
        "mode": "text-to-image",
    }));
    Ok(with_args(body, args))
}

pub fn stable_xl(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(GatewayModel::from_arguments(
        args,
        encode_stable_xl,
        |response| base64_image(response, "/artifacts/0/base64"),
    )?))
}

fn encode_stable_xl(messages: &[Message], args: &Map<String, Value>) -> Result<Value> {
    let body = object(json!({
        "text_prompts": [{ "text": prompt_text(messages)? }],
    }));
    Ok(with_args(body, args))
}

pub fn titan_image(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(GatewayModel::from_arguments(
        args,
        encode_titan_image,
        |response| base64_image(response, "/images/0"),
    )?))
}

/// Titan only accepts `imageGenerationConfig` from the arguments.
fn encode_titan_image(messages: &[Message], args: &Map<String, Value>) -> Result<Value> {
    let mut config = object(json!({ "numberOfImages": 1 }));
    if let Some(Value::Object(extra)) = args.get("imageGenerationConfig") {
        config.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(json!({
        "taskType": "TEXT_IMAGE",
        "textToImageParams": { "text": prompt_text(messages)? },
        "imageGenerationConfig": config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        Arguments, Factory, Injection, Injections, ModuleDefinition, Registry, Requirement,
    };
    use base64::Engine;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    /// Answers every call with the same body and remembers the requests.
    struct Recorder {
        response: Value,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl Recorder {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Gateway for Recorder {
        async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
            self.requests
                .lock()
                .unwrap()
                .push((model_id.to_owned(), serde_json::from_slice(&body).unwrap()));
            Ok(serde_json::to_vec(&self.response).unwrap())
        }
    }

    /// Resolve `factory` the way configured components are, with `gateway` injected.
    fn build<T: ?Sized>(factory: Factory<T>, gateway: Arc<Recorder>, args: Value) -> Result<Box<T>> {
        let mut injections = Injections::default();
        injections.insert(Requirement::GatewayClient, Injection::Gateway(gateway));
        let mut registry = Registry::new("test");
        registry.register("under-test", &[Requirement::GatewayClient], factory);
        registry.resolve(&ModuleDefinition::new("under-test", object(args)), &injections)
    }

    fn png_base64() -> String {
        let image = image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn anthropic() {
        let gateway = Recorder::new(json!({"content": [{"type": "text", "text": " A cat. "}]}));
        let model = assert_ok!(build(
            super::anthropic,
            gateway.clone(),
            json!({"model_id": "anthropic.claude", "max_tokens": 100, "anthropic_version": "bedrock-2023-05-31"}),
        ));
        assert_eq!(model.model_id(), "anthropic.claude");
        assert_eq!(assert_ok!(model.invoke(&[Message::user("Hi")]).await), " A cat. ");

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            (
                "anthropic.claude".to_owned(),
                json!({
                    "messages": [{"role": "user", "content": [{"type": "text", "text": "Hi"}]}],
                    "max_tokens": 100,
                    "anthropic_version": "bedrock-2023-05-31",
                })
            )
        );
    }

    #[tokio::test]
    async fn meta() {
        let gateway = Recorder::new(json!({"generation": "Robots", "stop_reason": "stop"}));
        let model = assert_ok!(build(
            super::meta,
            gateway.clone(),
            json!({"model_id": "meta.llama3", "max_gen_len": 100}),
        ));
        assert_eq!(assert_ok!(model.invoke(&[Message::user("Hi")]).await), "Robots");
        let requests = gateway.requests.lock().unwrap();
        let body = &requests[0].1;
        assert_eq!(body["max_gen_len"], json!(100));
        assert!(body["prompt"]
            .as_str()
            .unwrap()
            .starts_with("<|begin_of_text|><|start_header_id|>user<|end_header_id|>\nHi\n"));
    }

    #[tokio::test]
    async fn missing_field() {
        let gateway = Recorder::new(json!({"output": "nothing"}));
        let model = assert_ok!(build(super::anthropic, gateway, json!({"model_id": "m"})));
        match model.invoke(&[Message::user("Hi")]).await {
            Err(FrameError::Decode(_)) => {}
            other => panic!("expected a decode error, got {:?}", other),
        }
    }

    #[test]
    fn requires_gateway_and_model_id() {
        assert!(super::anthropic(Arguments::new(object(json!({"model_id": "m"})))).is_err());
        let gateway = Recorder::new(json!({}));
        assert!(build(super::meta, gateway, json!({})).is_err());
    }

    #[tokio::test]
    async fn images() {
        let payload = png_base64();

        let gateway = Recorder::new(json!({"seeds": [1], "images": [payload]}));
        let model = assert_ok!(build(
            super::stable_image,
            gateway.clone(),
            json!({"model_id": "stability.sd3-large-v1:0", "aspect_ratio": "16:9"}),
        ));
        let image = assert_ok!(model.invoke(&[Message::user("A cat")]).await);
        assert_eq!((image.width(), image.height()), (4, 2));
        assert_eq!(
            gateway.requests.lock().unwrap()[0].1,
            json!({"prompt": "A cat", "mode": "text-to-image", "aspect_ratio": "16:9"})
        );

        let gateway = Recorder::new(json!({"artifacts": [{"base64": payload}]}));
        let model = assert_ok!(build(
            super::stable_xl,
            gateway.clone(),
            json!({"model_id": "stability.stable-diffusion-xl-v1", "cfg_scale": 7}),
        ));
        assert_ok!(model.invoke(&[Message::user("A cat")]).await);
        assert_eq!(
            gateway.requests.lock().unwrap()[0].1,
            json!({"text_prompts": [{"text": "A cat"}], "cfg_scale": 7})
        );

        let gateway = Recorder::new(json!({"images": [payload], "error": null}));
        let model = assert_ok!(build(
            super::titan_image,
            gateway.clone(),
            json!({"model_id": "amazon.titan-image-generator-v2:0", "imageGenerationConfig": {"quality": "premium", "width": 1280}}),
        ));
        assert_ok!(model.invoke(&[Message::user("A cat")]).await);
        assert_eq!(
            gateway.requests.lock().unwrap()[0].1,
            json!({
                "taskType": "TEXT_IMAGE",
                "textToImageParams": {"text": "A cat"},
                "imageGenerationConfig": {"numberOfImages": 1, "quality": "premium", "width": 1280},
            })
        );
    }

    #[test]
    fn empty_conversation() {
        assert_err!(encode_meta(&[], &Map::new()));
        assert_err!(encode_titan_image(&[], &Map::new()));
    }
}
