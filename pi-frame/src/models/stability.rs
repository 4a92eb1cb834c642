//! Stability AI's REST API, called directly rather than through a gateway.

use super::{prompt_text, Message, Model};
use crate::{registry::Arguments, FrameError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use log::info;
use reqwest::{header, multipart::Form};
use serde_json::{Map, Value};

const API_URL: &str = "https://api.stability.ai/v2beta/stable-image/generate";

/// Response headers worth logging.
const SUMMARY_HEADERS: [&str; 3] = ["content-type", "finish-reason", "seed"];

pub struct StabilityModel {
    http: reqwest::Client,
    url: String,
    model_id: String,
    api_key: String,
    /// Whether the endpoint serves several models and needs to be told which.
    send_model: bool,
    args: Map<String, Value>,
}

impl StabilityModel {
    fn from_arguments(mut args: Arguments, endpoint: &str, send_model: bool) -> Result<Self> {
        let api_key = args.require("api_key")?;
        let model_id = args.require("model_id")?;
        let base_url: Option<String> = args.take("base_url")?;
        Ok(Self {
            http: reqwest::Client::new(),
            url: format!(
                "{}/{}",
                base_url.as_deref().unwrap_or(API_URL).trim_end_matches('/'),
                endpoint
            ),
            model_id,
            api_key,
            send_model,
            args: args.into_values(),
        })
    }

    fn form(&self, prompt: &str) -> Form {
        let mut form = Form::new().text("prompt", prompt.to_owned());
        if self.send_model {
            form = form.text("model", self.model_id.clone());
        }
        for (name, value) in &self.args {
            form = form.text(name.clone(), form_value(value));
        }
        form
    }
}

/// Form fields are plain text: strings as is, everything else as JSON.
fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn ultra(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(StabilityModel::from_arguments(args, "ultra", false)?))
}

pub fn core(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(StabilityModel::from_arguments(args, "core", false)?))
}

pub fn sd3(args: Arguments) -> Result<Box<dyn Model<DynamicImage>>> {
    Ok(Box::new(StabilityModel::from_arguments(args, "sd3", true)?))
}

#[async_trait]
impl Model<DynamicImage> for StabilityModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, messages: &[Message]) -> Result<DynamicImage> {
        let form = self.form(prompt_text(messages)?);
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "image/*")
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FrameError::Status { status, body });
        }
        let summary: Vec<String> = SUMMARY_HEADERS
            .iter()
            .filter_map(|&name| {
                let value = response.headers().get(name)?.to_str().ok()?;
                Some(format!("{}={}", name, value))
            })
            .collect();
        let bytes = response.bytes().await?;
        info!(
            "{} responded {} ({} bytes) {}",
            self.model_id,
            status,
            bytes.len(),
            summary.join(" ")
        );
        Ok(image::load_from_memory(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };
    use tokio_test::{assert_err, assert_ok};

    fn args(values: Value) -> Arguments {
        Arguments::new(values.as_object().cloned().unwrap())
    }

    #[test]
    fn from_arguments() {
        let model = assert_ok!(StabilityModel::from_arguments(
            args(json!({
                "model_id": "sd3.5-large",
                "api_key": "sk-test",
                "aspect_ratio": "16:9",
                "seed": 42,
            })),
            "sd3",
            true,
        ));
        assert_eq!(model.url, "https://api.stability.ai/v2beta/stable-image/generate/sd3");
        assert_eq!(model.model_id(), "sd3.5-large");
        assert_eq!(model.api_key, "sk-test");
        assert_eq!(model.args.len(), 2);

        let model = assert_ok!(StabilityModel::from_arguments(
            args(json!({"model_id": "ultra", "api_key": "k", "base_url": "http://localhost:8080/"})),
            "ultra",
            false,
        ));
        assert_eq!(model.url, "http://localhost:8080/ultra");
        assert!(model.args.is_empty());
    }

    #[test]
    fn requires_api_key() {
        let error = match StabilityModel::from_arguments(args(json!({"model_id": "m"})), "ultra", false) {
            Err(error) => error,
            Ok(_) => panic!("built without an API key"),
        };
        assert!(error.to_string().contains("api_key"));
    }

    #[test]
    fn form_value() {
        assert_eq!(super::form_value(&json!("16:9")), "16:9");
        assert_eq!(super::form_value(&json!(42)), "42");
        assert_eq!(super::form_value(&json!(0.5)), "0.5");
        assert_eq!(super::form_value(&json!(true)), "true");
    }

    #[tokio::test]
    async fn empty_conversation() {
        let model = assert_ok!(StabilityModel::from_arguments(
            args(json!({"model_id": "m", "api_key": "k", "base_url": "http://127.0.0.1:9"})),
            "ultra",
            false,
        ));
        assert_err!(model.invoke(&[]).await);
    }

    /// Whether `request` holds the full headers and body.
    fn complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = text[..end].to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        match length {
            Some(length) => request.len() >= end + 4 + length,
            None if headers.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
            None => true,
        }
    }

    /// Answer one request on a local port, handing back what was sent.
    async fn serve_once(status: &str, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let head = format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nseed: 42\r\nconnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        );
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            while !complete(&request) {
                let n = socket.read(&mut buffer).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..n]);
            }
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, server)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([0, 128, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn model(
        factory: fn(Arguments) -> Result<Box<dyn Model<DynamicImage>>>,
        model_id: &str,
        url: &str,
    ) -> Box<dyn Model<DynamicImage>> {
        assert_ok!(factory(args(json!({
            "model_id": model_id,
            "api_key": "sk-test",
            "base_url": url,
            "aspect_ratio": "16:9",
        }))))
    }

    #[tokio::test]
    async fn error_status() {
        let (url, server) = serve_once("403 Forbidden", "text/plain", b"denied".to_vec()).await;
        let model = model(ultra, "stable-image-ultra", &url);
        match model.invoke(&[Message::user("A cat")]).await {
            Err(FrameError::Status { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert_eq!(body, "denied");
            }
            Err(e) => panic!("unexpected error {:?}", e),
            Ok(_) => panic!("decoded an error response"),
        }
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /ultra "));
    }

    #[tokio::test]
    async fn image_response() {
        let (url, server) = serve_once("200 OK", "image/png", png(6, 4)).await;
        let model = model(ultra, "stable-image-ultra", &url);
        let image = assert_ok!(model.invoke(&[Message::user("A cat")]).await);
        assert_eq!((image.width(), image.height()), (6, 4));

        let request = server.await.unwrap();
        let lowercase = request.to_ascii_lowercase();
        assert!(lowercase.contains("authorization: bearer sk-test"));
        assert!(lowercase.contains("accept: image/*"));
        assert!(request.contains("name=\"prompt\"\r\n\r\nA cat\r\n"));
        assert!(request.contains("name=\"aspect_ratio\"\r\n\r\n16:9\r\n"));
        assert!(!request.contains("name=\"model\""));
    }

    #[tokio::test]
    async fn undecodable_image() {
        let (url, server) = serve_once("200 OK", "image/png", b"not a png".to_vec()).await;
        let model = model(super::core, "stable-image-core", &url);
        assert_err!(model.invoke(&[Message::user("A cat")]).await);
        assert!(server.await.unwrap().starts_with("POST /core "));
    }

    #[tokio::test]
    async fn sd3_names_its_model() {
        let (url, server) = serve_once("200 OK", "image/png", png(2, 2)).await;
        let model = model(sd3, "sd3.5-large", &url);
        assert_ok!(model.invoke(&[Message::user("A cat")]).await);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /sd3 "));
        assert!(request.contains("name=\"model\"\r\n\r\nsd3.5-large\r\n"));
    }
}
