use std::time::Duration;

use anyhow::Context as _;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::prompt::load_system_prompt;
use crate::vision::{ContentPart, ImageDetail, vision_content};

pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// One chat-completion call. Unset options fall back to the service config.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionRequest {
    prompt: String,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    /// `Some("")` sends no system message at all.
    system_prompt: Option<String>,
    timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
    system_prompt: String,
}

impl LlmService {
    /// Build the HTTP client and preload the base system prompt.
    ///
    /// A missing API key is not an error here; completions report it instead.
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build LLM http client")?;

        if !config.has_api_key() {
            warn!("LLM API key is not set; completion requests will be refused");
        }

        let system_prompt = load_system_prompt(&config);
        info!(model = %config.model, url = %config.api_url, "LLM client initialized");

        Ok(Self {
            client,
            config,
            system_prompt,
        })
    }

    /// Replace the preloaded system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Send a text prompt and return the first choice's content verbatim.
    pub async fn chat_completion(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let result = self
            .send(&request, MessageContent::Text(&request.prompt))
            .await;
        log_outcome("chat completion", &result);
        result
    }

    /// Like [`Self::chat_completion`], but flattens failures into a
    /// display-safe message starting with [`crate::FAILURE_MARKER`].
    pub async fn get_chat_completion(&self, request: CompletionRequest) -> String {
        match self.chat_completion(request).await {
            Ok(reply) => reply,
            Err(err) => err.user_message(),
        }
    }

    /// Send a prompt together with chart screenshots.
    ///
    /// Every image is normalized to PNG and inlined as a data URL.
    pub async fn vision_analysis(
        &self,
        request: CompletionRequest,
        images: Vec<Vec<u8>>,
        detail: ImageDetail,
    ) -> Result<String, LlmError> {
        let result = match self.precheck(&request) {
            Ok(()) => {
                let image_count = images.len();
                let parts = vision_content(
                    &request.prompt,
                    images,
                    detail,
                    self.config.max_image_bytes,
                )
                .await;
                debug!(image_count, parts = parts.len(), "built vision request");
                self.send(&request, MessageContent::Parts(parts)).await
            }
            Err(err) => Err(err),
        };
        log_outcome("vision analysis", &result);
        result
    }

    fn precheck(&self, request: &CompletionRequest) -> Result<(), LlmError> {
        if request.prompt.is_empty() {
            return Err(LlmError::EmptyPrompt);
        }
        if !self.config.has_api_key() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(())
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        user_content: MessageContent<'_>,
    ) -> Result<String, LlmError> {
        self.precheck(request)?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;

        let system_prompt = request
            .system_prompt
            .as_deref()
            .unwrap_or(&self.system_prompt);
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: MessageContent::Text(system_prompt),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: user_content,
        });

        let body = ChatCompletionBody {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::from_transport(err, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| LlmError::from_transport(err, timeout))?;

        if !status.is_success() {
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_reply(&text)
    }
}

fn extract_reply(body: &str) -> Result<String, LlmError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| LlmError::Unexpected(format!("invalid JSON response: {err}")))?;

    let first_choice = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_owned()))?;

    first_choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            LlmError::MalformedResponse("first choice has no message content".to_owned())
        })
}

fn log_outcome(operation: &str, result: &Result<String, LlmError>) {
    match result {
        Ok(reply) => debug!(operation, chars = reply.chars().count(), "LLM reply received"),
        Err(err) => error!(operation, kind = ?err.kind(), %err, "LLM request failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::{CompletionRequest, LlmService};
    use crate::config::LlmConfig;
    use crate::error::{LlmError, LlmErrorKind};
    use crate::vision::ImageDetail;

    fn service(api_url: String) -> LlmService {
        let config = LlmConfig {
            api_key: Some("test-key".to_owned()),
            api_url,
            system_prompt_path: None,
            ..LlmConfig::default()
        };
        LlmService::new(config).expect("client builds")
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];

        loop {
            let read = socket.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..read]);

            let Some(header_end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer exactly one request and hand back what was received.
    async fn respond_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!(
            "http://{}/v1/chat/completions",
            listener.local_addr().expect("local addr")
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            let _ = socket.shutdown().await;
            request
        });

        (url, handle)
    }

    fn request_json(raw: &str) -> Value {
        let (_, body) = raw.split_once("\r\n\r\n").expect("request has a body");
        serde_json::from_str(body).expect("request body is json")
    }

    fn reply_body(content: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    #[tokio::test]
    async fn returns_first_choice_and_sends_expected_body() {
        let (url, server) = respond_once("200 OK", reply_body("Wait for the H1 break.")).await;
        let llm = service(url).with_system_prompt("You are TradeGenie.");

        let reply = llm
            .chat_completion(CompletionRequest::new("Bias on XAUUSD?"))
            .await
            .expect("completion succeeds");
        assert_eq!(reply, "Wait for the H1 break.");

        let raw = server.await.expect("server task");
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert_eq!(
            request_json(&raw),
            json!({
                "model": "deepseek-chat",
                "messages": [
                    {"role": "system", "content": "You are TradeGenie."},
                    {"role": "user", "content": "Bias on XAUUSD?"},
                ],
                "max_tokens": 1500,
                "temperature": 0.3,
            })
        );
    }

    #[tokio::test]
    async fn empty_system_prompt_sends_only_user_message() {
        let (url, server) = respond_once("200 OK", reply_body("ok")).await;
        let llm = service(url).with_system_prompt("preloaded");

        let request = CompletionRequest::new("hello")
            .system_prompt("")
            .model("deepseek-reasoner")
            .max_tokens(64)
            .temperature(0.0);
        assert_eq!(llm.chat_completion(request).await.expect("ok"), "ok");

        let sent = request_json(&server.await.expect("server task"));
        assert_eq!(sent["model"], "deepseek-reasoner");
        assert_eq!(sent["max_tokens"], 64);
        assert_eq!(sent["messages"], json!([{"role": "user", "content": "hello"}]));
    }

    #[tokio::test]
    async fn empty_prompt_and_missing_key_fail_without_network() {
        // Nothing listens on the discard port; a request would surface as a
        // connection error instead of the validation errors below.
        let llm = service("http://127.0.0.1:9/v1/chat/completions".to_owned());
        let err = llm
            .chat_completion(CompletionRequest::new(""))
            .await
            .expect_err("empty prompt");
        assert!(matches!(err, LlmError::EmptyPrompt));

        let reply = llm.get_chat_completion(CompletionRequest::new("")).await;
        assert!(reply.starts_with("❌"));

        let keyless = LlmService::new(LlmConfig {
            api_key: None,
            system_prompt_path: None,
            ..LlmConfig::default()
        })
        .expect("client builds");
        let err = keyless
            .chat_completion(CompletionRequest::new("hello"))
            .await
            .expect_err("missing key");
        assert_eq!(err.kind(), LlmErrorKind::Configuration);

        // Only the literal empty string counts as a missing prompt.
        let err = keyless
            .chat_completion(CompletionRequest::new("   "))
            .await
            .expect_err("whitespace prompt still needs a key");
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn http_error_status_keeps_code_and_body() {
        let (url, _server) = respond_once(
            "401 Unauthorized",
            json!({"error": "invalid api key"}).to_string(),
        )
        .await;

        let err = service(url)
            .chat_completion(CompletionRequest::new("hello"))
            .await
            .expect_err("401");
        match &err {
            LlmError::HttpStatus { status, body } => {
                assert_eq!(*status, 401);
                assert!(body.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.user_message().contains("401"));
    }

    #[tokio::test]
    async fn missing_choices_is_malformed() {
        let (url, _server) = respond_once("200 OK", json!({"choices": []}).to_string()).await;
        let err = service(url)
            .chat_completion(CompletionRequest::new("hello"))
            .await
            .expect_err("no choices");
        assert_eq!(err.kind(), LlmErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn non_json_body_is_unexpected() {
        let (url, _server) = respond_once("200 OK", "<html>gateway</html>".to_owned()).await;
        let err = service(url)
            .chat_completion(CompletionRequest::new("hello"))
            .await
            .expect_err("not json");
        assert_eq!(err.kind(), LlmErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = service(format!("http://{addr}/v1/chat/completions"))
            .chat_completion(CompletionRequest::new("hello"))
            .await
            .expect_err("refused");
        assert_eq!(err.kind(), LlmErrorKind::Connection);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!(
            "http://{}/v1/chat/completions",
            listener.local_addr().expect("local addr")
        );
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let err = service(url)
            .chat_completion(CompletionRequest::new("hello").timeout(Duration::from_millis(200)))
            .await
            .expect_err("timeout");
        assert!(matches!(err, LlmError::Timeout(timeout) if timeout == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn vision_request_inlines_png_data_urls() {
        let (url, server) = respond_once("200 OK", reply_body("Bullish structure.")).await;
        let llm = service(url);

        let reply = llm
            .vision_analysis(
                CompletionRequest::new("Analyse these charts."),
                vec![b"not-a-png".to_vec()],
                ImageDetail::High,
            )
            .await
            .expect("vision succeeds");
        assert_eq!(reply, "Bullish structure.");

        let sent = request_json(&server.await.expect("server task"));
        let content = &sent["messages"][0]["content"];
        assert_eq!(content[0], json!({"type": "text", "text": "Analyse these charts."}));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["detail"], "high");
        assert!(
            content[1]["image_url"]["url"]
                .as_str()
                .is_some_and(|url| url.starts_with("data:image/png;base64,"))
        );
    }
}
