use std::fmt;
use std::time::Duration;

/// Prefix of every user-facing failure, so it never reads like a model reply.
pub const FAILURE_MARKER: &str = "❌";

const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    InvalidInput,
    Configuration,
    MalformedResponse,
    HttpStatus,
    Connection,
    Timeout,
    Request,
    Unexpected,
}

#[derive(Debug)]
pub enum LlmError {
    EmptyPrompt,
    MissingApiKey,
    /// The provider answered 2xx without a usable `choices[0].message.content`.
    MalformedResponse(String),
    HttpStatus { status: u16, body: String },
    Connection(String),
    Timeout(Duration),
    Request(String),
    Unexpected(String),
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            Self::EmptyPrompt => LlmErrorKind::InvalidInput,
            Self::MissingApiKey => LlmErrorKind::Configuration,
            Self::MalformedResponse(_) => LlmErrorKind::MalformedResponse,
            Self::HttpStatus { .. } => LlmErrorKind::HttpStatus,
            Self::Connection(_) => LlmErrorKind::Connection,
            Self::Timeout(_) => LlmErrorKind::Timeout,
            Self::Request(_) => LlmErrorKind::Request,
            Self::Unexpected(_) => LlmErrorKind::Unexpected,
        }
    }

    /// Text that is safe to send back to the chat user.
    pub fn user_message(&self) -> String {
        let text = match self {
            Self::EmptyPrompt => "Error: Cannot request an analysis without a prompt.".to_owned(),
            Self::MissingApiKey => "Error: LLM API key not configured.".to_owned(),
            Self::MalformedResponse(_) => {
                "LLM API returned an unexpected response. Please try again.".to_owned()
            }
            Self::HttpStatus { status, body } => {
                format!("LLM API Error: {status} - {}", truncate_chars(body, MAX_BODY_CHARS))
            }
            Self::Connection(_) => {
                "Could not connect to the LLM API. Please try again later.".to_owned()
            }
            Self::Timeout(timeout) => format!(
                "The LLM API did not respond within {}.",
                describe_timeout(*timeout)
            ),
            Self::Request(detail) => format!("LLM request failed: {detail}"),
            Self::Unexpected(detail) => format!("Unexpected LLM API error: {detail}"),
        };

        format!("{FAILURE_MARKER} {text}")
    }

    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Unexpected(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPrompt => f.write_str("empty prompt"),
            Self::MissingApiKey => f.write_str("missing api key"),
            Self::MalformedResponse(detail) => write!(f, "malformed response: {detail}"),
            Self::HttpStatus { status, body } => write!(f, "http status {status}: {body}"),
            Self::Connection(detail) => write!(f, "connection failed: {detail}"),
            Self::Timeout(timeout) => write!(f, "timed out after {timeout:?}"),
            Self::Request(detail) => write!(f, "request failed: {detail}"),
            Self::Unexpected(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// Whole seconds when the timeout allows it, milliseconds otherwise.
fn describe_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_owned(),
    }
}
