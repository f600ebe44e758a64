use thiserror::Error;

/// Classified failures from the completion service.
///
/// The orchestration loop keys its recovery behavior off this taxonomy:
/// transient failures are retried with backoff, context overflow and
/// malformed requests abort the turn, everything else escalates unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("transient service failure ({}): {message}", status_label(.status))]
    Transient { status: Option<u16>, message: String },
    #[error("request exceeds the model context window: {0}")]
    ContextOverflow(String),
    #[error("service rejected the request: {0}")]
    MalformedRequest(String),
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    #[error("undecodable service payload: {0}")]
    Decode(String),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("http {code}"),
        None => "transport".to_string(),
    }
}

impl CompletionError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classify a non-success HTTP status from an OpenAI-compatible service.
    ///
    /// 429/408 and all 5xx are retryable. A 400 whose body names the context
    /// window is an overflow, which must not be retried; any other 4xx is a
    /// malformed request.
    pub fn classify_status(status: u16, body: &str) -> Self {
        if status == 429 || status == 408 || status >= 500 {
            return Self::Transient {
                status: Some(status),
                message: compact(body),
            };
        }
        if looks_like_context_overflow(body) {
            return Self::ContextOverflow(compact(body));
        }
        Self::MalformedRequest(format!("http {status}: {}", compact(body)))
    }
}

fn looks_like_context_overflow(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("context window")
        || lower.contains("context length")
        || lower.contains("maximum context")
        || lower.contains("context_length_exceeded")
}

fn compact(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 512 {
        return trimmed.to_string();
    }
    let mut end = 512;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}
