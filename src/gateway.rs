//! Client for the hosted text-generation API that writes app source code.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;

/// Fixed role instructions sent with every generation request.
pub const SYSTEM_INSTRUCTIONS: &str = "You are an expert Streamlit developer. \
Build a working, modern and professional Streamlit application for the user's request.

RULES:
1. Output ONLY Python code, nothing else
2. Start with st.set_page_config()
3. Modern UI: use st.columns, st.metric, st.info/warning/success
4. Add interactive elements: button, slider, selectbox, text_input
5. Visualize data: st.line_chart, st.bar_chart, st.dataframe
6. Reply with a single code block and no explanation
7. The code must run without errors";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("missing api key")]
    MissingCredential,
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("network error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Message safe to show to the person who clicked "generate".
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Generation is not configured: no API key available",
            Self::Timeout => "The generation service timed out, please try again",
            Self::Http { status, .. } if *status == 401 => {
                "The generation service rejected the API key"
            }
            Self::Http { status, .. } if *status == 429 => {
                "The generation service is rate limiting requests, please try again later"
            }
            Self::Http { .. } | Self::Transport(_) => {
                "The generation service is unavailable, please try again"
            }
            Self::MalformedResponse(_) => "The generation service returned an unexpected response",
        }
    }
}

/// Anything that can turn a prompt into app source code.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Whether a configured credential exists (a per-request key may still be supplied).
    fn has_credential(&self) -> bool;

    /// Generate code for `prompt` under `system` instructions. `api_key`
    /// overrides the configured credential for this call only.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        api_key: Option<&str>,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    http: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl OpenAiGateway {
    pub fn new(config: &GenerationConfig, api_key: Option<String>) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("appfab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    async fn send_request(
        &self,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> Result<String, GatewayError> {
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::MalformedResponse(e.to_string())
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| {
                GatewayError::MalformedResponse("missing choices[0].message.content".into())
            })
    }
}

#[async_trait]
impl CodeGenerator for OpenAiGateway {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        api_key: Option<&str>,
    ) -> Result<String, GatewayError> {
        let key = api_key
            .or(self.api_key.as_deref())
            .ok_or(GatewayError::MissingCredential)?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(system),
                ChatMessage::user(format!("Build a Streamlit app: {}", prompt)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, "Sending generation request");
        let raw = self.send_request(key, &request).await?;
        Ok(strip_code_fence(&raw))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Remove a Markdown code fence wrapping the whole reply.
///
/// Only the opening fence (three backticks plus an optional language tag)
/// and the closing three backticks are touched; fences inside the body stay.
/// Code may start on the opening fence line itself, as in a one-line reply.
pub fn strip_code_fence(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let (first_line, remainder) = match rest.split_once('\n') {
            Some((first_line, remainder)) => (first_line, remainder),
            None => (rest, ""),
        };
        body = if is_fence_tag(first_line) {
            remainder
        } else {
            rest
        };
        if let Some(inner) = body.trim_end().strip_suffix("```") {
            body = inner;
        }
    } else if let Some(inner) = body.strip_suffix("```") {
        // Closing fence without an opener; drop it only if it sits on its own line
        if inner.ends_with('\n') {
            body = inner;
        }
    }

    body.trim().to_string()
}

/// Language tag after an opening fence: empty, or a single word like
/// `python`, `py3` or `c++`.
fn is_fence_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#' | '.' | '_'))
}

/// Prompt asking the model to repair code that failed with `error`.
pub fn fix_prompt(original_prompt: &str, code: &str, error: &str) -> String {
    format!(
        "{}\n\nThe following code was generated for this request but fails with an error.\n\n\
         CODE:\n```python\n{}\n```\n\nERROR:\n{}\n\n\
         Return the complete corrected code.",
        original_prompt.trim(),
        code.trim(),
        error.trim()
    )
}

/// Canned artifact served when generation is not configured and the demo
/// fallback is enabled.
pub const DEMO_CODE: &str = r#"import streamlit as st
import pandas as pd
import numpy as np

st.set_page_config(page_title="Demo App", layout="wide")

st.title("Demo App")
st.markdown("This is a sample Streamlit app.")

with st.sidebar:
    st.header("Settings")
    num_rows = st.slider("Rows", 5, 100, 20)

col1, col2 = st.columns(2)

data = pd.DataFrame({
    "x": range(num_rows),
    "y": np.random.randn(num_rows).cumsum(),
})

with col1:
    st.subheader("Sample data")
    st.line_chart(data.set_index("x"))

with col2:
    st.subheader("Statistics")
    st.metric("Mean", f"{data['y'].mean():.2f}")
    st.metric("Std dev", f"{data['y'].std():.2f}")
    st.dataframe(data.head(10), use_container_width=True)

user_input = st.text_input("Type something:")
if user_input:
    st.success(f"You typed: **{user_input}**")
"#;
