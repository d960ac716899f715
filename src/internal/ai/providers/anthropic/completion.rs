//! Anthropic Messages API: request building, replies and SSE streaming.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{
    internal::{
        ai::{
            client::Provider,
            completion::{
                ChatContent, ChatMessage, ChatRequest, ContentPart, ModelBackend, ModelError,
                PartStream, StreamPart,
            },
            providers::anthropic::client::Client,
        },
        session::Role,
    },
    utils::storage::{auth::AuthRetry, cloud::CloudFs},
};

/// Chat backend over the Anthropic Messages API.
///
/// `file` parts are fetched from the cloud store when one is configured;
/// without it they are described to the model by name only.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    files: Option<(Arc<dyn CloudFs>, AuthRetry)>,
}

impl AnthropicBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            files: None,
        }
    }

    /// Resolve attachments through `fs`.
    pub fn with_files(mut self, fs: Arc<dyn CloudFs>, retry: AuthRetry) -> Self {
        self.files = Some((fs, retry));
        self
    }

    async fn build_request(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<AnthropicRequest, ModelError> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            if let Some(message) = self.convert_message(message).await? {
                messages.push(message);
            }
        }

        Ok(AnthropicRequest {
            model: request.model.clone(),
            messages,
            max_tokens: calculate_max_tokens(&request.model),
            system: request
                .system
                .clone()
                .filter(|s| !s.trim().is_empty()),
            stream,
        })
    }

    async fn convert_message(
        &self,
        message: &ChatMessage,
    ) -> Result<Option<AnthropicMessage>, ModelError> {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            // UI notices such as error messages are not part of the dialogue
            Role::System => return Ok(None),
        };

        let content = match &message.content {
            ChatContent::Text(text) if text.trim().is_empty() => return Ok(None),
            ChatContent::Text(text) => AnthropicContent::String(text.clone()),
            ChatContent::Parts(parts) => {
                let mut blocks = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        ContentPart::Text { text } if text.trim().is_empty() => {}
                        ContentPart::Text { text } => {
                            blocks.push(AnthropicContentBlock::Text { text: text.clone() })
                        }
                        ContentPart::File {
                            path,
                            mime_type,
                            name,
                        } => {
                            blocks.push(
                                self.file_block(path, mime_type.as_deref(), name.as_deref())
                                    .await?,
                            );
                        }
                    }
                }
                if blocks.is_empty() {
                    return Ok(None);
                }
                AnthropicContent::Array(blocks)
            }
        };

        Ok(Some(AnthropicMessage {
            role: role.to_string(),
            content,
        }))
    }

    async fn file_block(
        &self,
        path: &str,
        mime_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<AnthropicContentBlock, ModelError> {
        let name = name
            .map(str::to_string)
            .or_else(|| path.rsplit('/').next().map(str::to_string))
            .unwrap_or_else(|| path.to_string());
        let mime_type = mime_type.map(str::to_string).unwrap_or_else(|| {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let Some((fs, retry)) = &self.files else {
            tracing::debug!(path, "no cloud store configured, describing attachment by name");
            return Ok(describe_file(&name, &mime_type));
        };

        let data = retry
            .run(|| fs.read(path))
            .await
            .map_err(|e| ModelError::AttachmentError(format!("{path}: {e}")))?;

        Ok(match mime_type.as_str() {
            "image/png" | "image/jpeg" | "image/gif" | "image/webp" => AnthropicContentBlock::Image {
                source: Base64Source::new(&mime_type, &data),
            },
            "application/pdf" => AnthropicContentBlock::Document {
                source: Base64Source::new(&mime_type, &data),
                title: Some(name),
            },
            m if m.starts_with("text/") || m == "application/json" => {
                AnthropicContentBlock::Text {
                    text: format!("{name}:\n{}", String::from_utf8_lossy(&data)),
                }
            }
            _ => describe_file(&name, &mime_type),
        })
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<reqwest::Response, ModelError> {
        let request = self
            .client
            .http_client
            .post(self.client.endpoint("/v1/messages"))
            .json(body);
        let response = self.client.provider.on_request(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await?;
        let message = serde_json::from_str::<AnthropicErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        Err(ModelError::ProviderError {
            status: Some(status.as_u16()),
            message,
        })
    }
}

fn describe_file(name: &str, mime_type: &str) -> AnthropicContentBlock {
    AnthropicContentBlock::Text {
        text: format!("[Attached file: {name} ({mime_type})]"),
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn chat(&self, request: ChatRequest) -> Result<String, ModelError> {
        let body = self.build_request(&request, false).await?;
        let response = self.send(&body).await?;
        let text = response.text().await?;
        let response: AnthropicResponse = serde_json::from_str(&text)?;
        Ok(response.text())
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<PartStream, ModelError> {
        let body = self.build_request(&request, true).await?;
        tracing::debug!(model = %body.model, messages = body.messages.len(), "starting stream");
        let response = self.send(&body).await?;
        Ok(sse_parts(response).boxed())
    }
}

// ================================================================
// Anthropic API Types
// ================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

/// A plain string, or an array of content blocks.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    String(String),
    Array(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Image {
        source: Base64Source,
    },
    Document {
        source: Base64Source,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct Base64Source {
    r#type: &'static str,
    media_type: String,
    data: String,
}

impl Base64Source {
    fn new(media_type: &str, data: &[u8]) -> Self {
        Self {
            r#type: "base64",
            media_type: media_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

/// Server-sent events of a streamed reply. Only the ones that matter here
/// are distinguished.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: StreamDelta,
    },
    MessageStop,
    Error {
        error: AnthropicError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

// ================================================================
// SSE parsing
// ================================================================

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Skip,
    Text(String),
    Stop,
}

/// Interpret one SSE line. Only `data:` lines carry events.
fn parse_sse_line(line: &str) -> Result<SseLine, ModelError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    match serde_json::from_str::<StreamEvent>(data)? {
        StreamEvent::ContentBlockDelta {
            delta: StreamDelta::TextDelta { text },
        } => Ok(SseLine::Text(text)),
        StreamEvent::MessageStop => Ok(SseLine::Stop),
        StreamEvent::Error { error } => Err(ModelError::ProviderError {
            status: None,
            message: error.message,
        }),
        _ => Ok(SseLine::Skip),
    }
}

/// Turn an SSE response body into text parts.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks decode correctly.
fn sse_parts(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamPart, ModelError>> + Send + 'static {
    async_stream::try_stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut stopped = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ModelError::HttpError)?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line))? {
                    SseLine::Text(text) => {
                        yield StreamPart::text(text);
                    }
                    SseLine::Stop => {
                        stopped = true;
                        break 'read;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        // a body cut short by a proxy or a dropped connection is not a reply
        if !stopped {
            Err::<(), _>(ModelError::StreamError(
                "stream ended before message_stop".to_string(),
            ))?;
        }
    }
}

/// Default `max_tokens` for a model family. The API requires the field.
fn calculate_max_tokens(model: &str) -> u64 {
    if model.starts_with("claude-opus-4") {
        32000
    } else if model.starts_with("claude-sonnet-4")
        || model.starts_with("claude-haiku-4")
        || model.starts_with("claude-3-7-sonnet")
    {
        64000
    } else if model.starts_with("claude-3-5-sonnet") || model.starts_with("claude-3-5-haiku") {
        8192
    } else {
        4096
    }
}
