//! Language-model collaborator.
//!
//! Two instances are used per deployment: a low-latency model that holds the conversation
//! and a higher-accuracy model that produces the authoritative structured assessment.

use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A structured tool the model may invoke.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must call the named tool.
    Required(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub input: Value,
}

/// Text and at most one tool invocation returned by the model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_call: Option<ToolCall>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> CoreResult<ModelReply>;
}

/// Placeholder user turn used when a history starts with the agent speaking.
const CALL_CONNECTED: &str = "(The call has connected.)";

/// Shape a conversation history for a messages API that requires alternating turns
/// starting with the user.
///
/// A leading agent turn gets a synthetic user turn before it, consecutive turns from the
/// same speaker are merged, and empty turns are dropped.
pub fn normalise_turns(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len() + 1);
    for message in messages.iter().filter(|m| !m.content.trim().is_empty()) {
        match out.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push('\n');
                last.content.push_str(&message.content);
            }
            None if message.role == ChatRole::Assistant => {
                out.push(ChatMessage::user(CALL_CONNECTED));
                out.push(message.clone());
            }
            _ => out.push(message.clone()),
        }
    }
    if out.is_empty() {
        out.push(ChatMessage::user(CALL_CONNECTED));
    }
    out
}

/// Messages API client.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl AnthropicModel {
    pub const API_VERSION: &'static str = "2023-06-01";

    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> CoreResult<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(CoreError::InvalidConfig("model name cannot be empty".into()));
        }
        Ok(Self {
            client: super::http_client()?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model,
        })
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": normalise_turns(&request.messages),
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
            body["tool_choice"] = match &request.tool_choice {
                ToolChoice::Auto => json!({ "type": "auto" }),
                ToolChoice::Required(name) => json!({ "type": "tool", "name": name }),
            };
        }
        body
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, request: ModelRequest) -> CoreResult<ModelReply> {
        debug!(model = %self.model, turns = request.messages.len(), "requesting model reply");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| CoreError::Model(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Model(format!("{status}: {body}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Model(e.to_string()))?;

        let mut reply = ModelReply::default();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => {
                    if !reply.text.is_empty() {
                        reply.text.push(' ');
                    }
                    reply.text.push_str(text.trim());
                }
                ContentBlock::ToolUse { name, input } => {
                    if reply.tool_call.is_none() {
                        reply.tool_call = Some(ToolCall { name, input });
                    }
                }
                ContentBlock::Other => {}
            }
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_agent_turn_gets_synthetic_user_turn() {
        let turns = normalise_turns(&[
            ChatMessage::assistant("Hello Margaret!"),
            ChatMessage::user("Hi there"),
        ]);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].content, "Hello Margaret!");
    }

    #[test]
    fn consecutive_turns_are_merged() {
        let turns = normalise_turns(&[
            ChatMessage::user("I had toast"),
            ChatMessage::user("and tea"),
            ChatMessage::assistant(""),
            ChatMessage::assistant("Lovely."),
        ]);
        assert_eq!(
            turns,
            vec![
                ChatMessage::user("I had toast\nand tea"),
                ChatMessage::assistant("Lovely."),
            ]
        );
    }

    #[test]
    fn forced_tool_choice_is_encoded() {
        let model = AnthropicModel::new("https://api.example.com", "key", "scoring").unwrap();
        let body = model.body(&ModelRequest {
            system: "Score the call.".into(),
            messages: vec![ChatMessage::user("Transcript")],
            tools: vec![ToolSpec {
                name: "submit_assessment".into(),
                description: "Submit".into(),
                input_schema: json!({"type": "object"}),
            }],
            tool_choice: ToolChoice::Required("submit_assessment".into()),
            max_tokens: 100,
        });
        assert_eq!(body["tool_choice"]["type"], "tool");
        assert_eq!(body["tool_choice"]["name"], "submit_assessment");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Thanks, that's everything."},
                {"type": "tool_use", "id": "t1", "name": "submit_assessment", "input": {"meals": 4}},
                {"type": "thinking", "thinking": "..."}
            ]
        }))
        .unwrap();
        assert_eq!(parsed.content.len(), 3);
        assert!(matches!(parsed.content[2], ContentBlock::Other));
    }

    #[test]
    fn rejects_empty_model_name() {
        assert!(AnthropicModel::new("https://api.example.com", "key", " ").is_err());
    }
}
