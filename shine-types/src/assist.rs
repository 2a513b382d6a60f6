//! The AI proxy contract, plus the structured answers the app asks the model for.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema, tsify::Tsify,
)]
#[serde(rename_all = "lowercase")]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
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

/// Body of `POST /ai`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct AiRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Sent with a success status whenever the proxy can't produce a completion.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackSignal {
    pub fallback: bool,
}

impl FallbackSignal {
    pub const FALLBACK: FallbackSignal = FallbackSignal { fallback: true };
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The part of an upstream completion payload the app reads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    pub content: Vec<ContentBlock>,
}

impl Completion {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| block.text.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What `POST /ai` answers with.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProxyReply {
    Fallback(FallbackSignal),
    Completion(Completion),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct WeeklyInsight {
    /// A short, encouraging headline about the week (max 10 words)
    pub headline: String,
    /// 2-3 sentences of personalized observation about patterns, wins, or areas of growth
    pub insight: String,
    /// One specific, actionable suggestion for next week (max 25 words)
    pub suggestion: String,
    /// A single emoji that captures the week's vibe
    pub emoji: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Reframe {
    /// A short 1-sentence acknowledgment that the feeling is real and valid (max 20 words)
    pub validation: String,
    /// A realistic, compassionate, empowering version of the thought (max 40 words)
    pub reframe: String,
    /// The CBT technique used, e.g. "Cognitive Restructuring" or "Decatastrophizing"
    pub technique: String,
    /// One tiny, concrete action they can take right now (max 20 words)
    pub action: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct CompassionLetter {
    /// A warm opening line addressing them (max 10 words)
    pub greeting: String,
    /// The letter itself, 2-3 sentences
    pub body: String,
    /// A loving sign-off (max 8 words)
    pub closing: String,
    /// "Your Kinder Self" or similar
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_reply_fallback() {
        let reply: ProxyReply = serde_json::from_str(r#"{"fallback":true}"#).unwrap();
        assert_eq!(reply, ProxyReply::Fallback(FallbackSignal::FALLBACK));
    }

    #[test]
    fn test_proxy_reply_completion() {
        let reply: ProxyReply = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "hello"}, {"type": "text", "text": "there"}],
                "usage": {"input_tokens": 3, "output_tokens": 2}
            }"#,
        )
        .unwrap();
        let ProxyReply::Completion(completion) = reply else {
            panic!("expected a completion");
        };
        assert_eq!(completion.text(), "hello\nthere");
    }

    #[test]
    fn test_ai_request_omits_unset_hints() {
        let request = AiRequest {
            model: None,
            max_tokens: None,
            system: "be kind".to_string(),
            messages: vec![ChatMessage::user("hi")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "system": "be kind",
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }
}
