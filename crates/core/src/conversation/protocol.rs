//! Messages exchanged with the telephony provider's real-time conversation transport.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages received from the transport.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    #[serde(rename_all = "camelCase")]
    Setup {
        call_sid: String,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        custom_parameters: HashMap<String, String>,
    },
    /// Recognised speech. Partial results arrive with `last: false`.
    #[serde(rename_all = "camelCase")]
    Prompt {
        voice_prompt: String,
        #[serde(default = "default_last")]
        last: bool,
        #[serde(default)]
        lang: Option<String>,
    },
    /// The person spoke over the agent; only the quoted part of the utterance was heard.
    #[serde(rename_all = "camelCase")]
    Interrupt {
        #[serde(default)]
        utterance_until_interrupt: String,
        #[serde(default)]
        duration_until_interrupt_ms: Option<u64>,
    },
    Dtmf {
        digit: String,
    },
    Error {
        #[serde(default)]
        description: String,
    },
    #[serde(other)]
    Unknown,
}

fn default_last() -> bool {
    true
}

/// Messages sent to the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Text to synthesise.
    Text { token: String, last: bool },
    /// Hang up.
    End,
}

impl OutboundMessage {
    pub fn say(text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            token: text.into(),
            last: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_inbound_events() {
        let setup: InboundMessage = serde_json::from_value(json!({
            "type": "setup",
            "sessionId": "VX1",
            "callSid": "CA123",
            "from": "+447700900123",
            "customParameters": {"token": "abc"}
        }))
        .unwrap();
        assert!(matches!(setup, InboundMessage::Setup { ref call_sid, .. } if call_sid == "CA123"));

        let partial: InboundMessage = serde_json::from_value(json!({
            "type": "prompt", "voicePrompt": "I had", "last": false
        }))
        .unwrap();
        assert!(matches!(partial, InboundMessage::Prompt { last: false, .. }));

        let final_prompt: InboundMessage =
            serde_json::from_value(json!({"type": "prompt", "voicePrompt": "I had toast"})).unwrap();
        assert!(matches!(final_prompt, InboundMessage::Prompt { last: true, .. }));

        let dtmf: InboundMessage =
            serde_json::from_value(json!({"type": "dtmf", "digit": "5"})).unwrap();
        assert_eq!(dtmf, InboundMessage::Dtmf { digit: "5".into() });

        let other: InboundMessage =
            serde_json::from_value(json!({"type": "info", "foo": 1})).unwrap();
        assert_eq!(other, InboundMessage::Unknown);
    }

    #[test]
    fn outbound_wire_format() {
        assert_eq!(
            serde_json::to_value(OutboundMessage::say("Hello")).unwrap(),
            json!({"type": "text", "token": "Hello", "last": true})
        );
        assert_eq!(
            serde_json::to_value(OutboundMessage::End).unwrap(),
            json!({"type": "end"})
        );
    }
}
