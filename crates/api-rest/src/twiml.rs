//! Call-control documents returned to the telephony provider.

use wellcall_core::voices::VoiceProfile;

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

const PROLOGUE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Bridge the call to the real-time conversation transport at `url`.
pub fn connect_relay(url: &str, voice: &VoiceProfile, language: &str) -> String {
    format!(
        "{PROLOGUE}<Response><Connect><ConversationRelay url=\"{url}\" voice=\"{voice}\" \
         language=\"{language}\" interruptible=\"true\" dtmfDetection=\"true\"/></Connect></Response>",
        url = escape(url),
        voice = escape(voice.voice_id),
        language = escape(language),
    )
}

/// Speak `message` and hang up.
pub fn say_and_hangup(message: &str) -> String {
    format!(
        "{PROLOGUE}<Response><Say>{}</Say><Hangup/></Response>",
        escape(message)
    )
}
