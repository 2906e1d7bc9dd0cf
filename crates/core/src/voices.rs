//! Synthesized voice pool.
//!
//! Each voice carries the persona name the agent introduces itself with, so the same person
//! hears the same "caller" on every call.

use crate::model::{AgeBand, Person, VoiceGender};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    /// Provider voice identifier.
    pub voice_id: &'static str,
    pub persona: &'static str,
    /// Language prefix matched against the person's language tag, e.g. `en`.
    pub language: &'static str,
    pub gender: VoiceGender,
    pub age: AgeBand,
    pub accent: &'static str,
}

const fn voice(
    voice_id: &'static str,
    persona: &'static str,
    language: &'static str,
    gender: VoiceGender,
    age: AgeBand,
    accent: &'static str,
) -> VoiceProfile {
    VoiceProfile {
        voice_id,
        persona,
        language,
        gender,
        age,
        accent,
    }
}

pub static VOICE_POOL: &[VoiceProfile] = &[
    voice("en-GB-Neural2-A", "Sarah", "en", VoiceGender::Female, AgeBand::Middle, "british"),
    voice("en-GB-Neural2-C", "Helen", "en", VoiceGender::Female, AgeBand::Older, "british"),
    voice("en-GB-Neural2-F", "Emma", "en", VoiceGender::Female, AgeBand::Young, "british"),
    voice("en-GB-Neural2-B", "James", "en", VoiceGender::Male, AgeBand::Middle, "british"),
    voice("en-GB-Neural2-D", "Robert", "en", VoiceGender::Male, AgeBand::Older, "british"),
    voice("en-US-Neural2-F", "Grace", "en", VoiceGender::Female, AgeBand::Middle, "american"),
    voice("en-US-Neural2-J", "Daniel", "en", VoiceGender::Male, AgeBand::Middle, "american"),
    voice("en-AU-Neural2-C", "Olivia", "en", VoiceGender::Female, AgeBand::Young, "australian"),
    voice("cy-GB-Standard-A", "Catrin", "cy", VoiceGender::Female, AgeBand::Middle, "welsh"),
];

/// Language prefix of a BCP-47 tag, lowercased.
fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_ascii_lowercase()
}

/// Choose the voice for a person.
///
/// Voices are filtered by language, then by the person's gender, age and accent
/// preferences. When no voice satisfies every preference they are dropped in the order
/// accent, age, gender until something matches. If the language itself has no voice the
/// whole pool is used. The pick among candidates is derived from the person id.
pub fn select_voice(person: &Person) -> &'static VoiceProfile {
    select_from(VOICE_POOL, person)
}

fn select_from(pool: &'static [VoiceProfile], person: &Person) -> &'static VoiceProfile {
    let language = primary_language(&person.language);
    let mut by_language: Vec<&'static VoiceProfile> =
        pool.iter().filter(|v| v.language == language).collect();
    if by_language.is_empty() {
        by_language = pool.iter().collect();
    }

    let prefs = &person.voice;
    let accent = prefs.accent.as_deref().map(str::to_ascii_lowercase);
    let attempts = [
        (prefs.gender, prefs.age, accent.as_deref()),
        (prefs.gender, prefs.age, None),
        (prefs.gender, None, None),
        (None, None, None),
    ];

    let candidates = attempts
        .iter()
        .map(|&(gender, age, accent)| {
            by_language
                .iter()
                .copied()
                .filter(|v| gender.is_none_or(|g| v.gender == g))
                .filter(|v| age.is_none_or(|a| v.age == a))
                .filter(|v| accent.is_none_or(|a| v.accent == a))
                .collect::<Vec<_>>()
        })
        .find(|c| !c.is_empty())
        .unwrap_or(by_language);

    let index = (person.id.as_u128() % candidates.len() as u128) as usize;
    candidates[index]
}
