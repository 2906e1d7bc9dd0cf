//! Cross-call memory handed to the agent at the start of a call.

use crate::model::{Assessment, Call, CallStatus, Person};

/// Render prior care notes, the last call summary and the last scores as plain text.
pub fn memory_digest(
    person: &Person,
    previous_call: Option<&Call>,
    last_assessment: Option<&Assessment>,
) -> String {
    let mut lines = Vec::new();

    if let Some(notes) = person.care_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        lines.push(format!("Care notes: {notes}"));
    }

    if let Some(call) = previous_call {
        if let Some(summary) = call.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            let when = call
                .completed_at
                .unwrap_or(call.scheduled_at)
                .format("%-d %B");
            lines.push(format!("Last call ({when}): {}", summary.trim()));
        }
    }

    if let Some(assessment) = last_assessment {
        let scores: Vec<String> = assessment
            .clova
            .domains()
            .iter()
            .filter_map(|(domain, score)| score.map(|s| format!("{domain} {s}/5")))
            .collect();
        if !scores.is_empty() {
            lines.push(format!("Last wellbeing scores: {}", scores.join(", ")));
        }
        if let Some(phq2) = assessment.phq2_score {
            lines.push(format!("Last PHQ-2: {phq2}/6"));
        }
        lines.push(format!("Last overall flag: {}", assessment.flag));
    }

    lines.join("\n")
}

/// The most recent completed call other than `current`.
pub fn previous_completed<'a>(calls_newest_first: &'a [Call], current: uuid::Uuid) -> Option<&'a Call> {
    calls_newest_first
        .iter()
        .find(|c| c.id != current && c.status == CallStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallType, Flag, ScheduleFrequency};
    use crate::testing::{person, utc};
    use uuid::Uuid;

    #[test]
    fn digest_combines_notes_summary_and_scores() {
        let mut ada = person("Ada Lovelace", ScheduleFrequency::Weekly, None);
        ada.care_notes = Some("Lives alone, daughter visits Sundays.".into());

        let mut last = Call::scheduled(ada.id, CallType::Standard, 0, utc("2026-05-13T10:00:00Z"));
        last.status = CallStatus::Completed;
        last.summary = Some("Enjoyed the garden; knee pain.".into());
        last.completed_at = Some(utc("2026-05-13T10:20:00Z"));

        let mut assessment = Assessment::empty(last.id, ada.id, utc("2026-05-13T10:20:00Z"));
        assessment.clova.meals = Some(4);
        assessment.clova.mobility = Some(2);
        assessment.phq2_score = Some(1);
        assessment.flag = Flag::Yellow;

        let digest = memory_digest(&ada, Some(&last), Some(&assessment));
        assert!(digest.contains("Care notes: Lives alone"));
        assert!(digest.contains("Last call (13 May): Enjoyed the garden"));
        assert!(digest.contains("meals 4/5, mobility 2/5"));
        assert!(digest.contains("Last PHQ-2: 1/6"));
        assert!(digest.contains("Last overall flag: yellow"));
    }

    #[test]
    fn empty_history_gives_empty_digest() {
        let ada = person("Ada Lovelace", ScheduleFrequency::Weekly, None);
        assert_eq!(memory_digest(&ada, None, None), "");
    }

    #[test]
    fn previous_completed_skips_current_and_misses() {
        let pid = Uuid::new_v4();
        let now = utc("2026-05-20T10:00:00Z");
        let current = Call::scheduled(pid, CallType::Standard, 0, now);
        let mut missed = Call::scheduled(pid, CallType::Standard, 0, now);
        missed.status = CallStatus::NoAnswer;
        let mut done = Call::scheduled(pid, CallType::Standard, 0, now);
        done.status = CallStatus::Completed;
        let calls = vec![current.clone(), missed, done.clone()];
        assert_eq!(previous_completed(&calls, current.id).map(|c| c.id), Some(done.id));
    }
}
