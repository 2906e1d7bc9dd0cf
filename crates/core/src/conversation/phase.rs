//! Best-effort interview progress tracking.
//!
//! Phases advance forward only, inferred from topic keywords in the agent's speech. The
//! phase is a hint for prompting and logging; completion is signalled only by the agent's
//! submission tool.

use crate::constants::PHQ2_POSITIVE;
use crate::model::CallType;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    Clova5,
    Phq2,
    Cssrs,
    Needs,
    Ottawa,
    Comprehensive,
    Closing,
    Assessment,
    /// Non-clinical inbound conversation with no phase gating.
    CheckIn,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Clova5 => "clova5",
            Phase::Phq2 => "phq2",
            Phase::Cssrs => "cssrs",
            Phase::Needs => "needs",
            Phase::Ottawa => "ottawa",
            Phase::Comprehensive => "comprehensive",
            Phase::Closing => "closing",
            Phase::Assessment => "assessment",
            Phase::CheckIn => "check_in",
        }
    }

    /// Topic keywords that mark the agent moving into this phase.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Phase::Clova5 => &["meal", "eating", "breakfast", "lunch", "dinner", "food"],
            Phase::Phq2 => &[
                "little interest",
                "pleasure in doing",
                "feeling down",
                "depressed",
                "hopeless",
            ],
            Phase::Cssrs => &[
                "wished you were dead",
                "wish you were dead",
                "harming yourself",
                "hurting yourself",
                "ending your life",
                "killing yourself",
            ],
            Phase::Needs => &[
                "anything you need",
                "need any help",
                "help with anything",
                "shopping",
                "prescriptions",
            ],
            Phase::Ottawa => &["what day", "what year", "what month", "today's date", "the date"],
            Phase::Comprehensive => &[
                "few extra questions",
                "some extra questions",
                "remember these words",
                "had a fall",
                "feel lonely",
            ],
            Phase::Closing => &[
                "anything else",
                "before i go",
                "talk to you next",
                "speak to you next",
                "take care",
                "goodbye",
            ],
            Phase::Opening | Phase::Assessment | Phase::CheckIn => &[],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SCREENING_ORDER: [Phase; 7] = [
    Phase::Clova5,
    Phase::Phq2,
    Phase::Cssrs,
    Phase::Needs,
    Phase::Ottawa,
    Phase::Comprehensive,
    Phase::Closing,
];

#[derive(Clone, Debug)]
pub struct PhaseTracker {
    phase: Phase,
    call_type: CallType,
    phq2_answers: Vec<u8>,
}

impl PhaseTracker {
    pub fn new(call_type: CallType) -> Self {
        let phase = if call_type.is_screening() {
            Phase::Opening
        } else {
            Phase::CheckIn
        };
        Self {
            phase,
            call_type,
            phq2_answers: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Running PHQ-2 estimate from the person's frequency answers, 0-6.
    pub fn phq2_estimate(&self) -> u8 {
        self.phq2_answers.iter().sum::<u8>().min(6)
    }

    fn eligible(&self, phase: Phase) -> bool {
        match phase {
            Phase::Cssrs => self.phq2_estimate() >= PHQ2_POSITIVE,
            Phase::Comprehensive => self.call_type == CallType::Comprehensive,
            _ => true,
        }
    }

    /// The phase that follows the current one, skipping phases this call is not eligible for.
    fn next_eligible(&self) -> Option<Phase> {
        SCREENING_ORDER
            .iter()
            .copied()
            .find(|p| *p > self.phase && self.eligible(*p))
    }

    /// Advance on agent speech. Returns the new phase when it changed.
    ///
    /// Only the next eligible phase is considered, so a keyword belonging to a later topic
    /// never skips the questions in between.
    pub fn observe_agent(&mut self, text: &str) -> Option<Phase> {
        if !self.call_type.is_screening() || self.phase >= Phase::Closing {
            return None;
        }
        let next = self.next_eligible()?;
        let lower = text.to_lowercase();
        if !next.keywords().iter().any(|k| lower.contains(k)) {
            return None;
        }
        self.phase = next;
        Some(next)
    }

    /// Record the person's answer; only PHQ-2 frequency answers are scored.
    pub fn observe_person(&mut self, text: &str) {
        if self.phase != Phase::Phq2 || self.phq2_answers.len() >= 2 {
            return;
        }
        if let Some(points) = frequency_points(text) {
            self.phq2_answers.push(points);
        }
    }

    /// Mark the interview as submitted.
    pub fn finish(&mut self) {
        if self.call_type.is_screening() {
            self.phase = Phase::Assessment;
        }
    }
}

const NEGATIONS: [&str; 5] = ["not at all", "never", "not every", "not really", "not much"];

/// PHQ item points for a spoken frequency answer.
///
/// Negations are checked first so "no, not every day" scores zero.
fn frequency_points(text: &str) -> Option<u8> {
    let lower = text.to_lowercase();
    let first_word = lower
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or_default();
    if matches!(first_word, "no" | "nope") || NEGATIONS.iter().any(|n| lower.contains(n)) {
        Some(0)
    } else if lower.contains("every day") || lower.contains("all the time") {
        Some(3)
    } else if lower.contains("more than half") || lower.contains("most days") {
        Some(2)
    } else if lower.contains("several days") || lower.contains("some days") || lower.contains("a few days") {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEALS: &str = "Have you been eating regular meals this week?";
    const INTEREST: &str = "Have you had little interest or pleasure in doing things?";
    const DOWN: &str = "Have you been feeling down, depressed or hopeless?";
    const NEEDS: &str = "Is there anything you need help with, like shopping?";
    const DATE: &str = "Can you tell me what day it is today?";

    fn tracker_at_phq2(call_type: CallType) -> PhaseTracker {
        let mut tracker = PhaseTracker::new(call_type);
        assert_eq!(tracker.observe_agent(MEALS), Some(Phase::Clova5));
        assert_eq!(tracker.observe_agent(INTEREST), Some(Phase::Phq2));
        tracker
    }

    #[test]
    fn meals_move_opening_to_clova() {
        let mut tracker = PhaseTracker::new(CallType::Standard);
        assert_eq!(tracker.observe_agent("Lovely to hear. How are you?"), None);
        assert_eq!(tracker.observe_agent(MEALS), Some(Phase::Clova5));
    }

    #[test]
    fn later_topic_keywords_do_not_skip_ahead() {
        let mut tracker = PhaseTracker::new(CallType::Standard);
        assert_eq!(
            tracker.observe_agent("Hi Ada, it's Sarah. Anything else new since we last spoke?"),
            None
        );
        assert_eq!(tracker.observe_agent(DATE), None);
        assert_eq!(tracker.phase(), Phase::Opening);
        assert_eq!(tracker.observe_agent(MEALS), Some(Phase::Clova5));
    }

    #[test]
    fn never_regresses() {
        let mut tracker = tracker_at_phq2(CallType::Standard);
        assert_eq!(tracker.observe_agent("And what did you have for breakfast?"), None);
        assert_eq!(tracker.phase(), Phase::Phq2);
    }

    #[test]
    fn cssrs_skipped_below_threshold() {
        let mut tracker = tracker_at_phq2(CallType::Standard);
        tracker.observe_person("Not at all really");
        tracker.observe_agent(DOWN);
        tracker.observe_person("Several days maybe");
        assert_eq!(tracker.phq2_estimate(), 1);
        assert_eq!(tracker.observe_agent("Have you wished you were dead?"), None);
        assert_eq!(tracker.observe_agent(NEEDS), Some(Phase::Needs));
    }

    #[test]
    fn cssrs_entered_at_threshold() {
        let mut tracker = tracker_at_phq2(CallType::Standard);
        tracker.observe_person("Nearly every day, to be honest");
        tracker.observe_person("More than half the days");
        assert_eq!(tracker.phq2_estimate(), 5);
        assert_eq!(tracker.observe_agent(NEEDS), None);
        assert_eq!(
            tracker.observe_agent("I'm sorry to hear that. Have you wished you were dead?"),
            Some(Phase::Cssrs)
        );
    }

    #[test]
    fn negated_frequency_scores_zero() {
        let mut tracker = tracker_at_phq2(CallType::Standard);
        tracker.observe_person("No, not every day");
        tracker.observe_person("Now and then, several days");
        assert_eq!(tracker.phq2_estimate(), 1);
        assert_eq!(frequency_points("Never"), Some(0));
        assert_eq!(frequency_points("Nearly every day"), Some(3));
        assert_eq!(frequency_points("I'm not sure"), None);
    }

    #[test]
    fn comprehensive_phase_only_on_comprehensive_calls() {
        let mut standard = tracker_at_phq2(CallType::Standard);
        standard.observe_agent(NEEDS);
        assert_eq!(standard.observe_agent(DATE), Some(Phase::Ottawa));
        assert_eq!(
            standard.observe_agent("I have a few extra questions. Take care now."),
            Some(Phase::Closing)
        );

        let mut comprehensive = tracker_at_phq2(CallType::Comprehensive);
        comprehensive.observe_agent(NEEDS);
        comprehensive.observe_agent(DATE);
        assert_eq!(comprehensive.observe_agent("Take care of yourself."), None);
        assert_eq!(
            comprehensive.observe_agent("I have a few extra questions today."),
            Some(Phase::Comprehensive)
        );
    }

    #[test]
    fn check_in_has_no_gating() {
        let mut tracker = PhaseTracker::new(CallType::CheckIn);
        assert_eq!(tracker.observe_agent("Have you had breakfast?"), None);
        tracker.finish();
        assert_eq!(tracker.phase(), Phase::CheckIn);
    }
}
