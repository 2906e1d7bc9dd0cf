//! Deterministic scoring cascade for completed screening calls.
//!
//! Rules run in priority order. Each rule may append escalations and may raise the running
//! flag, but never lowers it, so a red produced by the suicide-risk screen survives every
//! later rule.

use crate::model::{Assessment, CssrsResult, EscalationTier, Flag};
use serde::Serialize;

/// An escalation the cascade wants raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationDraft {
    pub tier: EscalationTier,
    pub reason: String,
    pub details: Option<String>,
}

/// Outcome of scoring one assessment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub flag: Flag,
    pub escalations: Vec<EscalationDraft>,
}

#[derive(Default)]
struct Cascade {
    flag: Flag,
    escalations: Vec<EscalationDraft>,
}

impl Cascade {
    fn raise(&mut self, flag: Flag) {
        self.flag = self.flag.max(flag);
    }

    fn escalate(&mut self, tier: EscalationTier, reason: impl Into<String>, details: String) {
        self.escalations.push(EscalationDraft {
            tier,
            reason: reason.into(),
            details: Some(details),
        });
    }
}

/// Score an assessment.
///
/// All-absent or all-healthy input yields `(Green, [])`.
pub fn score(assessment: &Assessment) -> ScoreResult {
    let mut cascade = Cascade::default();

    suicide_risk(assessment, &mut cascade);
    depression(assessment, &mut cascade);
    orientation(assessment, &mut cascade);
    wellbeing(assessment, &mut cascade);
    quarterly(assessment, &mut cascade);

    ScoreResult {
        flag: cascade.flag,
        escalations: cascade.escalations,
    }
}

fn suicide_risk(assessment: &Assessment, cascade: &mut Cascade) {
    let Some(result) = assessment.cssrs_result else {
        return;
    };
    let details = format!("C-SSRS result: {}", result.as_str());
    match result {
        CssrsResult::Plan | CssrsResult::Intent | CssrsResult::PriorAttempt => {
            cascade.raise(Flag::Red);
            cascade.escalate(
                EscalationTier::Immediate,
                "Suicide risk: plan, intent or prior attempt reported",
                details,
            );
        }
        CssrsResult::ActiveIdeation => {
            cascade.raise(Flag::Red);
            cascade.escalate(
                EscalationTier::Urgent,
                "Suicide risk: active ideation reported",
                details,
            );
        }
        CssrsResult::PassiveIdeation => {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Urgent,
                "Suicide risk: passive ideation reported",
                details,
            );
        }
        CssrsResult::None => {}
    }
}

fn depression(assessment: &Assessment, cascade: &mut Cascade) {
    let Some(score) = assessment.phq2_score else {
        return;
    };
    if score >= crate::constants::PHQ2_POSITIVE {
        cascade.raise(Flag::Yellow);
        cascade.escalate(
            EscalationTier::Routine,
            "Positive depression screen",
            format!("PHQ-2 score {score}/6"),
        );
    }
}

fn orientation(assessment: &Assessment, cascade: &mut Cascade) {
    let Some(score) = assessment.ottawa_score else {
        return;
    };
    match score {
        0..=2 => {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Urgent,
                "Cognitive orientation: possible acute change",
                format!("Ottawa 3DY score {score}/4"),
            );
        }
        3 => cascade.escalate(
            EscalationTier::Routine,
            "Cognitive orientation: one item missed",
            format!("Ottawa 3DY score {score}/4"),
        ),
        _ => {}
    }
}

fn wellbeing(assessment: &Assessment, cascade: &mut Cascade) {
    for (domain, value) in assessment.clova.domains() {
        let Some(value) = value else {
            continue;
        };
        if value <= 2 {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Routine,
                format!("Low wellbeing score: {domain}"),
                format!("CLOVA-5 {domain} score {value}/5"),
            );
        }
    }
}

fn quarterly(assessment: &Assessment, cascade: &mut Cascade) {
    let q = &assessment.quarterly;

    if let Some(score) = q.cognitive_battery {
        if score < 15 {
            cascade.raise(Flag::Red);
            cascade.escalate(
                EscalationTier::Urgent,
                "Cognitive battery: significant impairment",
                format!("Cognitive battery score {score}/30"),
            );
        } else if score <= 19 {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Routine,
                "Cognitive battery: mild impairment",
                format!("Cognitive battery score {score}/30"),
            );
        }
    }

    if let Some(score) = q.fall_risk {
        if score >= 4 {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Routine,
                "Elevated fall risk",
                format!("Fall-risk score {score}"),
            );
        }
    }

    if let Some(score) = q.loneliness {
        if score >= 7 {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Routine,
                "Loneliness: high isolation",
                format!("Loneliness score {score}/9"),
            );
        } else if score == 6 {
            cascade.escalate(
                EscalationTier::Routine,
                "Loneliness: moderate",
                format!("Loneliness score {score}/9"),
            );
        }
    }

    if let Some(score) = q.functional_independence {
        if score <= 5 {
            cascade.raise(Flag::Yellow);
            cascade.escalate(
                EscalationTier::Routine,
                "Reduced functional independence",
                format!("Functional independence score {score}/6"),
            );
        }
    }
}
