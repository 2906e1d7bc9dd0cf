use super::{EscalationTier, Flag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categorical outcome of the C-SSRS suicide-risk screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CssrsResult {
    None,
    PassiveIdeation,
    ActiveIdeation,
    Plan,
    Intent,
    PriorAttempt,
}

impl CssrsResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            CssrsResult::None => "none",
            CssrsResult::PassiveIdeation => "passive_ideation",
            CssrsResult::ActiveIdeation => "active_ideation",
            CssrsResult::Plan => "plan",
            CssrsResult::Intent => "intent",
            CssrsResult::PriorAttempt => "prior_attempt",
        }
    }
}

/// CLOVA-5 wellbeing sub-scores, each 1 (poor) to 5 (good).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClovaScores {
    pub meals: Option<u8>,
    pub sleep: Option<u8>,
    pub health: Option<u8>,
    pub social: Option<u8>,
    pub mobility: Option<u8>,
}

impl ClovaScores {
    /// Sub-scores paired with their domain names, in screening order.
    pub fn domains(&self) -> [(&'static str, Option<u8>); 5] {
        [
            ("meals", self.meals),
            ("sleep", self.sleep),
            ("health", self.health),
            ("social", self.social),
            ("mobility", self.mobility),
        ]
    }
}

/// Instruments administered only on comprehensive calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterlyScores {
    /// Cognitive battery, 0-30.
    pub cognitive_battery: Option<u8>,
    /// Fall-risk screen, 0-14.
    pub fall_risk: Option<u8>,
    /// Three-item loneliness scale, 3-9.
    pub loneliness: Option<u8>,
    /// Functional independence (activities of daily living), 0-6.
    pub functional_independence: Option<u8>,
}

/// Escalation the conversational agent asked for while submitting its assessment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEscalation {
    pub tier: EscalationTier,
    pub reason: String,
}

/// Clinical screening result for exactly one call.
///
/// Written by the conversation engine with the agent's self-assessed flag, then re-scored
/// by the post-call pipeline, which overwrites `flag` and sets `scored_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub call_id: Uuid,
    pub person_id: Uuid,
    pub clova: ClovaScores,
    pub phq2_score: Option<u8>,
    pub phq2_triggered_deeper: bool,
    pub cssrs_result: Option<CssrsResult>,
    pub ottawa_score: Option<u8>,
    pub quarterly: QuarterlyScores,
    pub flag: Flag,
    pub agent_escalation: Option<AgentEscalation>,
    pub created_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
}

impl Assessment {
    /// An assessment with every score absent, used as a base for builders and tests.
    pub fn empty(call_id: Uuid, person_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id,
            person_id,
            clova: ClovaScores::default(),
            phq2_score: None,
            phq2_triggered_deeper: false,
            cssrs_result: None,
            ottawa_score: None,
            quarterly: QuarterlyScores::default(),
            flag: Flag::Green,
            agent_escalation: None,
            created_at: now,
            scored_at: None,
        }
    }
}
