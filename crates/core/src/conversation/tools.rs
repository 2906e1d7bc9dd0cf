//! Structured submission tools offered to the language models.
//!
//! Tool inputs are parsed strictly per call type: unknown fields are rejected, every score
//! is range-checked, and quarterly instruments are only accepted on comprehensive calls.

use crate::model::{
    AgentEscalation, Assessment, CallType, ClovaScores, CssrsResult, EscalationTier, Flag,
    QuarterlyScores,
};
use crate::providers::{ToolCall, ToolSpec};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::ops::RangeInclusive;
use uuid::Uuid;

pub const SUBMIT_ASSESSMENT: &str = "submit_assessment";
pub const SUBMIT_CHECKIN_SUMMARY: &str = "submit_checkin_summary";

/// Name of the tool that ends a call of this type.
pub fn submission_tool(call_type: CallType) -> &'static str {
    if call_type.is_screening() {
        SUBMIT_ASSESSMENT
    } else {
        SUBMIT_CHECKIN_SUMMARY
    }
}

fn score(min: u8, max: u8, description: &str) -> Value {
    json!({ "type": "integer", "minimum": min, "maximum": max, "description": description })
}

/// Tool definitions offered for a call type.
pub fn tool_specs(call_type: CallType) -> Vec<ToolSpec> {
    if !call_type.is_screening() {
        return vec![ToolSpec {
            name: SUBMIT_CHECKIN_SUMMARY.into(),
            description: "Call when the check-in conversation is finished.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "concerns_noted": { "type": "boolean" },
                    "concern_detail": { "type": "string" }
                },
                "required": ["summary", "concerns_noted"],
                "additionalProperties": false
            }),
        }];
    }

    let mut properties = json!({
        "meals": score(1, 5, "CLOVA meals, 1 poor to 5 good"),
        "sleep": score(1, 5, "CLOVA sleep"),
        "health": score(1, 5, "CLOVA physical health"),
        "social": score(1, 5, "CLOVA social contact"),
        "mobility": score(1, 5, "CLOVA mobility"),
        "phq2_score": score(0, 6, "PHQ-2 total"),
        "phq2_triggered_deeper": { "type": "boolean" },
        "cssrs_result": {
            "type": "string",
            "enum": ["none", "passive_ideation", "active_ideation", "plan", "intent", "prior_attempt"]
        },
        "ottawa_score": score(0, 4, "Ottawa 3DY correct answers"),
        "flag": { "type": "string", "enum": ["green", "yellow", "red"] },
        "summary": { "type": "string" },
        "escalation_tier": { "type": "string", "enum": ["routine", "urgent", "immediate"] },
        "escalation_reason": { "type": "string" }
    });
    if call_type == CallType::Comprehensive {
        properties["cognitive_battery"] = score(0, 30, "Cognitive battery total");
        properties["fall_risk"] = score(0, 14, "Fall-risk screen total");
        properties["loneliness"] = score(3, 9, "Three-item loneliness scale");
        properties["functional_independence"] = score(0, 6, "Activities of daily living");
    }

    vec![ToolSpec {
        name: SUBMIT_ASSESSMENT.into(),
        description: "Call once every screening question has been asked and the person has said goodbye.".into(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": [
                "meals", "sleep", "health", "social", "mobility", "phq2_score",
                "phq2_triggered_deeper", "cssrs_result", "ottawa_score", "flag", "summary"
            ],
            "additionalProperties": false
        }),
    }]
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreeningInput {
    pub meals: u8,
    pub sleep: u8,
    pub health: u8,
    pub social: u8,
    pub mobility: u8,
    pub phq2_score: u8,
    pub phq2_triggered_deeper: bool,
    pub cssrs_result: CssrsResult,
    pub ottawa_score: u8,
    pub flag: Flag,
    pub summary: String,
    #[serde(default)]
    pub escalation_tier: Option<EscalationTier>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub cognitive_battery: Option<u8>,
    #[serde(default)]
    pub fall_risk: Option<u8>,
    #[serde(default)]
    pub loneliness: Option<u8>,
    #[serde(default)]
    pub functional_independence: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckInInput {
    pub summary: String,
    pub concerns_noted: bool,
    #[serde(default)]
    pub concern_detail: Option<String>,
}

/// A validated submission, keyed by call type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Standard(ScreeningInput),
    Comprehensive(ScreeningInput),
    CheckIn(CheckInInput),
}

impl Submission {
    pub fn summary(&self) -> &str {
        match self {
            Submission::Standard(input) | Submission::Comprehensive(input) => &input.summary,
            Submission::CheckIn(input) => &input.summary,
        }
    }

    /// Build the assessment row; `None` for check-ins, which carry no clinical scores.
    ///
    /// The flag is the agent's own placeholder until the scoring engine overwrites it.
    pub fn to_assessment(&self, call_id: Uuid, person_id: Uuid, now: DateTime<Utc>) -> Option<Assessment> {
        let input = match self {
            Submission::Standard(input) | Submission::Comprehensive(input) => input,
            Submission::CheckIn(_) => return None,
        };
        let agent_escalation = match (input.escalation_tier, &input.escalation_reason) {
            (Some(tier), Some(reason)) => Some(AgentEscalation {
                tier,
                reason: reason.trim().to_string(),
            }),
            _ => None,
        };
        Some(Assessment {
            clova: ClovaScores {
                meals: Some(input.meals),
                sleep: Some(input.sleep),
                health: Some(input.health),
                social: Some(input.social),
                mobility: Some(input.mobility),
            },
            phq2_score: Some(input.phq2_score),
            phq2_triggered_deeper: input.phq2_triggered_deeper,
            cssrs_result: Some(input.cssrs_result),
            ottawa_score: Some(input.ottawa_score),
            quarterly: QuarterlyScores {
                cognitive_battery: input.cognitive_battery,
                fall_risk: input.fall_risk,
                loneliness: input.loneliness,
                functional_independence: input.functional_independence,
            },
            flag: input.flag,
            agent_escalation,
            ..Assessment::empty(call_id, person_id, now)
        })
    }
}

fn parse_strict<T: DeserializeOwned>(input: &Value) -> CoreResult<T> {
    serde_path_to_error::deserialize(input).map_err(|e| {
        let path = e.path().to_string();
        CoreError::InvalidToolInput(format!("{path}: {}", e.into_inner()))
    })
}

fn check(name: &str, value: u8, range: RangeInclusive<u8>) -> CoreResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::InvalidToolInput(format!(
            "{name}: {value} outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

fn check_opt(name: &str, value: Option<u8>, range: RangeInclusive<u8>) -> CoreResult<()> {
    value.map_or(Ok(()), |v| check(name, v, range))
}

fn non_empty(name: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        Err(CoreError::InvalidToolInput(format!("{name}: cannot be empty")))
    } else {
        Ok(())
    }
}

fn validate_screening(input: &ScreeningInput, call_type: CallType) -> CoreResult<()> {
    for (name, value) in [
        ("meals", input.meals),
        ("sleep", input.sleep),
        ("health", input.health),
        ("social", input.social),
        ("mobility", input.mobility),
    ] {
        check(name, value, 1..=5)?;
    }
    check("phq2_score", input.phq2_score, 0..=6)?;
    check("ottawa_score", input.ottawa_score, 0..=4)?;
    non_empty("summary", &input.summary)?;

    match (&input.escalation_tier, &input.escalation_reason) {
        (Some(_), None) => {
            return Err(CoreError::InvalidToolInput(
                "escalation_reason: required with escalation_tier".into(),
            ))
        }
        (_, Some(reason)) => non_empty("escalation_reason", reason)?,
        (None, None) => {}
    }

    let has_quarterly = input.cognitive_battery.is_some()
        || input.fall_risk.is_some()
        || input.loneliness.is_some()
        || input.functional_independence.is_some();
    if has_quarterly && call_type != CallType::Comprehensive {
        return Err(CoreError::InvalidToolInput(
            "quarterly scores are only collected on comprehensive calls".into(),
        ));
    }
    check_opt("cognitive_battery", input.cognitive_battery, 0..=30)?;
    check_opt("fall_risk", input.fall_risk, 0..=14)?;
    check_opt("loneliness", input.loneliness, 3..=9)?;
    check_opt("functional_independence", input.functional_independence, 0..=6)?;
    Ok(())
}

/// Parse and validate a tool invocation for a call of `call_type`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidToolInput`] if the tool is not the one expected for the call
/// type, the input has unknown or mistyped fields, or a value is out of range.
pub fn parse_submission(call_type: CallType, tool: &ToolCall) -> CoreResult<Submission> {
    let expected = submission_tool(call_type);
    if tool.name != expected {
        return Err(CoreError::InvalidToolInput(format!(
            "expected {expected}, got {}",
            tool.name
        )));
    }

    match call_type {
        CallType::Standard | CallType::Comprehensive => {
            let input: ScreeningInput = parse_strict(&tool.input)?;
            validate_screening(&input, call_type)?;
            Ok(if call_type == CallType::Comprehensive {
                Submission::Comprehensive(input)
            } else {
                Submission::Standard(input)
            })
        }
        CallType::CheckIn => {
            let input: CheckInInput = parse_strict(&tool.input)?;
            non_empty("summary", &input.summary)?;
            Ok(Submission::CheckIn(input))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_input() -> Value {
        json!({
            "meals": 4, "sleep": 3, "health": 4, "social": 2, "mobility": 5,
            "phq2_score": 1, "phq2_triggered_deeper": false,
            "cssrs_result": "none", "ottawa_score": 4,
            "flag": "yellow", "summary": "Doing well, a bit isolated."
        })
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            name: name.into(),
            input,
        }
    }

    #[test]
    fn accepts_valid_standard_submission() {
        let submission =
            parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, standard_input()))
                .expect("valid input");
        let Submission::Standard(input) = &submission else {
            panic!("expected standard submission");
        };
        assert_eq!(input.social, 2);

        let assessment = submission
            .to_assessment(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .expect("screening submissions produce an assessment");
        assert_eq!(assessment.flag, Flag::Yellow);
        assert_eq!(assessment.cssrs_result, Some(CssrsResult::None));
        assert_eq!(assessment.scored_at, None);
    }

    #[test]
    fn rejects_unknown_fields_with_path() {
        let mut input = standard_input();
        input["mood"] = json!(3);
        let err = parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input)).unwrap_err();
        assert!(err.to_string().contains("mood"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let mut input = standard_input();
        input["meals"] = json!(0);
        assert!(parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input)).is_err());

        let mut input = standard_input();
        input["phq2_score"] = json!(7);
        assert!(parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input)).is_err());
    }

    #[test]
    fn rejects_negative_numbers_instead_of_coercing() {
        let mut input = standard_input();
        input["ottawa_score"] = json!(-1);
        let err = parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input)).unwrap_err();
        assert!(err.to_string().contains("ottawa_score"), "{err}");
    }

    #[test]
    fn quarterly_scores_only_on_comprehensive_calls() {
        let mut input = standard_input();
        input["loneliness"] = json!(7);
        assert!(parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input.clone())).is_err());

        let submission =
            parse_submission(CallType::Comprehensive, &call(SUBMIT_ASSESSMENT, input)).unwrap();
        let assessment = submission
            .to_assessment(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(assessment.quarterly.loneliness, Some(7));
    }

    #[test]
    fn escalation_tier_requires_reason() {
        let mut input = standard_input();
        input["escalation_tier"] = json!("urgent");
        assert!(parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input.clone())).is_err());

        input["escalation_reason"] = json!("Fell last night");
        let assessment = parse_submission(CallType::Standard, &call(SUBMIT_ASSESSMENT, input))
            .unwrap()
            .to_assessment(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(
            assessment.agent_escalation,
            Some(AgentEscalation {
                tier: EscalationTier::Urgent,
                reason: "Fell last night".into()
            })
        );
    }

    #[test]
    fn check_in_uses_its_own_tool() {
        let input = json!({ "summary": "Called to chat about the weather.", "concerns_noted": false });
        assert!(parse_submission(CallType::CheckIn, &call(SUBMIT_ASSESSMENT, input.clone())).is_err());
        let submission =
            parse_submission(CallType::CheckIn, &call(SUBMIT_CHECKIN_SUMMARY, input)).unwrap();
        assert!(submission.to_assessment(Uuid::new_v4(), Uuid::new_v4(), Utc::now()).is_none());
    }

    #[test]
    fn comprehensive_schema_lists_quarterly_fields() {
        let specs = tool_specs(CallType::Comprehensive);
        assert!(specs[0].input_schema["properties"]["fall_risk"].is_object());
        let specs = tool_specs(CallType::Standard);
        assert!(specs[0].input_schema["properties"]["fall_risk"].is_null());
    }
}
