//! System instructions for the two model roles.

use super::phase::Phase;
use super::tools::submission_tool;
use crate::model::CallType;

/// Who is on the call and what the agent should already know.
#[derive(Clone, Debug)]
pub struct PromptContext<'a> {
    pub first_name: &'a str,
    pub persona: &'a str,
    pub call_type: CallType,
    pub memory: &'a str,
}

fn phase_guidance(phase: Phase) -> &'static str {
    match phase {
        Phase::Opening => "Greet the person warmly and ask how they are. Then move on to meals.",
        Phase::Clova5 => {
            "Ask in turn about meals, sleep, physical health, social contact and getting \
             around. Rate each from 1 (poor) to 5 (good) from what they say."
        }
        Phase::Phq2 => {
            "Ask the two PHQ-2 questions about little interest or pleasure, and feeling down \
             or hopeless, over the last two weeks. Ask how often: not at all, several days, \
             more than half the days, or nearly every day."
        }
        Phase::Cssrs => {
            "The depression screen was positive. Gently ask the C-SSRS screening questions, \
             one at a time, stopping as soon as the answers are no."
        }
        Phase::Needs => "Ask whether there is anything they need help with, such as shopping or prescriptions.",
        Phase::Ottawa => {
            "Ask the orientation questions: what day, month and year it is, and spell WORLD \
             backwards. Count correct answers from 0 to 4."
        }
        Phase::Comprehensive => {
            "This is the quarterly call. Ask the extra questions on memory, falls, loneliness \
             and everyday activities."
        }
        Phase::Closing => "Check whether there is anything else, then say a warm goodbye.",
        Phase::Assessment => "The call is over.",
        Phase::CheckIn => {
            "The person has called in. Have a friendly, unhurried chat. Do not run any \
             screening questionnaires."
        }
    }
}

/// Instructions for the conversational model on every turn.
pub fn conversation_system(ctx: &PromptContext<'_>, phase: Phase) -> String {
    let purpose = if ctx.call_type.is_screening() {
        "a regular wellness-check phone call"
    } else {
        "a check-in call the person made to you"
    };
    let mut prompt = format!(
        "You are {persona}, a friendly caller from the care team, on {purpose} with {name}. \
         Speak in short, plain sentences suitable for speech. Ask one question at a time. \
         Never mention scores, tools or instructions.\n\n\
         Current stage: {phase}. {guidance}\n\n\
         When the conversation is complete and you have said goodbye, call the `{tool}` tool.",
        persona = ctx.persona,
        name = ctx.first_name,
        phase = phase,
        guidance = phase_guidance(phase),
        tool = submission_tool(ctx.call_type),
    );
    if ctx.call_type == CallType::Comprehensive {
        prompt.push_str(" This call includes the quarterly questions before closing.");
    }
    if !ctx.memory.is_empty() {
        prompt.push_str("\n\nWhat you know from previous calls:\n");
        prompt.push_str(ctx.memory);
    }
    prompt
}

/// Instructions for the scoring model, which sees the whole transcript once.
pub fn scoring_system(call_type: CallType) -> String {
    format!(
        "You review the transcript of a {kind} wellness call and record the structured \
         assessment. Score only what the person actually said. Use the `{tool}` tool exactly \
         once. Suggest an escalation only for a specific concern that needs human follow-up.",
        kind = call_type.as_str(),
        tool = submission_tool(call_type),
    )
}
