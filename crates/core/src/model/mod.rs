//! Domain records for monitored persons, calls, assessments and escalations.
//!
//! These are plain data carriers. Mutation rules (who may change what, and when) live in
//! the services that own each lifecycle step.

mod assessment;
mod call;
mod escalation;
mod person;

pub use assessment::{AgentEscalation, Assessment, ClovaScores, CssrsResult, QuarterlyScores};
pub use call::{Call, CallPatch, CallSource, CallStatus, CallType};
pub use escalation::{Escalation, EscalationStatus, EscalationTier, Reviewer};
pub use person::{
    AgeBand, Flag, PersonPatch, Person, PersonStatus, ScheduleFrequency, VoiceGender,
    VoicePreference,
};
