use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wellcall_types::{NonEmptyText, PhoneNumber};

/// Risk tier for a person or an assessment.
///
/// Ordering is `Green < Yellow < Red`; scoring only ever raises a flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    #[default]
    Green,
    Yellow,
    Red,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Green => "green",
            Flag::Yellow => "yellow",
            Flag::Red => "red",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonStatus {
    #[default]
    Active,
    Paused,
    Discharged,
}

/// How often a person should receive a screening call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleFrequency {
    TwiceWeekly,
    Weekly,
    Biweekly,
}

impl ScheduleFrequency {
    pub fn interval(&self) -> Duration {
        match self {
            ScheduleFrequency::TwiceWeekly => Duration::days(3),
            ScheduleFrequency::Weekly => Duration::days(7),
            ScheduleFrequency::Biweekly => Duration::days(14),
        }
    }

    /// A person is due when never called, or when at least one interval has elapsed.
    pub fn is_due(&self, last_call_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_call_at {
            None => true,
            Some(last) => now - last >= self.interval(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Female,
    Male,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBand {
    Young,
    Middle,
    Older,
}

/// Optional preferences used to choose the synthesized voice for a person.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoicePreference {
    #[serde(default)]
    pub gender: Option<VoiceGender>,
    #[serde(default)]
    pub age: Option<AgeBand>,
    #[serde(default)]
    pub accent: Option<String>,
}

/// A monitored individual enrolled for wellness-check calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    /// Care-coordinator account that owns this person.
    pub coordinator_id: Uuid,
    pub name: NonEmptyText,
    pub phone: PhoneNumber,
    pub status: PersonStatus,
    pub schedule: ScheduleFrequency,
    pub flag: Flag,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_contact_at: Option<DateTime<Utc>>,
    /// Completed screening calls.
    pub call_count: u32,
    pub care_notes: Option<String>,
    /// BCP-47 language tag used for speech synthesis and recognition.
    pub language: String,
    pub voice: VoicePreference,
}

impl Person {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PersonStatus::Active && self.schedule.is_due(self.last_call_at, now)
    }
}

/// Targeted update for a [`Person`]; `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonPatch {
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub flag: Option<Flag>,
    pub increment_call_count: bool,
}

impl PersonPatch {
    pub fn apply(&self, person: &mut Person) {
        if let Some(at) = self.last_call_at {
            person.last_call_at = Some(at);
        }
        if let Some(at) = self.last_contact_at {
            person.last_contact_at = Some(at);
        }
        if let Some(flag) = self.flag {
            person.flag = flag;
        }
        if self.increment_call_count {
            person.call_count = person.call_count.saturating_add(1);
        }
    }
}
