//! Startup seed file for persons and reviewers.
//!
//! Enrolment and reviewer management belong to the administrative dashboard; a single
//! process deployment loads its roster from a YAML file instead. Parsing is strict:
//! unknown keys are rejected and the failing field path is reported.

use crate::model::{Flag, Person, PersonStatus, Reviewer, ScheduleFrequency, VoicePreference};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;
use wellcall_types::{NonEmptyText, PhoneNumber};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedWire {
    #[serde(default)]
    persons: Vec<PersonWire>,
    #[serde(default)]
    reviewers: Vec<Reviewer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonWire {
    id: Uuid,
    coordinator_id: Uuid,
    name: NonEmptyText,
    phone: PhoneNumber,
    #[serde(default)]
    status: PersonStatus,
    schedule: ScheduleFrequency,
    #[serde(default)]
    flag: Flag,
    #[serde(default)]
    last_call_at: Option<DateTime<Utc>>,
    #[serde(default)]
    call_count: u32,
    #[serde(default)]
    care_notes: Option<String>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    voice: VoicePreference,
}

fn default_language() -> String {
    "en-GB".into()
}

/// Parsed contents of a seed file.
#[derive(Debug)]
pub struct Seed {
    pub persons: Vec<Person>,
    pub reviewers: Vec<Reviewer>,
}

/// Parse seed YAML text.
///
/// # Errors
///
/// Returns [`CoreError::SeedParse`] naming the failing path (e.g. `persons[1].phone`) when
/// the text does not match the schema, or when two persons share an id or phone number.
pub fn parse_seed(yaml_text: &str) -> CoreResult<Seed> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    let wire: SeedWire = serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        CoreError::SeedParse(format!("at {path}: {}", err.into_inner()))
    })?;

    let mut persons: Vec<Person> = Vec::with_capacity(wire.persons.len());
    for p in wire.persons {
        if persons.iter().any(|existing| existing.id == p.id) {
            return Err(CoreError::SeedParse(format!("duplicate person id {}", p.id)));
        }
        if persons.iter().any(|existing| existing.phone == p.phone) {
            return Err(CoreError::SeedParse(format!(
                "duplicate phone number {}",
                p.phone
            )));
        }
        persons.push(Person {
            id: p.id,
            coordinator_id: p.coordinator_id,
            name: p.name,
            phone: p.phone,
            status: p.status,
            schedule: p.schedule,
            flag: p.flag,
            last_call_at: p.last_call_at,
            last_contact_at: None,
            call_count: p.call_count,
            care_notes: p.care_notes.filter(|n| !n.trim().is_empty()),
            language: p.language,
            voice: p.voice,
        });
    }

    Ok(Seed {
        persons,
        reviewers: wire.reviewers,
    })
}

/// Read and parse a seed file from disk.
pub fn load_seed(path: &Path) -> CoreResult<Seed> {
    let text = std::fs::read_to_string(path).map_err(CoreError::SeedRead)?;
    parse_seed(&text)
}
