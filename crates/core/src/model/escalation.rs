use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Urgency of an escalation: routine (next visit), urgent (24-48h), immediate (same day).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationTier {
    Routine,
    Urgent,
    Immediate,
}

impl EscalationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationTier::Routine => "routine",
            EscalationTier::Urgent => "urgent",
            EscalationTier::Immediate => "immediate",
        }
    }

    /// Tiers that notify reviewers as soon as the record is created.
    pub fn notifies_reviewers(&self) -> bool {
        matches!(self, EscalationTier::Urgent | EscalationTier::Immediate)
    }
}

impl std::fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationStatus {
    Pending,
    Acknowledged,
    Resolved,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Pending => "pending",
            EscalationStatus::Acknowledged => "acknowledged",
            EscalationStatus::Resolved => "resolved",
        }
    }
}

/// An action item for human reviewers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: Uuid,
    pub person_id: Uuid,
    pub call_id: Option<Uuid>,
    pub tier: EscalationTier,
    pub reason: String,
    pub details: Option<String>,
    pub status: EscalationStatus,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Escalation {
    pub fn pending(
        person_id: Uuid,
        call_id: Option<Uuid>,
        tier: EscalationTier,
        reason: impl Into<String>,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id,
            call_id,
            tier,
            reason: reason.into(),
            details,
            status: EscalationStatus::Pending,
            resolved_by: None,
            created_at: now,
            acknowledged_at: None,
            resolved_at: None,
        }
    }

    /// Move `pending` to `acknowledged`.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        if self.status != EscalationStatus::Pending {
            return Err(CoreError::InvalidEscalationTransition {
                from: self.status.as_str(),
                to: EscalationStatus::Acknowledged.as_str(),
            });
        }
        self.status = EscalationStatus::Acknowledged;
        self.acknowledged_at = Some(at);
        Ok(())
    }

    /// Move `acknowledged` to `resolved`, recording who resolved it.
    pub fn resolve(&mut self, by: impl Into<String>, at: DateTime<Utc>) -> CoreResult<()> {
        if self.status != EscalationStatus::Acknowledged {
            return Err(CoreError::InvalidEscalationTransition {
                from: self.status.as_str(),
                to: EscalationStatus::Resolved.as_str(),
            });
        }
        self.status = EscalationStatus::Resolved;
        self.resolved_by = Some(by.into());
        self.resolved_at = Some(at);
        Ok(())
    }
}

/// A reviewer account that receives urgent and immediate escalation notices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reviewer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Escalation {
        Escalation::pending(
            Uuid::new_v4(),
            None,
            EscalationTier::Routine,
            "Unreachable",
            None,
            Utc::now(),
        )
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut escalation = sample();
        escalation.acknowledge(Utc::now()).unwrap();
        escalation.resolve("nurse.lee", Utc::now()).unwrap();
        assert_eq!(escalation.status, EscalationStatus::Resolved);
        assert_eq!(escalation.resolved_by.as_deref(), Some("nurse.lee"));
    }

    #[test]
    fn cannot_resolve_without_acknowledging() {
        let mut escalation = sample();
        let err = escalation.resolve("nurse.lee", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidEscalationTransition {
                from: "pending",
                to: "resolved"
            }
        ));
    }

    #[test]
    fn only_urgent_and_immediate_notify() {
        assert!(!EscalationTier::Routine.notifies_reviewers());
        assert!(EscalationTier::Urgent.notifies_reviewers());
        assert!(EscalationTier::Immediate.notifies_reviewers());
    }
}
