//! Escalation service: persists escalations and notifies reviewers.

use crate::model::{Escalation, EscalationTier};
use crate::providers::{Email, Mailer};
use crate::store::Store;
use crate::CoreResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What to escalate and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEscalation {
    pub person_id: Uuid,
    pub call_id: Option<Uuid>,
    pub tier: EscalationTier,
    pub reason: String,
    pub details: Option<String>,
}

pub struct EscalationService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
}

impl EscalationService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Persist a `pending` escalation and, for urgent or immediate tiers, email every
    /// reviewer before returning.
    ///
    /// Notification failures are logged and never undo the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the escalation cannot be stored.
    pub async fn create(&self, new: NewEscalation, now: DateTime<Utc>) -> CoreResult<Escalation> {
        let escalation = Escalation::pending(
            new.person_id,
            new.call_id,
            new.tier,
            new.reason,
            new.details,
            now,
        );
        self.store.insert_escalation(&escalation).await?;

        info!(
            escalation_id = %escalation.id,
            person_id = %escalation.person_id,
            tier = %escalation.tier,
            reason = %escalation.reason,
            "escalation created"
        );

        if escalation.tier == EscalationTier::Immediate {
            error!(
                target: "wellcall::immediate",
                escalation_id = %escalation.id,
                person_id = %escalation.person_id,
                reason = %escalation.reason,
                "IMMEDIATE escalation requires same-day action"
            );
        }

        if escalation.tier.notifies_reviewers() {
            self.notify_reviewers(&escalation).await;
        }

        Ok(escalation)
    }

    async fn notify_reviewers(&self, escalation: &Escalation) {
        let reviewers = match self.store.reviewers().await {
            Ok(reviewers) => reviewers,
            Err(e) => {
                warn!(escalation_id = %escalation.id, "could not load reviewers: {e}");
                return;
            }
        };
        if reviewers.is_empty() {
            warn!(escalation_id = %escalation.id, "no reviewers registered to notify");
            return;
        }

        let subject = format!(
            "[{}] Wellness call escalation: {}",
            escalation.tier.as_str().to_uppercase(),
            escalation.reason
        );
        let text = render_body(escalation);

        for reviewer in reviewers {
            let email = Email {
                to: reviewer.email.clone(),
                subject: subject.clone(),
                text: text.clone(),
            };
            if let Err(e) = self.mailer.send(email).await {
                warn!(
                    escalation_id = %escalation.id,
                    reviewer = %reviewer.email,
                    "escalation notice not delivered: {e}"
                );
            }
        }
    }
}

fn render_body(escalation: &Escalation) -> String {
    let mut body = format!(
        "Tier: {}\nReason: {}\nPerson: {}\n",
        escalation.tier, escalation.reason, escalation.person_id
    );
    if let Some(call_id) = escalation.call_id {
        body.push_str(&format!("Call: {call_id}\n"));
    }
    if let Some(details) = &escalation.details {
        body.push_str(&format!("\n{details}\n"));
    }
    body.push_str(&format!("\nRaised at {}\n", escalation.created_at.to_rfc3339()));
    body
}
