// libs/appointment-cell/src/services/workflow.rs
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use directory_cell::Directory;
use shared_models::auth::RequestContext;

use crate::models::{AppointmentStatus, PendingSideEffect, SchedulingError, TransitionOutcome};
use crate::services::outbox::{OutboxRelay, SideEffectOutbox};
use crate::services::records::{compose_record, MedicalRecordSink};
use crate::services::store::AppointmentStore;

/// Forward order of the visit; skipping ahead is allowed.
const VISIT_PROGRESSION: [AppointmentStatus; 5] = [
    AppointmentStatus::Unconfirmed,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Arrived,
    AppointmentStatus::InProgress,
    AppointmentStatus::Completed,
];

/// Appointment lifecycle state machine.
pub struct StatusWorkflow {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn Directory>,
    relay: OutboxRelay,
}

impl StatusWorkflow {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn Directory>,
        outbox: Arc<dyn SideEffectOutbox>,
        sink: Arc<dyn MedicalRecordSink>,
    ) -> Self {
        let relay = OutboxRelay::new(outbox, sink, store.clone());
        Self { store, directory, relay }
    }

    pub fn relay(&self) -> &OutboxRelay {
        &self.relay
    }

    /// Statuses reachable from `status` in one step, excluding itself.
    pub fn allowed_transitions(status: AppointmentStatus) -> Vec<AppointmentStatus> {
        if status.is_terminal() {
            return Vec::new();
        }

        let position = VISIT_PROGRESSION.iter().position(|s| *s == status).unwrap_or(0);
        VISIT_PROGRESSION[position + 1..]
            .iter()
            .copied()
            .chain([AppointmentStatus::Cancelled, AppointmentStatus::NoShow])
            .collect()
    }

    pub fn validate_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), SchedulingError> {
        if from.is_terminal() {
            return Err(SchedulingError::InvalidTransition { from, to });
        }
        if from == to || Self::allowed_transitions(from).contains(&to) {
            return Ok(());
        }
        Err(SchedulingError::InvalidTransition { from, to })
    }

    /// Move an appointment to `new_status`.
    ///
    /// Entering `completed` records a medical-record side effect in the outbox
    /// before the status commit and delivers it afterwards. A delivery failure
    /// leaves the status committed and comes back as a warning.
    pub async fn transition(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<TransitionOutcome, SchedulingError> {
        let current = self.store.get(appointment_id).await?;
        let previous_status = current.status;

        if let Err(err) = Self::validate_transition(previous_status, new_status) {
            warn!(
                "[{}] Rejected transition of appointment {}: {} -> {}",
                ctx.request_id, appointment_id, previous_status, new_status
            );
            return Err(err);
        }

        if previous_status == new_status {
            debug!("[{}] Appointment {} already {}", ctx.request_id, appointment_id, new_status);
            return Ok(TransitionOutcome {
                appointment: current,
                previous_status,
                warnings: Vec::new(),
            });
        }

        let side_effect = if new_status == AppointmentStatus::Completed {
            let doctor = match self.directory.doctors().await {
                Ok(doctors) => doctors.into_iter().find(|d| d.id == current.doctor_id),
                Err(e) => {
                    warn!("Doctor lookup for medical record failed, using a generic title: {}", e);
                    None
                }
            };
            let effect = PendingSideEffect::medical_record(compose_record(&current, doctor.as_ref(), ctx));
            self.relay.outbox().enqueue(effect.clone()).await?;
            Some(effect)
        } else {
            None
        };

        let committed = match self.store.update_status(appointment_id, previous_status, new_status).await {
            Ok(appointment) => appointment,
            Err(err) => {
                if let Some(effect) = &side_effect {
                    if let Err(discard_err) = self.relay.outbox().discard(effect.id).await {
                        error!("Could not discard outbox record {}: {}", effect.id, discard_err);
                    }
                }
                return Err(err);
            }
        };

        info!(
            "[{}] Appointment {} moved {} -> {} by {}",
            ctx.request_id, appointment_id, previous_status, new_status, ctx.actor_id
        );

        let mut warnings = Vec::new();
        if let Some(effect) = side_effect {
            if let Err(err) = self.relay.deliver(ctx, &effect).await {
                warnings.push(err);
            }
        }

        Ok(TransitionOutcome {
            appointment: committed,
            previous_status,
            warnings,
        })
    }
}
