// libs/appointment-cell/src/services/outbox.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::RequestContext;

use crate::models::{AppointmentStatus, DrainReport, PendingSideEffect, SchedulingError, SideEffectStatus};
use crate::services::records::MedicalRecordSink;
use crate::services::store::AppointmentStore;

/// Durable record of side effects owed after a status commit.
#[async_trait]
pub trait SideEffectOutbox: Send + Sync {
    async fn enqueue(&self, effect: PendingSideEffect) -> Result<(), SchedulingError>;

    /// Drop a record whose triggering commit never happened.
    async fn discard(&self, id: Uuid) -> Result<(), SchedulingError>;

    async fn mark_delivered(&self, id: Uuid) -> Result<(), SchedulingError>;

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), SchedulingError>;

    /// Pending records, oldest first.
    async fn pending(&self) -> Result<Vec<PendingSideEffect>, SchedulingError>;
}

// ==============================================================================
// IN-MEMORY OUTBOX
// ==============================================================================

#[derive(Default)]
pub struct InMemoryOutbox {
    records: Mutex<Vec<PendingSideEffect>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PendingSideEffect> {
        self.records.lock().await.clone()
    }

    async fn update<F>(&self, id: Uuid, change: F) -> Result<(), SchedulingError>
    where
        F: FnOnce(&mut PendingSideEffect) + Send,
    {
        let mut records = self.records.lock().await;
        let record = records.iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SchedulingError::store(format!("Outbox record {} not found", id)))?;
        change(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SideEffectOutbox for InMemoryOutbox {
    async fn enqueue(&self, effect: PendingSideEffect) -> Result<(), SchedulingError> {
        self.records.lock().await.push(effect);
        Ok(())
    }

    async fn discard(&self, id: Uuid) -> Result<(), SchedulingError> {
        self.records.lock().await.retain(|r| r.id != id);
        Ok(())
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), SchedulingError> {
        self.update(id, |r| {
            r.status = SideEffectStatus::Delivered;
            r.last_error = None;
        }).await
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), SchedulingError> {
        let error = error.to_string();
        self.update(id, move |r| {
            r.attempts += 1;
            r.last_error = Some(error);
        }).await
    }

    async fn pending(&self) -> Result<Vec<PendingSideEffect>, SchedulingError> {
        let mut pending: Vec<PendingSideEffect> = self.records.lock().await
            .iter()
            .filter(|r| r.status == SideEffectStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }
}

// ==============================================================================
// SUPABASE-BACKED OUTBOX
// ==============================================================================

pub struct SupabaseOutbox {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseOutbox {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<PendingSideEffect>, SchedulingError> {
        let rows: Value = self.supabase
            .request_with_headers(
                method,
                path,
                Some(&self.auth_token),
                body,
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::store(e.to_string()))?;

        match rows {
            Value::Null => Ok(Vec::new()),
            rows => serde_json::from_value(rows)
                .map_err(|e| SchedulingError::store(format!("Failed to parse outbox record: {}", e))),
        }
    }

    fn record_path(id: Uuid) -> String {
        format!("/rest/v1/side_effect_outbox?id=eq.{}", id)
    }
}

#[async_trait]
impl SideEffectOutbox for SupabaseOutbox {
    async fn enqueue(&self, effect: PendingSideEffect) -> Result<(), SchedulingError> {
        let body = serde_json::to_value(&effect).map_err(|e| SchedulingError::store(e.to_string()))?;
        self.call(Method::POST, "/rest/v1/side_effect_outbox", Some(body)).await?;
        debug!("Outbox record {} enqueued for appointment {}", effect.id, effect.appointment_id);
        Ok(())
    }

    async fn discard(&self, id: Uuid) -> Result<(), SchedulingError> {
        self.call(Method::DELETE, &Self::record_path(id), None).await?;
        Ok(())
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), SchedulingError> {
        let body = json!({
            "status": SideEffectStatus::Delivered,
            "last_error": null,
            "updated_at": Utc::now().to_rfc3339(),
        });
        self.call(Method::PATCH, &Self::record_path(id), Some(body)).await?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), SchedulingError> {
        let current = self.call(Method::GET, &Self::record_path(id), None).await?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::store(format!("Outbox record {} not found", id)))?;

        let body = json!({
            "attempts": current.attempts + 1,
            "last_error": error,
            "updated_at": Utc::now().to_rfc3339(),
        });
        self.call(Method::PATCH, &Self::record_path(id), Some(body)).await?;
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingSideEffect>, SchedulingError> {
        self.call(
            Method::GET,
            "/rest/v1/side_effect_outbox?status=eq.pending&order=created_at.asc",
            None,
        ).await
    }
}

// ==============================================================================
// RELAY
// ==============================================================================

/// Delivers outbox records to the Medical Records collaborator.
pub struct OutboxRelay {
    outbox: Arc<dyn SideEffectOutbox>,
    sink: Arc<dyn MedicalRecordSink>,
    store: Arc<dyn AppointmentStore>,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn SideEffectOutbox>,
        sink: Arc<dyn MedicalRecordSink>,
        store: Arc<dyn AppointmentStore>,
    ) -> Self {
        Self { outbox, sink, store }
    }

    pub fn outbox(&self) -> &Arc<dyn SideEffectOutbox> {
        &self.outbox
    }

    /// One delivery attempt; a failure stays pending with its error recorded.
    pub async fn deliver(&self, ctx: &RequestContext, effect: &PendingSideEffect) -> Result<(), SchedulingError> {
        match self.sink.create(ctx, &effect.payload).await {
            Ok(()) => {
                self.outbox.mark_delivered(effect.id).await?;
                info!("Side effect {} delivered for appointment {}", effect.id, effect.appointment_id);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!("Side effect {} for appointment {} failed: {}", effect.id, effect.appointment_id, message);
                if let Err(record_err) = self.outbox.record_failure(effect.id, &message).await {
                    error!("Could not record failure of side effect {}: {}", effect.id, record_err);
                }
                Err(match err {
                    SchedulingError::SideEffectFailed { .. } => err,
                    other => SchedulingError::SideEffectFailed { message: other.to_string() },
                })
            }
        }
    }

    /// Retry every pending record whose appointment is still completed.
    pub async fn drain(&self, ctx: &RequestContext) -> Result<DrainReport, SchedulingError> {
        let pending = self.outbox.pending().await?;
        debug!("[{}] Draining {} pending side effects", ctx.request_id, pending.len());

        let mut report = DrainReport::default();
        for effect in pending {
            let still_completed = match self.store.get(effect.appointment_id).await {
                Ok(appointment) => appointment.status == AppointmentStatus::Completed,
                Err(SchedulingError::AppointmentNotFound { .. }) => false,
                Err(e) => return Err(e),
            };

            if !still_completed {
                warn!("Discarding side effect {}: appointment {} is not completed", effect.id, effect.appointment_id);
                self.outbox.discard(effect.id).await?;
                report.discarded += 1;
                continue;
            }

            match self.deliver(ctx, &effect).await {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            "Outbox drain finished: {} delivered, {} failed, {} discarded",
            report.delivered, report.failed, report.discarded
        );
        Ok(report)
    }
}
