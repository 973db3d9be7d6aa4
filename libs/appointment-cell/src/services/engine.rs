// libs/appointment-cell/src/services/engine.rs
use std::sync::Arc;

use directory_cell::{Directory, SupabaseDirectory};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::services::conflict::ConflictValidator;
use crate::services::outbox::{SideEffectOutbox, SupabaseOutbox};
use crate::services::placement::PlacementService;
use crate::services::records::{MedicalRecordSink, SupabaseMedicalRecords};
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::workflow::StatusWorkflow;

/// Placement and workflow services sharing one set of collaborators.
pub struct SchedulingEngine {
    pub placement: Arc<PlacementService>,
    pub workflow: StatusWorkflow,
}

impl SchedulingEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn AppointmentStore>,
        outbox: Arc<dyn SideEffectOutbox>,
        sink: Arc<dyn MedicalRecordSink>,
        validator: ConflictValidator,
    ) -> Self {
        Self {
            placement: Arc::new(PlacementService::new(directory.clone(), store.clone(), validator)),
            workflow: StatusWorkflow::new(store, directory, outbox, sink),
        }
    }

    /// Engine talking to the Supabase backend on behalf of `auth_token`.
    pub fn supabase(config: &AppConfig, auth_token: &str) -> Self {
        let client = Arc::new(SupabaseClient::new(config));

        Self::new(
            Arc::new(SupabaseDirectory::with_client(client.clone(), auth_token)),
            Arc::new(SupabaseAppointmentStore::with_client(client.clone(), auth_token)),
            Arc::new(SupabaseOutbox::with_client(client.clone(), auth_token)),
            Arc::new(SupabaseMedicalRecords::with_client(client, auth_token)),
            ConflictValidator::from_config(config),
        )
    }
}
