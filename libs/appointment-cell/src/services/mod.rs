pub mod availability;
pub mod calendar;
pub mod conflict;
pub mod drag;
pub mod engine;
pub mod outbox;
pub mod placement;
pub mod records;
pub mod store;
pub mod workflow;

pub use availability::AvailabilityResolver;
pub use calendar::{generate_slots, Resource, TimeSlots, WeeklyCalendar};
pub use conflict::ConflictValidator;
pub use drag::{DragRelocationCoordinator, DragSource, DragState, DropTarget, HoverFeedback};
pub use engine::SchedulingEngine;
pub use outbox::{InMemoryOutbox, OutboxRelay, SideEffectOutbox, SupabaseOutbox};
pub use placement::PlacementService;
pub use records::{compose_record, InMemoryMedicalRecords, MedicalRecordSink, SupabaseMedicalRecords};
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
pub use workflow::StatusWorkflow;
