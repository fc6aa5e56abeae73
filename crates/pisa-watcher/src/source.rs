use pisa_types::Appointment;

/// Read-only view the watcher uses to learn which appointments are worth
/// watching. Implemented by the appointment store; kept separate so the
/// watcher crate never depends on how appointments are persisted.
pub trait AppointmentSource: Send + Sync {
    fn watched_appointments(&self) -> Vec<Appointment>;
}
