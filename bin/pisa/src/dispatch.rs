//! Thin [`pisa_machine::ActionDispatcher`] adapters over `Arc`-shared
//! components that also serve as trait objects elsewhere in the
//! composition root (`TrackedSource`, `AppointmentSource`,
//! `AppointmentLookup`). `ActionDispatcher::handle` takes `&mut self`, which
//! would force exclusive ownership; these newtypes let the same `Arc`
//! instance be registered as a dispatcher too, by forwarding to the
//! underlying type's `&self` `dispatch` method.

use pisa_appointments::AppointmentStore;
use pisa_machine::{ActionDispatcher, DispatchError, Outcome};
use pisa_responder::MultiResponder;
use pisa_types::Action;
use std::sync::Arc;

pub struct MultiResponderDispatcher(Arc<MultiResponder>);

impl MultiResponderDispatcher {
    pub fn new(inner: Arc<MultiResponder>) -> Self {
        MultiResponderDispatcher(inner)
    }
}

impl ActionDispatcher for MultiResponderDispatcher {
    fn handle(&mut self, action: &Action) -> Result<Outcome, DispatchError> {
        self.0.dispatch(action)
    }
}

pub struct AppointmentStoreDispatcher(Arc<AppointmentStore>);

impl AppointmentStoreDispatcher {
    pub fn new(inner: Arc<AppointmentStore>) -> Self {
        AppointmentStoreDispatcher(inner)
    }
}

impl ActionDispatcher for AppointmentStoreDispatcher {
    fn handle(&mut self, action: &Action) -> Result<Outcome, DispatchError> {
        self.0.dispatch(action)
    }
}
