//! Listener registries for [`MotionValue`](super::MotionValue).

use super::{ValueEvent, WeakMotionValue};
use crate::types::AnimatableValue;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A value listener.
pub type Listener = Rc<dyn Fn(&AnimatableValue)>;

/// Listeners keyed by event, in subscription order.
///
/// Notification walks a snapshot of the list: listeners added during a
/// notify wait for the next one, listeners removed during a notify are
/// skipped.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    listeners: RefCell<HashMap<ValueEvent, Vec<(u64, Listener)>>>,
    next_id: Cell<u64>,
}

impl SubscriberRegistry {
    pub fn add(&self, event: ValueEvent, listener: Listener) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners
            .borrow_mut()
            .entry(event)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&self, event: ValueEvent, id: u64) {
        if let Some(list) = self.listeners.borrow_mut().get_mut(&event) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    pub fn len(&self, event: ValueEvent) -> usize {
        self.listeners.borrow().get(&event).map_or(0, Vec::len)
    }

    fn contains(&self, event: ValueEvent, id: u64) -> bool {
        self.listeners
            .borrow()
            .get(&event)
            .is_some_and(|list| list.iter().any(|(existing, _)| *existing == id))
    }

    pub fn notify(&self, event: ValueEvent, value: &AnimatableValue) {
        let snapshot = match self.listeners.borrow().get(&event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return,
        };
        for (id, listener) in snapshot {
            if self.contains(event, id) {
                listener(value);
            }
        }
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

/// Handle returned by [`MotionValue::on`](super::MotionValue::on).
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    value: WeakMotionValue,
    event: ValueEvent,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(value: WeakMotionValue, event: ValueEvent, id: u64) -> Self {
        Self { value, event, id }
    }

    /// Remove the listener. Removing the last `change` listener stops an
    /// animation nobody is observing on the next read phase.
    pub fn unsubscribe(self) {
        if let Some(value) = self.value.upgrade() {
            value.remove_listener(self.event, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}
