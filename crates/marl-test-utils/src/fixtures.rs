//! Instrumented valuers for store tests.
//!
//! Three standard fixtures:
//!
//! - [`StepValuer`] — yields the number of shifts seen; idempotent
//!   between shifts, so it exercises history staging without violating
//!   the valuer contract.
//! - [`CountingValuer`] — a constant that counts its invocations, for
//!   asserting exactly when the store calls into a valuer.
//! - [`RecordingValuer`] — records every location it is evaluated at.

use std::cell::RefCell;
use std::rc::Rc;

use marl_core::{Location, StoreError};
use marl_store::{ValueStore, Valuer};

/// Yields the number of shifts seen so far.
///
/// Register with [`ValueStore::add_shared`] to keep a handle for
/// inspecting the step counter mid-test.
#[derive(Default)]
pub struct StepValuer {
    pub step: i64,
}

impl StepValuer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Valuer<i64> for StepValuer {
    fn value(&self, _store: &ValueStore, _loc: &Location) -> Result<i64, StoreError> {
        Ok(self.step)
    }

    fn on_shift(&mut self) {
        self.step += 1;
    }
}

/// A constant value that counts how many times the store invoked it.
pub struct CountingValuer {
    pub value: f64,
    pub calls: Rc<RefCell<u32>>,
}

impl CountingValuer {
    /// A counting constant; the returned handle observes the call count.
    pub fn new(value: f64) -> (Self, Rc<RefCell<u32>>) {
        let calls = Rc::new(RefCell::new(0));
        (
            Self {
                value,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl Valuer<f64> for CountingValuer {
    fn value(&self, _store: &ValueStore, _loc: &Location) -> Result<f64, StoreError> {
        *self.calls.borrow_mut() += 1;
        Ok(self.value)
    }

    fn guarantees(&self) -> &'static [&'static str] {
        &["constant"]
    }
}

/// Records every location it is evaluated at, yielding the element id.
pub struct RecordingValuer {
    pub visited: Rc<RefCell<Vec<Location>>>,
}

impl RecordingValuer {
    /// A recorder; the returned handle observes the visit log.
    pub fn new() -> (Self, Rc<RefCell<Vec<Location>>>) {
        let visited = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                visited: visited.clone(),
            },
            visited,
        )
    }
}

impl Valuer<i64> for RecordingValuer {
    fn value(&self, _store: &ValueStore, loc: &Location) -> Result<i64, StoreError> {
        self.visited.borrow_mut().push(loc.clone());
        Ok(i64::from(loc.element()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_valuer_tracks_shifts() {
        let mut store = ValueStore::new();
        store.add("step", StepValuer::new()).unwrap();
        let loc = Location::new(1, 0, 2);
        assert_eq!(store.get_named::<i64>("step", &loc).unwrap(), 0);
        store.shift();
        store.shift();
        assert_eq!(store.get_named::<i64>("step", &loc).unwrap(), 2);
    }

    #[test]
    fn counting_valuer_reports_invocations() {
        let (valuer, calls) = CountingValuer::new(3.5);
        let mut store = ValueStore::new();
        store.add("c", valuer).unwrap();
        let loc = Location::new(1, 0, 2);
        store.get_named::<f64>("c", &loc).unwrap();
        store.get_named::<f64>("c", &loc).unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn recording_valuer_logs_locations() {
        let (valuer, visited) = RecordingValuer::new();
        let mut store = ValueStore::new();
        store.add("r", valuer).unwrap();
        store
            .get_named::<i64>("r", &Location::new(4, 1, 2))
            .unwrap();
        store
            .get_named::<i64>("r", &Location::new(9, 0, 2))
            .unwrap();
        let log = visited.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].element(), 4);
        assert_eq!(log[1].element(), 9);
    }
}
