//! Control plane shared by the controller, the producer and the consumer
//!
//! Writers per field:
//! - play gate: controller (`open_gate` / `close_gate`)
//! - running flag: controller
//! - skip flag: controller sets it, consumer clears it
//! - current master title: consumer
//! - producer state: producer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError, RwLock};
use tracing::trace;

use crate::mix::ProducerState;

#[derive(Debug, Default)]
pub struct ControlPlane {
    gate: Mutex<bool>,
    gate_changed: Condvar,
    running: AtomicBool,
    skip: AtomicBool,
    current_master: RwLock<String>,
    producer_state: RwLock<ProducerState>,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the consumer play.
    pub fn open_gate(&self) {
        let mut open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *open = true;
        self.gate_changed.notify_all();
    }

    /// Pause the consumer at its next frame boundary.
    pub fn close_gate(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_gate_open(&self) -> bool {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the gate is open.
    pub fn wait_for_gate(&self) {
        let mut open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        while !*open {
            trace!("Play gate closed, waiting");
            open = self
                .gate_changed
                .wait(open)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    pub fn clear_skip(&self) {
        self.skip.store(false, Ordering::SeqCst);
    }

    pub fn is_skip_requested(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }

    /// Consume a pending skip request.
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    pub fn set_current_master(&self, title: &str) {
        let mut current = self
            .current_master
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        current.clear();
        current.push_str(title);
    }

    pub fn current_master(&self) -> String {
        self.current_master
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_producer_state(&self, state: ProducerState) {
        trace!("Producer state: {:?}", state);
        *self
            .producer_state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Lifecycle state of the most recently started producer
    pub fn producer_state(&self) -> ProducerState {
        *self
            .producer_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_gate_blocks_until_opened() {
        let control = Arc::new(ControlPlane::new());
        let waiter = {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                control.wait_for_gate();
                true
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        control.open_gate();
        assert!(waiter.join().unwrap());
        assert!(control.is_gate_open());
    }

    #[test]
    fn test_take_skip_clears_flag() {
        let control = ControlPlane::new();
        assert!(!control.take_skip());

        control.request_skip();
        assert!(control.is_skip_requested());
        assert!(control.take_skip());
        assert!(!control.is_skip_requested());
    }

    #[test]
    fn test_current_master_round_trip() {
        let control = ControlPlane::new();
        assert_eq!(control.current_master(), "");

        control.set_current_master("Halcyon");
        assert_eq!(control.current_master(), "Halcyon");
    }
}
