//! Live value sources observed by a recorder

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::series::{Value, ValueKind};

/// A live value, typically a sensor reading or actuator setpoint
pub trait ValueSource: Send + Sync {
    fn value_kind(&self) -> ValueKind;

    fn current_value(&self) -> Value;

    /// Inactive sources are skipped by interval ticks
    fn is_active(&self) -> bool;
}

/// In-memory value source of a fixed kind
#[derive(Debug)]
pub struct LiveValue {
    kind: ValueKind,
    value: RwLock<Value>,
    active: AtomicBool,
}

impl LiveValue {
    pub fn new(initial: Value) -> Self {
        Self {
            kind: initial.kind(),
            value: RwLock::new(initial),
            active: AtomicBool::new(true),
        }
    }

    /// Replace the value. Values of another kind are refused.
    pub fn set(&self, value: Value) -> bool {
        if value.kind() != self.kind {
            return false;
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        true
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ValueSource for LiveValue {
    fn value_kind(&self) -> ValueKind {
        self.kind
    }

    fn current_value(&self) -> Value {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
