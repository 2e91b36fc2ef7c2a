//! Engine handle shared between threads
//!
//! Every transition runs under one lock, so submissions are serialized and
//! each one sees the state left by the previous one.

use crate::engine::Engine;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let mut engine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut engine)
    }
}
