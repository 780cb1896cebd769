//! Scriptable key-value backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::cache::{InMemoryBackend, KeyValueBackend};
use crate::errors::BackendError;

/// A backend call as observed by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `GET key`
    Get(String),
    /// `SETEX key ttl value`
    SetEx(String, String),
}

/// Backend that stores into an [`InMemoryBackend`] but can be told to fail
/// or hang.
///
/// Faults are counted across all attempts, retries included.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    inner: InMemoryBackend,
    fail_first: u32,
    fail_sets_from: Option<u32>,
    fail_gets_from: Option<u32>,
    hang: bool,
    calls: AtomicU32,
    set_calls: AtomicU32,
    get_calls: AtomicU32,
    log: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    /// Creates a backend that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `n` calls, of any kind, then succeeds.
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Fails every `SETEX` from the `n`th one (1-based) onward.
    #[must_use]
    pub fn failing_sets_from(mut self, n: u32) -> Self {
        self.fail_sets_from = Some(n);
        self
    }

    /// Fails every `GET` from the `n`th one (1-based) onward.
    #[must_use]
    pub fn failing_gets_from(mut self, n: u32) -> Self {
        self.fail_gets_from = Some(n);
        self
    }

    /// Never completes any call.
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Returns the backing store.
    #[must_use]
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Returns the number of calls received.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the number of `SETEX` calls received.
    #[must_use]
    pub fn set_calls(&self) -> u32 {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Returns every call received, in order.
    #[must_use]
    pub fn call_log(&self) -> Vec<BackendCall> {
        self.log.lock().clone()
    }

    /// Records a call and decides whether it should fail.
    async fn admit(&self, call: BackendCall) -> Result<(), BackendError> {
        let ordinal = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let (set_ordinal, get_ordinal) = match call {
            BackendCall::SetEx(..) => (Some(self.set_calls.fetch_add(1, Ordering::SeqCst) + 1), None),
            BackendCall::Get(_) => (None, Some(self.get_calls.fetch_add(1, Ordering::SeqCst) + 1)),
        };
        self.log.lock().push(call);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if ordinal <= self.fail_first {
            return Err(BackendError::Unavailable(format!("injected failure #{ordinal}")));
        }
        if let (Some(from), Some(n)) = (self.fail_sets_from, set_ordinal) {
            if n >= from {
                return Err(BackendError::Command(format!("injected SETEX failure #{n}")));
            }
        }
        if let (Some(from), Some(n)) = (self.fail_gets_from, get_ordinal) {
            if n >= from {
                return Err(BackendError::Connection(format!("injected GET failure #{n}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for ScriptedBackend {
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BackendError> {
        self.admit(BackendCall::SetEx(key.to_string(), value.to_string()))
            .await?;
        self.inner.setex(key, ttl_seconds, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.admit(BackendCall::Get(key.to_string())).await?;
        self.inner.get(key).await
    }
}
