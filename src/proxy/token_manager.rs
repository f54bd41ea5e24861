use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::TokenError;
use crate::modules::oauth::{CachedToken, TokenAcquirer};
use crate::utils::clock::Clock;

/// Observable cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Empty,
    Valid,
    Expired,
    /// An acquisition holds the cache right now
    Refreshing,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Refreshing => "refreshing",
        }
    }
}

#[derive(Default)]
struct Slot {
    token: Option<CachedToken>,
    /// Outcome of the most recent attempt, tagged with its attempt number
    last_failure: Option<(u64, TokenError)>,
}

/// Lazily refreshed bearer token shared by all registry handlers.
///
/// The lock is held across an acquisition, so callers arriving while the cache is
/// empty or expired wait for the in-flight exchange instead of starting their own.
/// Callers that waited on a failed exchange get its error rather than retrying in
/// turn. A failed exchange leaves the previous entry in place.
pub struct TokenManager {
    slot: Mutex<Slot>,
    acquirer: Arc<dyn TokenAcquirer>,
    clock: Arc<dyn Clock>,
    acquisitions: AtomicUsize,
    /// Attempts finished so far; only written under `slot`
    completed: AtomicU64,
}

impl TokenManager {
    pub fn new(acquirer: Arc<dyn TokenAcquirer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            acquirer,
            clock,
            acquisitions: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Return a usable token, acquiring a new one on miss or expiry
    pub async fn get_token(&self) -> Result<String, TokenError> {
        let seen = self.completed.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.token.as_ref() {
            if token.is_valid_at(self.clock.now()) {
                return Ok(token.value.clone());
            }
        }

        // An attempt finished while we were queued and it failed: share its result
        if let Some((attempt, err)) = slot.last_failure.as_ref() {
            if *attempt > seen {
                return Err(err.clone());
            }
        }

        if slot.token.is_some() {
            tracing::info!("Bolagsverket token expired, refreshing...");
        }

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let result = self.acquirer.acquire().await;
        let attempt = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        match result {
            Ok(token) => {
                let value = token.value.clone();
                slot.token = Some(token);
                slot.last_failure = None;
                Ok(value)
            }
            Err(e) => {
                tracing::error!("Error getting Bolagsverket token: {}", e);
                slot.last_failure = Some((attempt, e.clone()));
                Err(e)
            }
        }
    }

    /// Current cache state without waiting on an in-flight acquisition
    pub fn state(&self) -> TokenState {
        let Ok(slot) = self.slot.try_lock() else {
            return TokenState::Refreshing;
        };
        match slot.token.as_ref() {
            None => TokenState::Empty,
            Some(t) if t.is_valid_at(self.clock.now()) => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// Number of acquisition attempts since startup
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Snapshot of the cached entry
    #[cfg(test)]
    pub async fn cached(&self) -> Option<CachedToken> {
        self.slot.lock().await.token.clone()
    }

    /// Drop the cached token so the next caller re-acquires
    #[cfg(test)]
    pub async fn invalidate(&self) {
        self.slot.lock().await.token = None;
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Scripted acquirer: pops results in order, counts calls
    pub struct FakeAcquirer {
        clock: Arc<dyn Clock>,
        script: StdMutex<VecDeque<Result<(String, i64), TokenError>>>,
        delay: Option<std::time::Duration>,
        calls: AtomicUsize,
    }

    impl FakeAcquirer {
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                script: StdMutex::new(VecDeque::new()),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Queue a successful exchange returning `value` with lifetime `expires_in`
        pub fn then_token(self, value: &str, expires_in: i64) -> Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Ok((value.to_string(), expires_in)));
            self
        }

        pub fn then_error(self, err: TokenError) -> Self {
            self.script.lock().unwrap().push_back(Err(err));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenAcquirer for FakeAcquirer {
        async fn acquire(&self) -> Result<CachedToken, TokenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TokenError::Connectivity("script exhausted".into())));
            let (value, expires_in) = next?;
            Ok(CachedToken {
                value,
                expires_at: crate::modules::oauth::expiry_from(self.clock.now(), expires_in),
            })
        }
    }

    pub fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }
}
