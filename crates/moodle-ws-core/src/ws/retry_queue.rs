//! Queue of RPC calls held back by a 429 cooldown.

use moodle_ws_types::{WsError, WsPreSets};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Receives the outcome of a queued call.
pub type Deferred = oneshot::Sender<Result<Value, WsError>>;

/// A call waiting for the cooldown to end.
pub struct RetryEntry {
    pub method: String,
    pub site_url: String,
    pub data: Map<String, Value>,
    pub presets: WsPreSets,
    /// Times this call was already queued.
    pub attempts: u32,
    pub deferred: Deferred,
}

/// FIFO queue plus the single cooldown timer guard.
#[derive(Default)]
pub struct RetryQueue {
    entries: Mutex<VecDeque<RetryEntry>>,
    /// Active cooldown in seconds, 0 when none is running.
    cooldown_secs: AtomicU64,
    draining: AtomicBool,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a call and return the receiver for its outcome.
    pub fn enqueue(
        &self,
        method: &str,
        site_url: &str,
        data: Map<String, Value>,
        presets: WsPreSets,
        attempts: u32,
    ) -> oneshot::Receiver<Result<Value, WsError>> {
        let (deferred, receiver) = oneshot::channel();
        self.entries.lock().push_back(RetryEntry {
            method: method.to_string(),
            site_url: site_url.to_string(),
            data,
            presets,
            attempts,
            deferred,
        });
        receiver
    }

    pub fn pop(&self) -> Option<RetryEntry> {
        self.entries.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Mark a cooldown as running. `false` when one already is.
    pub fn start_cooldown(&self, cooldown: Duration) -> bool {
        let secs = cooldown.as_secs().max(1);
        self.cooldown_secs.compare_exchange(0, secs, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn finish_cooldown(&self) {
        self.cooldown_secs.store(0, Ordering::Release);
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_secs.load(Ordering::Acquire) != 0
    }

    /// Claim the drain loop. `false` when another loop is running.
    pub fn begin_drain(&self) -> bool {
        self.draining.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn end_drain(&self) {
        self.draining.store(false, Ordering::Release);
    }
}

/// Cooldown announced by a `Retry-After` header: its leading digits in
/// seconds, or `default` when absent, zero or unparseable.
pub fn retry_after(header: Option<&str>, default: Duration) -> Duration {
    header
        .map(str::trim)
        .map(|value| value.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presets() -> WsPreSets {
        WsPreSets::new("https://s.example", "token")
    }

    #[test]
    fn test_fifo_order() {
        let queue = RetryQueue::new();
        let _a = queue.enqueue("a", "https://s.example", Map::new(), presets(), 1);
        let _b = queue.enqueue("b", "https://s.example", Map::new(), presets(), 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|entry| entry.method).as_deref(), Some("a"));
        assert_eq!(queue.pop().map(|entry| entry.method).as_deref(), Some("b"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_single_cooldown() {
        let queue = RetryQueue::new();
        assert!(!queue.is_cooling_down());
        assert!(queue.start_cooldown(Duration::from_secs(2)));
        assert!(!queue.start_cooldown(Duration::from_secs(9)));
        assert!(queue.is_cooling_down());
        queue.finish_cooldown();
        assert!(queue.start_cooldown(Duration::from_millis(10)));
    }

    #[test]
    fn test_single_drain_loop() {
        let queue = RetryQueue::new();
        assert!(queue.begin_drain());
        assert!(!queue.begin_drain());
        queue.end_drain();
        assert!(queue.begin_drain());
    }

    #[tokio::test]
    async fn test_deferred_resolves_receiver() {
        let queue = RetryQueue::new();
        let receiver = queue.enqueue("m", "https://s.example", Map::new(), presets(), 1);
        let entry = queue.pop().unwrap();
        entry.deferred.send(Ok(Value::from(5))).unwrap();
        assert_eq!(receiver.await.unwrap().unwrap(), Value::from(5));
    }

    #[test]
    fn test_retry_after_parsing() {
        let default = Duration::from_secs(5);
        assert_eq!(retry_after(Some("2"), default), Duration::from_secs(2));
        assert_eq!(retry_after(Some(" 30s"), default), Duration::from_secs(30));
        assert_eq!(retry_after(Some("0"), default), default);
        assert_eq!(retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT"), default), default);
        assert_eq!(retry_after(None, default), default);
    }
}
