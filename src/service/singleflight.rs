//! Singleflight Module
//!
//! Per-key gates ensuring at most one in-flight factory call per key.
//! A second caller for the same key awaits the first caller's gate and
//! then re-checks the cache instead of re-invoking the factory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

// == Singleflight ==
/// Registry of per-key async gates.
///
/// Gate entries are pruned once no caller holds them, so the map stays
/// bounded by the number of concurrently missing keys.
#[derive(Debug, Default)]
pub struct Singleflight {
    gates: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Singleflight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gate for a key, creating it on first use.
    pub fn gate(&self, key: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().expect("singleflight lock poisoned");
        gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once the last local holder releases it.
    /// Strong count 2 means only the map and the caller still hold the
    /// gate.
    pub fn release(&self, key: &str, gate: &Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().expect("singleflight lock poisoned");
        if Arc::strong_count(gate) <= 2 {
            gates.remove(key);
        }
    }

    /// Number of keys with an active gate.
    pub fn in_flight(&self) -> usize {
        self.gates
            .lock()
            .map(|gates| gates.len())
            .unwrap_or_default()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_shares_gate() {
        let flight = Singleflight::new();
        let a = flight.gate("k");
        let b = flight.gate("k");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_different_keys_get_distinct_gates() {
        let flight = Singleflight::new();
        let a = flight.gate("k1");
        let b = flight.gate("k2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(flight.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_release_prunes_map() {
        let flight = Singleflight::new();
        let gate = flight.gate("k");
        assert_eq!(flight.in_flight(), 1);

        flight.release("k", &gate);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_release_keeps_gate_while_shared() {
        let flight = Singleflight::new();
        let first = flight.gate("k");
        let second = flight.gate("k");

        // Another caller still holds the gate; entry must survive
        flight.release("k", &first);
        assert_eq!(flight.in_flight(), 1);

        flight.release("k", &second);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_second_caller_waits_for_first() {
        let flight = Arc::new(Singleflight::new());

        let gate = flight.gate("k");
        let guard = gate.lock().await;

        let flight_b = flight.clone();
        let waiter = tokio::spawn(async move {
            let gate = flight_b.gate("k");
            let _guard = gate.lock().await;
        });

        // The waiter cannot finish while the leader holds the gate
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
