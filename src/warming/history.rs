//! Access History Module
//!
//! Bounded per-(user, key) access records feeding predictive and
//! popularity ranking.

use std::collections::{HashMap, VecDeque};

use crate::store::current_timestamp_ms;

/// Samples kept per (user, key); oldest pruned beyond this.
pub const MAX_SAMPLES_PER_KEY: usize = 64;

/// Half-life of the recency weight, in milliseconds.
const RECENCY_HALF_LIFE_MS: f64 = 10.0 * 60.0 * 1000.0;

const RECENCY_WEIGHT: f64 = 0.6;
const FREQUENCY_WEIGHT: f64 = 0.4;

// == Access History ==
/// Records accesses and ranks candidate keys for warming.
#[derive(Debug, Default)]
pub struct AccessHistory {
    /// (user, key) -> access timestamps, newest at the back
    samples: HashMap<(Option<String>, String), VecDeque<u64>>,
    /// key -> total access count across all users
    global_counts: HashMap<String, u64>,
}

impl AccessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // == Record ==
    /// Appends an access timestamp; history per key is bounded.
    pub fn record(&mut self, user: Option<&str>, key: &str) {
        let samples = self
            .samples
            .entry((user.map(String::from), key.to_string()))
            .or_default();
        samples.push_back(current_timestamp_ms());
        while samples.len() > MAX_SAMPLES_PER_KEY {
            samples.pop_front();
        }

        *self.global_counts.entry(key.to_string()).or_default() += 1;
    }

    // == Rank For User ==
    /// Candidate keys for a user, best first, weighted by recency and
    /// frequency.
    pub fn rank_for_user(&self, user: Option<&str>, limit: usize) -> Vec<String> {
        let now = current_timestamp_ms();

        let mut scored: Vec<(String, f64)> = self
            .samples
            .iter()
            .filter(|((sample_user, _), _)| sample_user.as_deref() == user)
            .map(|((_, key), samples)| (key.clone(), score(samples, now)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(limit).map(|(key, _)| key).collect()
    }

    // == Rank Popular ==
    /// Top keys by global access count, independent of user. Ties are
    /// broken by key for determinism.
    pub fn rank_popular(&self, limit: usize) -> Vec<String> {
        let mut counted: Vec<(&String, &u64)> = self.global_counts.iter().collect();
        counted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        counted
            .into_iter()
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Total access count recorded for a key.
    pub fn count_for(&self, key: &str) -> u64 {
        self.global_counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys seen.
    pub fn tracked_keys(&self) -> usize {
        self.global_counts.len()
    }
}

/// Weighted recency + frequency score for one key's samples.
fn score(samples: &VecDeque<u64>, now: u64) -> f64 {
    let frequency = samples.len() as f64 / MAX_SAMPLES_PER_KEY as f64;
    let recency = samples
        .back()
        .map(|last| {
            let age_ms = now.saturating_sub(*last) as f64;
            0.5f64.powf(age_ms / RECENCY_HALF_LIFE_MS)
        })
        .unwrap_or(0.0);

    RECENCY_WEIGHT * recency + FREQUENCY_WEIGHT * frequency
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut history = AccessHistory::new();

        history.record(Some("u1"), "quiz:1");
        history.record(Some("u1"), "quiz:1");
        history.record(None, "quiz:1");

        assert_eq!(history.count_for("quiz:1"), 3);
        assert_eq!(history.tracked_keys(), 1);
    }

    #[test]
    fn test_samples_are_bounded() {
        let mut history = AccessHistory::new();

        for _ in 0..(MAX_SAMPLES_PER_KEY + 20) {
            history.record(Some("u1"), "quiz:1");
        }

        let samples = history
            .samples
            .get(&(Some("u1".to_string()), "quiz:1".to_string()))
            .unwrap();
        assert_eq!(samples.len(), MAX_SAMPLES_PER_KEY);
    }

    #[test]
    fn test_rank_for_user_prefers_frequent() {
        let mut history = AccessHistory::new();

        for _ in 0..10 {
            history.record(Some("u1"), "quiz:hot");
        }
        history.record(Some("u1"), "quiz:cold");
        history.record(Some("u2"), "quiz:other-user");

        let ranked = history.rank_for_user(Some("u1"), 10);
        assert_eq!(ranked.first().map(String::as_str), Some("quiz:hot"));
        assert!(!ranked.contains(&"quiz:other-user".to_string()));
    }

    #[test]
    fn test_rank_for_user_respects_limit() {
        let mut history = AccessHistory::new();
        for i in 0..10 {
            history.record(Some("u1"), &format!("key:{}", i));
        }

        assert_eq!(history.rank_for_user(Some("u1"), 3).len(), 3);
    }

    #[test]
    fn test_rank_popular_orders_by_count() {
        let mut history = AccessHistory::new();

        for _ in 0..5 {
            history.record(None, "a");
        }
        for _ in 0..3 {
            history.record(None, "b");
        }
        history.record(None, "c");

        assert_eq!(history.rank_popular(2), vec!["a", "b"]);
    }

    #[test]
    fn test_rank_anonymous_user() {
        let mut history = AccessHistory::new();
        history.record(None, "shared");
        history.record(Some("u1"), "personal");

        let ranked = history.rank_for_user(None, 10);
        assert_eq!(ranked, vec!["shared"]);
    }
}
