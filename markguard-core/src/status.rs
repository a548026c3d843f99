// markguard-core/src/status.rs
//! Observability collaborators for rejected links.
//!
//! The href validator reports every rejection to an injected [`InvalidHrefSink`].
//! Nothing in the decision path reads back from the sink.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Default number of distinct URLs an [`InvalidHrefRecorder`] keeps.
pub const MAX_INVALID_URLS_RECORDED: usize = 1000;

/// Receives every URL the href validator rejects.
pub trait InvalidHrefSink: Send + Sync {
    fn record_invalid_href(&self, url: &str);
}

/// Discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHrefSink;

impl InvalidHrefSink for NoopHrefSink {
    fn record_invalid_href(&self, _url: &str) {}
}

/// One entry of an [`InvalidHrefRecorder`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidHrefCount {
    pub url: String,
    pub count: u64,
}

#[derive(Debug, Default)]
struct RecorderState {
    counts: HashMap<String, u64>,
    order: VecDeque<String>,
}

/// Counts rejections per URL in a bounded map; the oldest URL is evicted first.
#[derive(Debug)]
pub struct InvalidHrefRecorder {
    capacity: usize,
    total: AtomicU64,
    state: Mutex<RecorderState>,
}

impl Default for InvalidHrefRecorder {
    fn default() -> Self {
        Self::with_capacity(MAX_INVALID_URLS_RECORDED)
    }
}

impl InvalidHrefRecorder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Rejections seen since creation, including evicted URLs.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Recorded URLs, most frequent first.
    pub fn snapshot(&self) -> Vec<InvalidHrefCount> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<InvalidHrefCount> = state
            .counts
            .iter()
            .map(|(url, count)| InvalidHrefCount { url: url.clone(), count: *count })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.url.cmp(&b.url)));
        entries
    }
}

impl InvalidHrefSink for InvalidHrefRecorder {
    fn record_invalid_href(&self, url: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = state.counts.get_mut(url) {
            *count += 1;
            return;
        }
        if state.order.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.counts.remove(&oldest);
            }
        }
        state.order.push_back(url.to_string());
        state.counts.insert(url.to_string(), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_counts_repeats() {
        let recorder = InvalidHrefRecorder::default();
        recorder.record_invalid_href("javascript:a");
        recorder.record_invalid_href("javascript:a");
        recorder.record_invalid_href("javascript:b");
        assert_eq!(recorder.total(), 3);
        assert_eq!(
            recorder.snapshot(),
            vec![
                InvalidHrefCount { url: "javascript:a".into(), count: 2 },
                InvalidHrefCount { url: "javascript:b".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_recorder_evicts_oldest() {
        let recorder = InvalidHrefRecorder::with_capacity(2);
        recorder.record_invalid_href("one");
        recorder.record_invalid_href("two");
        recorder.record_invalid_href("three");
        let urls: Vec<String> = recorder.snapshot().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["three".to_string(), "two".to_string()]);
        assert_eq!(recorder.total(), 3);
    }
}
