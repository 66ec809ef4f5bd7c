//! Mirror health probing, ranking, per-segment assignment, and failover bookkeeping.
//!
//! A `MirrorRegistry` is built once per job from its configured mirror URLs
//! (the primary download URL plus zero or more alternates). Health checks reuse
//! the HEAD-probing pattern from [`crate::fetch_head`]; failover decisions are
//! recorded as [`FailoverEvent`]s for persistence and diagnostics.

use std::collections::HashMap;
use std::time::Instant;

use crate::fetch_head;

/// One mirror URL and its last-known health.
#[derive(Debug, Clone)]
pub struct Mirror {
    pub url: String,
    /// Rank, ascending = preferred. Re-derived by `rerank` after every probe
    /// or failure so the best healthy mirror is always priority 0.
    pub priority: u32,
    pub healthy: bool,
    pub response_time_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl Mirror {
    pub fn new(url: impl Into<String>, priority: u32) -> Self {
        Self {
            url: url.into(),
            priority,
            healthy: true,
            response_time_ms: None,
            last_error: None,
        }
    }
}

/// A single mirror switch, kept for diagnostics and persisted alongside the job.
#[derive(Debug, Clone)]
pub struct FailoverEvent {
    pub segment_index: usize,
    pub old_mirror_url: Option<String>,
    pub new_mirror_url: Option<String>,
    pub reason: String,
    pub occurred_at: std::time::SystemTime,
}

/// Health-checks, ranks, assigns, and fails over between a job's mirror URLs.
///
/// Not `Sync`-shared across concurrent segment fetches by itself; callers serialize
/// access (e.g. behind a `Mutex`) since `handle_failure` mutates ranking and bookkeeping.
#[derive(Debug)]
pub struct MirrorRegistry {
    mirrors: Vec<Mirror>,
    events: Vec<FailoverEvent>,
    max_attempts_per_segment: u32,
    segment_attempts: HashMap<usize, u32>,
}

impl MirrorRegistry {
    /// Builds a registry from an ordered list of mirror URLs (most-preferred first).
    pub fn new(urls: impl IntoIterator<Item = String>, max_attempts_per_segment: u32) -> Self {
        let mirrors = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| Mirror::new(url, i as u32))
            .collect();
        Self {
            mirrors,
            events: Vec::new(),
            max_attempts_per_segment,
            segment_attempts: HashMap::new(),
        }
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    pub fn events(&self) -> &[FailoverEvent] {
        &self.events
    }

    /// HEAD-probes every mirror sequentially, recording reachability and latency,
    /// then re-ranks healthy-first, ascending latency. Callers that want concurrent
    /// probing run several registries (or several `probe_one` calls) via their own
    /// task fan-out; this keeps the registry itself free of a runtime dependency.
    pub fn probe(&mut self, headers: &HashMap<String, String>) {
        for m in &mut self.mirrors {
            let start = Instant::now();
            match fetch_head::probe(&m.url, headers) {
                Ok(_) => {
                    m.healthy = true;
                    m.response_time_ms = Some(start.elapsed().as_millis() as u64);
                    m.last_error = None;
                }
                Err(e) => {
                    m.healthy = false;
                    m.response_time_ms = None;
                    m.last_error = Some(e.to_string());
                }
            }
        }
        self.rerank();
    }

    fn rerank(&mut self) {
        self.mirrors.sort_by(|a, b| {
            b.healthy
                .cmp(&a.healthy)
                .then(a.response_time_ms.unwrap_or(u64::MAX).cmp(&b.response_time_ms.unwrap_or(u64::MAX)))
        });
        for (i, m) in self.mirrors.iter_mut().enumerate() {
            m.priority = i as u32;
        }
    }

    /// The lowest-priority (most preferred) healthy mirror, if any.
    pub fn best(&self) -> Option<&Mirror> {
        self.mirrors.iter().filter(|m| m.healthy).min_by_key(|m| m.priority)
    }

    /// Round-robins `segment_count` segments across currently-healthy mirrors by
    /// priority. An entry is `None` when no healthy mirror exists at assignment
    /// time; the caller should fall back to the primary URL in that case.
    pub fn assign(&self, segment_count: usize) -> Vec<Option<String>> {
        let mut healthy: Vec<&Mirror> = self.mirrors.iter().filter(|m| m.healthy).collect();
        healthy.sort_by_key(|m| m.priority);
        if healthy.is_empty() {
            return vec![None; segment_count];
        }
        (0..segment_count)
            .map(|i| Some(healthy[i % healthy.len()].url.clone()))
            .collect()
    }

    /// Records a segment failure against `current_url`: marks that mirror unhealthy,
    /// re-ranks, and picks a replacement excluding it. Appends a `FailoverEvent`
    /// regardless of outcome. Returns `None` when `max_attempts_per_segment` for
    /// this segment is exhausted or no other healthy mirror remains -- the caller
    /// should mark the segment failed in that case rather than loop forever.
    pub fn handle_failure(
        &mut self,
        segment_index: usize,
        current_url: &str,
        reason: impl Into<String>,
    ) -> Option<String> {
        let reason = reason.into();
        let attempts = self.segment_attempts.entry(segment_index).or_insert(0);
        if *attempts >= self.max_attempts_per_segment {
            self.events.push(FailoverEvent {
                segment_index,
                old_mirror_url: Some(current_url.to_string()),
                new_mirror_url: None,
                reason: format!("{} (failover attempts exhausted)", reason),
                occurred_at: std::time::SystemTime::now(),
            });
            return None;
        }
        *attempts += 1;

        if let Some(m) = self.mirrors.iter_mut().find(|m| m.url == current_url) {
            m.healthy = false;
            m.last_error = Some(reason.clone());
        }
        self.rerank();

        let replacement = self
            .mirrors
            .iter()
            .filter(|m| m.healthy && m.url != current_url)
            .min_by_key(|m| m.priority)
            .map(|m| m.url.clone());

        self.events.push(FailoverEvent {
            segment_index,
            old_mirror_url: Some(current_url.to_string()),
            new_mirror_url: replacement.clone(),
            reason,
            occurred_at: std::time::SystemTime::now(),
        });
        replacement
    }
}
