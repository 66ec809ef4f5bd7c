//! Core segmented downloader engine.
//!
//! Consumes a direct URL + headers, runs up to `max_concurrent` concurrent HTTP
//! Range GETs over a single reused connection pool (the curl-multi event loop
//! in [`multi`]), writes each segment to storage at the correct offset, and
//! updates the completion bitmap. Supports retry with backoff via an optional
//! `RetryPolicy`, cooperative cancellation via an abort flag, and optional
//! per-handle bandwidth caps.

pub mod multi;
mod segment;
mod single;

pub use single::download_single;

use anyhow::Result;
use crate::retry::{RetryPolicy, SegmentError};
use crate::segmenter::{Segment, SegmentBitmap};
use crate::storage::StorageWriter;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Result of a single segment download (used for retry classification).
pub type SegmentResult = Result<(), SegmentError>;

/// Summary of a download run for adaptive policy: throttle and error counts.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub throttle_events: u32,
    pub error_events: u32,
}

/// Per-handle curl tuning derived from config and the number of segments actually
/// running concurrently. `max_recv_speed` is a libcurl per-handle cap, so a global
/// bandwidth budget is split evenly across the handles sharing it; `rate_limiter`
/// is an additional application-level bucket enforcing the same ceiling globally
/// (libcurl's per-handle cap alone does not coordinate across handles).
#[derive(Debug, Clone, Default)]
pub struct CurlOptions {
    pub max_recv_speed: Option<u64>,
    pub buffer_size: Option<usize>,
    pub rate_limiter: Option<Arc<crate::rate_limit::GlobalLimiter>>,
    pub certificate_gate: Option<Arc<crate::tls::CertificateGate>>,
}

impl CurlOptions {
    /// Builds per-handle options from a global bytes/sec cap split across
    /// `actual_concurrent` handles, and an optional read-buffer size hint.
    pub fn per_handle(
        max_bytes_per_sec: Option<u64>,
        actual_concurrent: usize,
        segment_buffer_bytes: Option<usize>,
    ) -> Self {
        let concurrent = actual_concurrent.max(1) as u64;
        Self {
            max_recv_speed: max_bytes_per_sec.map(|total| (total / concurrent).max(1)),
            buffer_size: segment_buffer_bytes,
            rate_limiter: None,
            certificate_gate: None,
        }
    }

    /// Attaches a shared global rate limiter enforced per-chunk in the segment
    /// write path, on top of libcurl's own per-handle cap.
    pub fn with_rate_limiter(mut self, limiter: Option<Arc<crate::rate_limit::GlobalLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Attaches a certificate gate enforcing pinning / strict chain validation.
    pub fn with_certificate_gate(mut self, gate: Option<Arc<crate::tls::CertificateGate>>) -> Self {
        self.certificate_gate = gate;
        self
    }
}

/// Downloads all segments that are not yet completed, writing to `storage` and updating
/// `bitmap` in place. At most `max_concurrent` segment transfers run at once, reusing
/// connections via a single curl-multi handle. Fills `summary_out` with throttle/error
/// counts observed along the way.
///
/// If `progress_tx` is `Some`, the current bitmap is sent after completed segments
/// (coalesced) so the caller can persist progress. `in_flight_bytes`, if provided, is
/// updated with bytes written per segment so the caller can report partial progress for
/// segments still in flight. `abort`, if provided and set, cancels the run at the next
/// poll-loop iteration, surfacing a [`crate::control::JobAborted`] error.
#[allow(clippy::too_many_arguments)]
pub fn download_segments(
    url: &str,
    custom_headers: &HashMap<String, String>,
    segments: &[Segment],
    storage: &StorageWriter,
    bitmap: &mut SegmentBitmap,
    max_concurrent: Option<usize>,
    retry_policy: Option<&RetryPolicy>,
    summary_out: &mut DownloadSummary,
    progress_tx: Option<&tokio::sync::mpsc::Sender<Vec<u8>>>,
    in_flight_bytes: Option<Arc<Vec<AtomicU64>>>,
    abort: Option<Arc<AtomicBool>>,
    curl: CurlOptions,
) -> Result<()> {
    multi::download_segments_multi(
        url,
        custom_headers,
        segments,
        storage,
        bitmap,
        max_concurrent,
        retry_policy,
        summary_out,
        progress_tx,
        in_flight_bytes,
        abort,
        curl,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::plan_segments;

    #[test]
    fn parse_content_range_parses_valid_header() {
        let headers = vec![
            "HTTP/1.1 206 Partial Content".to_string(),
            "Content-Range: bytes 100-199/1000".to_string(),
        ];
        assert_eq!(segment::parse_content_range(&headers), Some((100, 199)));
        let headers_lower = vec!["content-range: bytes 0-99/*".to_string()];
        assert_eq!(segment::parse_content_range(&headers_lower), Some((0, 99)));
    }

    #[test]
    fn download_segments_updates_bitmap() {
        let segments = plan_segments(1000, 4);
        let mut bitmap = SegmentBitmap::new(4);
        assert!(!bitmap.all_completed(4));
        bitmap.set_completed(0);
        bitmap.set_completed(2);
        let incomplete: Vec<_> = segments
            .iter()
            .enumerate()
            .filter(|(i, _)| !bitmap.is_completed(*i))
            .collect();
        assert_eq!(incomplete.len(), 2);
        assert!(bitmap.is_completed(0));
        assert!(!bitmap.is_completed(1));
        assert!(bitmap.is_completed(2));
        assert!(!bitmap.is_completed(3));
    }

    #[test]
    fn curl_options_per_handle_splits_budget() {
        let opts = CurlOptions::per_handle(Some(1000), 4, Some(65536));
        assert_eq!(opts.max_recv_speed, Some(250));
        assert_eq!(opts.buffer_size, Some(65536));
    }

    #[test]
    fn curl_options_per_handle_no_cap() {
        let opts = CurlOptions::per_handle(None, 4, None);
        assert_eq!(opts.max_recv_speed, None);
    }
}
