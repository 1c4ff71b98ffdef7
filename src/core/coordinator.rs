//! ScanCoordinator: runs extraction over page text and forwards every match
//! to a detection sink.
//!
//! Host-independent; the native and wasm layers read the page text and
//! call [`ScanCoordinator::scan_text`], including from their change watchers.

use crate::core::pattern::CompiledPatterns;
use crate::core::record::Detection;
use serde::Serialize;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Where detections go. Appends are fire-and-forget: never block, never fail loudly.
pub trait DetectionSink {
    fn append(&self, detection: Detection);
}

impl<S: DetectionSink + ?Sized> DetectionSink for Arc<S> {
    fn append(&self, detection: Detection) { (**self).append(detection) }
}

impl<S: DetectionSink + ?Sized> DetectionSink for Rc<S> {
    fn append(&self, detection: Detection) { (**self).append(detection) }
}

impl<S: DetectionSink + ?Sized> DetectionSink for &S {
    fn append(&self, detection: Detection) { (**self).append(detection) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Uninitialized,
    Scanning,
    Idle,
}

/// Result of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub detections: Vec<Detection>,
}

impl ScanReport {
    pub fn len(&self) -> usize { self.detections.len() }
    pub fn is_empty(&self) -> bool { self.detections.is_empty() }
}

pub struct ScanCoordinator<S> {
    patterns: CompiledPatterns,
    sink: S,
    started: AtomicBool,
    active: AtomicUsize,
    scans: AtomicU64,
}

impl<S: DetectionSink> ScanCoordinator<S> {
    pub fn new(patterns: CompiledPatterns, sink: S) -> Self {
        Self { patterns, sink, started: AtomicBool::new(false), active: AtomicUsize::new(0), scans: AtomicU64::new(0) }
    }

    pub fn patterns(&self) -> &CompiledPatterns { &self.patterns }
    pub fn sink(&self) -> &S { &self.sink }

    /// Scans may overlap; the coordinator is `Scanning` while any is in flight.
    pub fn state(&self) -> ScanState {
        if !self.started.load(Ordering::Acquire) {
            ScanState::Uninitialized
        } else if self.active.load(Ordering::Acquire) > 0 {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    /// Completed scans so far.
    pub fn scan_count(&self) -> u64 { self.scans.load(Ordering::Relaxed) }

    /// One full pass over `text`; each match is stamped and appended as found.
    pub fn scan_text(&self, source_url: &str, text: &str) -> ScanReport {
        let _scan = self.enter();
        self.forward_matches(source_url, text)
    }

    /// The body of [`scan_text`](Self::scan_text) for hosts that already hold a
    /// [`ScanGuard`] (they entered before reading the page text).
    pub fn forward_matches(&self, source_url: &str, text: &str) -> ScanReport {
        let mut report = ScanReport::default();
        for m in self.patterns.extract(text) {
            let detection = Detection::now(source_url, m.key, m.value);
            self.sink.append(detection.clone());
            report.detections.push(detection);
        }
        report
    }

    /// Mark a scan in flight until the guard drops.
    pub fn enter(&self) -> ScanGuard<'_> {
        self.started.store(true, Ordering::Release);
        self.active.fetch_add(1, Ordering::AcqRel);
        ScanGuard { active: &self.active, scans: &self.scans }
    }
}

pub struct ScanGuard<'a> {
    active: &'a AtomicUsize,
    scans: &'a AtomicU64,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
