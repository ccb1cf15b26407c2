use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct AtomicMetrics {
    started: AtomicU64,
    paid: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_paid(&self) {
        self.paid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn get_paid(&self) -> u64 {
        self.paid.load(Ordering::Relaxed)
    }

    pub fn get_cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn get_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
