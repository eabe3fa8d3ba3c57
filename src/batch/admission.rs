use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts jobs currently holding an admission slot and the peak reached.
#[derive(Debug, Clone, Default)]
pub struct AdmissionGauge {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    alive: AtomicUsize,
    peak: AtomicUsize,
}

impl AdmissionGauge {
    /// Takes a slot; it is released when the guard drops.
    pub fn enter(&self) -> AdmissionGuard {
        let now = self.inner.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        AdmissionGuard {
            gauge: self.clone(),
        }
    }

    pub fn alive(&self) -> usize {
        self.inner.alive.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// Slot held by one running job.
#[derive(Debug)]
pub struct AdmissionGuard {
    gauge: AdmissionGauge,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.gauge.inner.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_alive_and_peak() {
        let gauge = AdmissionGauge::default();
        let a = gauge.enter();
        let b = gauge.enter();
        assert_eq!(gauge.alive(), 2);
        drop(a);
        assert_eq!(gauge.alive(), 1);
        let c = gauge.enter();
        assert_eq!(gauge.peak(), 2);
        drop(b);
        drop(c);
        assert_eq!(gauge.alive(), 0);
        assert_eq!(gauge.peak(), 2);
    }
}
