//! Striped counters and a life-expectancy histogram. Each named counter is
//! backed by 256 independent `AtomicU64` lanes, picked by the caller's key
//! hash, so hot concurrent increments land on different cache lines instead
//! of hammering one `AtomicU64` — the same false-sharing avoidance the
//! original `newMetrics` gets by allocating 256 `*uint64` per metric kind.

use std::sync::atomic::{AtomicU64, Ordering};

const STRIPES: usize = 256;

macro_rules! metric_kinds {
    ($($variant:ident => $name:expr),+ $(,)?) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum MetricKind {
            $($variant),+
        }

        impl MetricKind {
            pub const ALL: &'static [MetricKind] = &[$(MetricKind::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(MetricKind::$variant => $name),+
                }
            }
        }
    };
}

metric_kinds! {
    Hit => "hit",
    Miss => "miss",
    KeysAdded => "keys-added",
    KeysUpdated => "keys-updated",
    KeysEvicted => "keys-evicted",
    CostAdded => "cost-added",
    CostEvicted => "cost-evicted",
    SetsDropped => "sets-dropped",
    SetsRejected => "sets-rejected",
    GetsDropped => "gets-dropped",
    GetsKept => "gets-kept",
}

struct Striped {
    lanes: Vec<AtomicU64>,
}

impl Striped {
    fn new() -> Self {
        let mut lanes = Vec::with_capacity(STRIPES);
        lanes.resize_with(STRIPES, || AtomicU64::new(0));
        Self { lanes }
    }

    fn add(&self, stripe_hint: u64, delta: u64) {
        let idx = (stripe_hint as usize) % STRIPES;
        self.lanes[idx].fetch_add(delta, Ordering::Relaxed);
    }

    fn sum(&self) -> u64 {
        self.lanes.iter().map(|l| l.load(Ordering::Relaxed)).sum()
    }

    fn clear(&self) {
        for lane in &self.lanes {
            lane.store(0, Ordering::Relaxed);
        }
    }
}

/// One entry per [`MetricKind`], each independently striped.
pub struct Metrics {
    enabled: bool,
    counters: Vec<Striped>,
    life: Histogram,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            counters: MetricKind::ALL.iter().map(|_| Striped::new()).collect(),
            life: Histogram::new(&DEFAULT_HISTOGRAM_BOUNDS),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bumps `kind` by `delta`, landing on the lane selected by
    /// `stripe_hint` (typically the key hash of the operation that
    /// triggered the metric).
    pub fn add(&self, kind: MetricKind, stripe_hint: u64, delta: u64) {
        if !self.enabled {
            return;
        }
        self.counters[kind as usize].add(stripe_hint, delta);
    }

    pub fn get(&self, kind: MetricKind) -> u64 {
        self.counters[kind as usize].sum()
    }

    pub fn ratio(&self) -> f64 {
        let hits = self.get(MetricKind::Hit) as f64;
        let misses = self.get(MetricKind::Miss) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    /// Records how long an item lived in the cache before eviction/removal.
    pub fn observe_life(&self, seconds: f64) {
        if self.enabled {
            self.life.observe(seconds);
        }
    }

    pub fn life_histogram(&self) -> HistogramSnapshot {
        self.life.snapshot()
    }

    pub fn clear(&self) {
        for c in &self.counters {
            c.clear();
        }
        self.life.clear();
    }

    /// Renders every counter as Prometheus exposition text, in the style of
    /// the teacher's `controller::metrics::format_prometheus_metrics`.
    pub fn format_prometheus(&self) -> String {
        let mut out = String::new();
        for kind in MetricKind::ALL {
            out.push_str(&format!(
                "advcache_{} {}\n",
                kind.name().replace('-', "_"),
                self.get(*kind)
            ));
        }
        out
    }
}

const DEFAULT_HISTOGRAM_BOUNDS: [f64; 8] = [1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 86400.0];

pub struct HistogramSnapshot {
    pub bounds: Vec<f64>,
    pub count_per_bucket: Vec<u64>,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

struct HistogramInner {
    bounds: Vec<f64>,
    count_per_bucket: Vec<AtomicU64>,
    count: AtomicU64,
    min_bits: AtomicU64,
    max_bits: AtomicU64,
    sum_bits: AtomicU64,
}

/// Life-expectancy histogram: tracks how long evicted/removed items
/// survived, the same shape as the original `HistogramData`. The bucket
/// bounds are an implementation choice, not a contract.
struct Histogram {
    inner: HistogramInner,
}

impl Histogram {
    fn new(bounds: &[f64]) -> Self {
        Self {
            inner: HistogramInner {
                bounds: bounds.to_vec(),
                count_per_bucket: (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect(),
                count: AtomicU64::new(0),
                min_bits: AtomicU64::new(f64::MAX.to_bits()),
                max_bits: AtomicU64::new(f64::MIN.to_bits()),
                sum_bits: AtomicU64::new(0.0f64.to_bits()),
            },
        }
    }

    fn observe(&self, v: f64) {
        let bucket = self.inner.bounds.iter().position(|&b| v <= b).unwrap_or(self.inner.bounds.len());
        self.inner.count_per_bucket[bucket].fetch_add(1, Ordering::Relaxed);
        self.inner.count.fetch_add(1, Ordering::Relaxed);

        self.inner
            .min_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let cur = f64::from_bits(bits);
                if v < cur { Some(v.to_bits()) } else { None }
            })
            .ok();
        self.inner
            .max_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let cur = f64::from_bits(bits);
                if v > cur { Some(v.to_bits()) } else { None }
            })
            .ok();
        self.inner
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + v).to_bits())
            })
            .ok();
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let count = self.inner.count.load(Ordering::Relaxed);
        HistogramSnapshot {
            bounds: self.inner.bounds.clone(),
            count_per_bucket: self
                .inner
                .count_per_bucket
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            count,
            min: if count == 0 { 0.0 } else { f64::from_bits(self.inner.min_bits.load(Ordering::Relaxed)) },
            max: if count == 0 { 0.0 } else { f64::from_bits(self.inner.max_bits.load(Ordering::Relaxed)) },
            sum: f64::from_bits(self.inner.sum_bits.load(Ordering::Relaxed)),
        }
    }

    fn clear(&self) {
        for c in &self.inner.count_per_bucket {
            c.store(0, Ordering::Relaxed);
        }
        self.inner.count.store(0, Ordering::Relaxed);
        self.inner.min_bits.store(f64::MAX.to_bits(), Ordering::Relaxed);
        self.inner.max_bits.store(f64::MIN.to_bits(), Ordering::Relaxed);
        self.inner.sum_bits.store(0.0f64.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_do_not_accumulate() {
        let m = Metrics::new(false);
        m.add(MetricKind::Hit, 1, 1);
        assert_eq!(m.get(MetricKind::Hit), 0);
    }

    #[test]
    fn enabled_metrics_accumulate_across_stripes() {
        let m = Metrics::new(true);
        m.add(MetricKind::Hit, 1, 1);
        m.add(MetricKind::Hit, 257, 1);
        assert_eq!(m.get(MetricKind::Hit), 2);
    }

    #[test]
    fn ratio_is_zero_with_no_traffic() {
        let m = Metrics::new(true);
        assert_eq!(m.ratio(), 0.0);
    }

    #[test]
    fn ratio_reflects_hits_over_total() {
        let m = Metrics::new(true);
        m.add(MetricKind::Hit, 1, 3);
        m.add(MetricKind::Miss, 1, 1);
        assert!((m.ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn clear_resets_counters_and_histogram() {
        let m = Metrics::new(true);
        m.add(MetricKind::Hit, 1, 1);
        m.observe_life(10.0);
        m.clear();
        assert_eq!(m.get(MetricKind::Hit), 0);
        assert_eq!(m.life_histogram().count, 0);
    }

    #[test]
    fn histogram_tracks_min_max_and_count() {
        let m = Metrics::new(true);
        m.observe_life(2.0);
        m.observe_life(500.0);
        let snap = m.life_histogram();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.min, 2.0);
        assert_eq!(snap.max, 500.0);
    }

    #[test]
    fn prometheus_output_includes_every_fixed_metric_name() {
        let m = Metrics::new(true);
        let text = m.format_prometheus();
        assert!(text.contains("advcache_hit"));
        assert!(text.contains("advcache_keys_evicted"));
    }
}
