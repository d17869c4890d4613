//! Striped lossy read buffer: `get` hits funnel through here so the hot
//! path never contends on the admission filter's mutex directly. Each
//! stripe is a small fixed-capacity batch; once full it is handed to a
//! [`Consumer`] and reset. A full stripe that cannot accept one more key
//! is simply dropped — lossy by design, the same trade the original
//! `ringBuffer`/`ringStripe` pair makes.

use crate::metrics::{MetricKind, Metrics};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives a full stripe's worth of keys. The admission-push worker is the
/// only real implementation; tests use a simple `Vec`-backed one.
pub trait Consumer: Send + Sync {
    /// Returns `true` if the batch was accepted.
    fn push(&self, keys: Vec<u64>) -> bool;
}

struct Stripe {
    data: Mutex<Vec<u64>>,
    capacity: usize,
}

impl Stripe {
    fn new(capacity: usize) -> Self {
        Self {
            data: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }
}

/// A pool of stripes, one picked per call by `hash % stripes.len()`, so
/// concurrent readers rarely contend on the same inner `Mutex`.
pub struct ReadBuffer<C: Consumer> {
    stripes: Vec<Stripe>,
    consumer: C,
    metrics: Arc<Metrics>,
}

impl<C: Consumer> ReadBuffer<C> {
    pub fn with_capacity(num_stripes: usize, stripe_capacity: usize, consumer: C, metrics: Arc<Metrics>) -> Self {
        let num_stripes = num_stripes.max(1);
        let stripes = (0..num_stripes).map(|_| Stripe::new(stripe_capacity)).collect();
        Self { stripes, consumer, metrics }
    }

    /// Records one `get` hit for `hash`. Flushes the owning stripe to the
    /// consumer once it fills.
    pub fn record(&self, hash: u64) {
        let idx = (hash as usize) % self.stripes.len();
        let stripe = &self.stripes[idx];
        let mut data = stripe.data.lock();

        if data.len() >= stripe.capacity {
            self.metrics.add(MetricKind::GetsDropped, hash, 1);
            return;
        }

        data.push(hash);
        self.metrics.add(MetricKind::GetsKept, hash, 1);

        if data.len() >= stripe.capacity {
            let batch = std::mem::replace(&mut *data, Vec::with_capacity(stripe.capacity));
            drop(data);
            self.consumer.push(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as StdMutex;
    use std::sync::Arc;

    struct VecConsumer(Arc<StdMutex<Vec<Vec<u64>>>>);

    impl Consumer for VecConsumer {
        fn push(&self, keys: Vec<u64>) -> bool {
            self.0.lock().push(keys);
            true
        }
    }

    #[test]
    fn records_below_capacity_without_flushing() {
        let batches = Arc::new(StdMutex::new(Vec::new()));
        let metrics = Arc::new(Metrics::new(true));
        let buf = ReadBuffer::with_capacity(1, 4, VecConsumer(batches.clone()), metrics.clone());
        buf.record(1);
        buf.record(2);
        assert!(batches.lock().is_empty());
        assert_eq!(metrics.get(MetricKind::GetsKept), 2);
    }

    #[test]
    fn flushes_a_full_stripe_to_the_consumer() {
        let batches = Arc::new(StdMutex::new(Vec::new()));
        let metrics = Arc::new(Metrics::new(true));
        let buf = ReadBuffer::with_capacity(1, 2, VecConsumer(batches.clone()), metrics);
        buf.record(1);
        buf.record(2);
        assert_eq!(batches.lock().len(), 1);
        assert_eq!(batches.lock()[0], vec![1, 2]);
    }

    #[test]
    fn drops_a_get_once_a_stripe_is_already_at_capacity() {
        let batches = Arc::new(StdMutex::new(Vec::new()));
        let metrics = Arc::new(Metrics::new(true));
        // capacity 0 means every record finds the stripe already full.
        let buf = ReadBuffer::with_capacity(1, 0, VecConsumer(batches), metrics.clone());
        buf.record(1);
        assert_eq!(metrics.get(MetricKind::GetsDropped), 1);
        assert_eq!(metrics.get(MetricKind::GetsKept), 0);
    }

    #[test]
    fn distinct_hashes_land_in_distinct_stripes() {
        let batches = Arc::new(StdMutex::new(Vec::new()));
        let metrics = Arc::new(Metrics::new(true));
        let buf = ReadBuffer::with_capacity(4, 64, VecConsumer(batches), metrics.clone());
        buf.record(0);
        buf.record(1);
        buf.record(2);
        buf.record(3);
        assert_eq!(metrics.get(MetricKind::GetsKept), 4);
    }
}
