//! `Cache<K, V>`: the public facade wiring the store, TTL index, eviction
//! policy, read buffer, and mutator/admission-push workers together.
//! Construction goes through [`CacheBuilder`]; everything else is a thin,
//! synchronous method that either touches the store directly (`get`) or
//! enqueues work for the mutator (`set`/`del`).

use crate::buffer::ReadBuffer;
use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::hash::KeyToHash;
use crate::metrics::{MetricKind, Metrics};
use crate::mutator::{spawn_mutator, Hooks, MutationOp, MutatorHandle};
use crate::policy::{spawn_admission_push_worker, Policy, PushHandle};
use crate::store::Store;
use crate::ttl::TtlIndex;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

const MUTATOR_CHANNEL_CAPACITY: usize = 256;

/// Builds a [`Cache`] from a [`CacheConfig`] plus optional hooks.
pub struct CacheBuilder<V> {
    config: CacheConfig,
    hooks: crate::mutator::Hooks<V>,
}

impl<V: Clone + Send + Sync + 'static> CacheBuilder<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self { config, hooks: Hooks::default() }
    }

    pub fn on_evict(mut self, f: impl Fn(u64, u64, &V, i64) + Send + Sync + 'static) -> Self {
        self.hooks.on_evict = Some(Arc::new(f));
        self
    }

    pub fn on_reject(mut self, f: impl Fn(u64, u64, &V, i64) + Send + Sync + 'static) -> Self {
        self.hooks.on_reject = Some(Arc::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl Fn(Option<&V>) + Send + Sync + 'static) -> Self {
        self.hooks.on_exit = Some(Arc::new(f));
        self
    }

    /// Consulted on every `set` of an already-present key: the update is
    /// skipped when this returns `false`, given the incoming value and the
    /// one currently stored.
    pub fn should_update(mut self, f: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.should_update = Some(Arc::new(f));
        self
    }

    /// Deferred cost computation, consulted only when a `set` call passes
    /// a cost of `0`.
    pub fn cost(mut self, f: impl Fn(&V) -> i64 + Send + Sync + 'static) -> Self {
        self.hooks.cost = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Cache<V>, ConfigError> {
        self.config.validate()?;
        Ok(Cache::new(self.config, self.hooks))
    }
}

/// A bounded, in-memory key/value cache. `K` is accepted generically via
/// [`KeyToHash`] at each call site rather than fixed as a type parameter on
/// `Cache` itself, since the store only ever sees the derived `(k, c)` pair.
pub struct Cache<V> {
    store: Arc<Store<V>>,
    policy: Arc<Policy>,
    ttl: Arc<TtlIndex>,
    metrics: Arc<Metrics>,
    buffer: ReadBuffer<PushHandle>,
    mutator: MutatorHandle<V>,
    shutdown: CancellationToken,
    state: AtomicU8,
    mutator_join: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    push_join: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    fn new(config: CacheConfig, hooks: Hooks<V>) -> Self {
        let store = Arc::new(Store::new());
        let metrics = Arc::new(Metrics::new(config.metrics));
        let policy = Arc::new(Policy::new(config.num_counters, config.max_cost, metrics.clone()));
        let ttl = Arc::new(TtlIndex::new(crate::ttl::DEFAULT_BUCKET_WIDTH_SECS));
        let shutdown = CancellationToken::new();

        let (push_handle, push_join) = spawn_admission_push_worker(policy.clone(), shutdown.clone());
        let buffer = ReadBuffer::with_capacity(num_cpus::get().max(1), config.buffer_items, push_handle, metrics.clone());

        let (mutator, mutator_join) = spawn_mutator(
            store.clone(),
            policy.clone(),
            ttl.clone(),
            hooks,
            metrics.clone(),
            config.ttl_ticker,
            MUTATOR_CHANNEL_CAPACITY,
            config.ignore_internal_cost,
            shutdown.clone(),
        );

        info!(component = "cache", event = "opened", "cache opened");

        Self {
            store,
            policy,
            ttl,
            metrics,
            buffer,
            mutator,
            shutdown,
            state: AtomicU8::new(STATE_OPEN),
            mutator_join: std::sync::Mutex::new(Some(mutator_join)),
            push_join: std::sync::Mutex::new(Some(push_join)),
        }
    }

    fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }

    /// Looks up `key`. A hit is recorded into the striped read buffer,
    /// which batches hits into the TinyLFU admission filter.
    pub fn get<K: KeyToHash + ?Sized>(&self, key: &K) -> Option<V> {
        if !self.is_open() {
            return None;
        }
        let (k, c) = key.key_to_hash();
        let found = self.store.get(k, c);
        self.buffer.record(k);

        match found {
            Some(item) => {
                self.metrics.add(MetricKind::Hit, k, 1);
                Some(item.value)
            }
            None => {
                self.metrics.add(MetricKind::Miss, k, 1);
                None
            }
        }
    }

    pub fn set<K: KeyToHash + ?Sized>(&self, key: &K, value: V, cost: i64) -> bool {
        self.set_with_ttl(key, value, cost, 0)
    }

    /// `expiration` is a Unix-seconds deadline; 0 means no TTL.
    pub fn set_with_ttl<K: KeyToHash + ?Sized>(&self, key: &K, value: V, cost: i64, expiration: u64) -> bool {
        if !self.is_open() {
            return false;
        }
        let (k, c) = key.key_to_hash();
        // `keys-added`/`keys-updated`/`cost-added` are bumped by the mutator
        // itself once admission actually succeeds, not here — a rejected
        // `New` must not count as added.
        let op = if self.store.get(k, c).is_some() {
            MutationOp::Update { key: k, conflict: c, value, cost, expiration }
        } else {
            MutationOp::New { key: k, conflict: c, value, cost, expiration }
        };
        if self.mutator.send(op) {
            true
        } else {
            self.metrics.add(MetricKind::SetsDropped, k, 1);
            false
        }
    }

    pub fn del<K: KeyToHash + ?Sized>(&self, key: &K) {
        if !self.is_open() {
            return;
        }
        let (k, c) = key.key_to_hash();
        self.mutator.send(MutationOp::Delete { key: k, conflict: c });
    }

    pub fn clear(&self) {
        self.store.clear();
        self.ttl.clear();
        self.policy.clear();
        self.metrics.clear();
    }

    pub fn max_cost(&self) -> i64 {
        self.policy.max_cost()
    }

    pub fn update_max_cost(&self, max_cost: i64) {
        self.policy.update_max_cost(max_cost);
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Blocks until every `set`/`del` enqueued so far has been applied.
    pub async fn wait(&self) {
        self.mutator.wait().await;
    }

    /// Moves the cache `Open -> Closing -> Closed`, draining outstanding
    /// mutations and stopping both background workers.
    pub async fn close(&self) {
        if self
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!(component = "cache", event = "closing", "cache closing");
        self.shutdown.cancel();

        let mutator_join = self.mutator_join.lock().unwrap().take();
        if let Some(join) = mutator_join {
            let _ = join.await;
        }
        let push_join = self.push_join.lock().unwrap().take();
        if let Some(join) = push_join {
            let _ = join.await;
        }

        self.state.store(STATE_CLOSED, Ordering::Release);
        info!(component = "cache", event = "closed", "cache closed");
    }
}
