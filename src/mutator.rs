//! The write pipeline: every `set`/`del` becomes a [`MutationOp`] pushed
//! onto a channel, drained by one consumer task so the store's conflict
//! checks and the policy's cost accounting never race against each other.
//! Modeled as a tagged enum rather than a struct with an `itemFlag` field,
//! per the design direction to prefer the enum shape idiomatic Rust reaches
//! for over the original's flag-dispatch `Item`.

use crate::metrics::{MetricKind, Metrics};
use crate::policy::Policy;
use crate::store::{Store, StoredItem};
use crate::ttl::TtlIndex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Number of candidates drawn from the policy's tracked keys for each
/// victim search, matching the original `sampledLFU`'s fixed sample size.
const VICTIM_SAMPLE_SIZE: usize = 5;

/// Fixed bookkeeping overhead charged against `max_cost` for every stored
/// item (the `StoredItem` header itself) unless `ignore_internal_cost`
/// opts out of it.
const ITEM_INTERNAL_COST: i64 = 1;

/// One request sent to the mutator. `Wait` carries no data mutation; it is
/// the quiescence marker described in the design notes — when it is
/// processed, every op enqueued before it has been applied.
pub enum MutationOp<V> {
    New {
        key: u64,
        conflict: u64,
        value: V,
        cost: i64,
        expiration: u64,
    },
    Update {
        key: u64,
        conflict: u64,
        value: V,
        cost: i64,
        expiration: u64,
    },
    Delete {
        key: u64,
        conflict: u64,
    },
    Wait(oneshot::Sender<()>),
}

type EvictHook<V> = Arc<dyn Fn(u64, u64, &V, i64) + Send + Sync>;
type ExitHook<V> = Arc<dyn Fn(Option<&V>) + Send + Sync>;
type ShouldUpdateHook<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;
type CostHook<V> = Arc<dyn Fn(&V) -> i64 + Send + Sync>;

/// Callbacks the cache facade may install. `on_evict`/`on_reject` fire
/// before `on_exit` for the same item, per the resolved open question.
#[derive(Clone)]
pub struct Hooks<V> {
    pub on_evict: Option<EvictHook<V>>,
    pub on_reject: Option<EvictHook<V>>,
    pub on_exit: Option<ExitHook<V>>,
    /// Consulted on `Update`: skip the update outright when this returns
    /// `false`, given the incoming value and the one currently stored.
    pub should_update: Option<ShouldUpdateHook<V>>,
    /// Deferred cost computation: invoked on `New`/`Update` only when the
    /// caller passed a cost of `0`, per the design note on this exact
    /// behavior.
    pub cost: Option<CostHook<V>>,
}

impl<V> Default for Hooks<V> {
    fn default() -> Self {
        Self { on_evict: None, on_reject: None, on_exit: None, should_update: None, cost: None }
    }
}

pub struct MutatorHandle<V> {
    tx: mpsc::Sender<MutationOp<V>>,
}

impl<V> Clone for MutatorHandle<V> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<V: Send + 'static> MutatorHandle<V> {
    pub fn send(&self, op: MutationOp<V>) -> bool {
        self.tx.try_send(op).is_ok()
    }

    /// Blocks until every op enqueued before this call has been applied.
    pub async fn wait(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(MutationOp::Wait(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Spawns the mutator task. Returns the handle callers use to enqueue ops
/// and the `JoinHandle` for shutdown coordination.
#[allow(clippy::too_many_arguments)]
pub fn spawn_mutator<V>(
    store: Arc<Store<V>>,
    policy: Arc<Policy>,
    ttl: Arc<TtlIndex>,
    hooks: Hooks<V>,
    metrics: Arc<Metrics>,
    ttl_ticker: Duration,
    channel_capacity: usize,
    ignore_internal_cost: bool,
    shutdown: CancellationToken,
) -> (MutatorHandle<V>, tokio::task::JoinHandle<()>)
where
    V: Clone + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::channel::<MutationOp<V>>(channel_capacity.max(1));

    let handle = tokio::task::spawn(async move {
        info!(component = "mutator", event = "started", "mutator worker started");
        let mut ticker = tokio::time::interval(ttl_ticker);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    while let Ok(op) = rx.try_recv() {
                        apply(&store, &policy, &ttl, &hooks, &metrics, op, ignore_internal_cost);
                    }
                    break;
                }
                _ = ticker.tick() => {
                    sweep_expired(&store, &policy, &ttl, &hooks);
                }
                maybe_op = rx.recv() => {
                    match maybe_op {
                        Some(op) => apply(&store, &policy, &ttl, &hooks, &metrics, op, ignore_internal_cost),
                        None => break,
                    }
                }
            }
        }
        info!(component = "mutator", event = "stopped", "mutator worker stopped");
    });

    (MutatorHandle { tx }, handle)
}

#[allow(clippy::too_many_arguments)]
fn apply<V: Clone>(
    store: &Store<V>,
    policy: &Policy,
    ttl: &TtlIndex,
    hooks: &Hooks<V>,
    metrics: &Metrics,
    op: MutationOp<V>,
    ignore_internal_cost: bool,
) {
    match op {
        MutationOp::New { key, conflict, value, cost, expiration } => {
            apply_new(store, policy, ttl, hooks, metrics, key, conflict, value, cost, expiration, ignore_internal_cost);
        }
        MutationOp::Update { key, conflict, value, cost, expiration } => {
            let cost = resolve_cost(hooks, cost, &value);
            let existing = store.get(key, conflict);
            let allowed = match (&hooks.should_update, &existing) {
                (Some(cb), Some(prev)) => cb(&value, &prev.value),
                _ => true,
            };
            let updated = if allowed && policy.update_if_has(key, cost) {
                let (ok, old_exp) = store.update(key, conflict, value.clone(), expiration);
                if ok {
                    ttl.update(key, conflict, old_exp.unwrap_or(0), expiration);
                }
                ok
            } else {
                false
            };
            if let Some(cb) = &hooks.on_exit {
                cb(if updated { Some(&value) } else { None });
            }
        }
        MutationOp::Delete { key, conflict } => {
            policy.del(key);
            if let Some((_, old_exp)) = store.remove(key, conflict) {
                ttl.remove(key, old_exp);
            }
            if let Some(cb) = &hooks.on_exit {
                cb(None);
            }
        }
        MutationOp::Wait(done) => {
            let _ = done.send(());
        }
    }
}

/// Invokes the deferred cost hook when the caller passed a cost of `0`,
/// per spec's design note that `cost(value)` is only consulted in that case.
fn resolve_cost<V>(hooks: &Hooks<V>, cost: i64, value: &V) -> i64 {
    if cost == 0 {
        hooks.cost.as_ref().map(|f| f(value)).unwrap_or(cost)
    } else {
        cost
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_new<V: Clone>(
    store: &Store<V>,
    policy: &Policy,
    ttl: &TtlIndex,
    hooks: &Hooks<V>,
    metrics: &Metrics,
    key: u64,
    conflict: u64,
    value: V,
    cost: i64,
    expiration: u64,
    ignore_internal_cost: bool,
) {
    let cost = resolve_cost(hooks, cost, &value);
    let effective_cost = if ignore_internal_cost {
        cost
    } else {
        cost + ITEM_INTERNAL_COST
    };

    // An item costing more than the entire budget can never fit, no matter
    // how many lower-priority keys get evicted; reject it outright rather
    // than letting the sampling loop chew through the whole cache trying.
    if effective_cost > policy.max_cost() {
        metrics.add(MetricKind::SetsRejected, key, 1);
        if let Some(cb) = &hooks.on_reject {
            cb(key, conflict, &value, cost);
        }
        if let Some(cb) = &hooks.on_exit {
            cb(Some(&value));
        }
        return;
    }

    if policy.room() >= effective_cost {
        policy.add(key, effective_cost);
        let (applied, old) = store.set(StoredItem { key, conflict, value: value.clone(), expiration });
        if applied {
            ttl.add(key, conflict, expiration);
            if let Some(old_exp) = old {
                ttl.remove(key, old_exp);
            }
            metrics.add(MetricKind::KeysAdded, key, 1);
            metrics.add(MetricKind::CostAdded, key, effective_cost.max(0) as u64);
        } else {
            // A hash collision on `key` occupies the slot with a different
            // conflict: undo the cost tracking we just reserved and treat
            // this as a rejection rather than leaving policy/store out of
            // sync.
            policy.del(key);
            metrics.add(MetricKind::SetsRejected, key, 1);
            if let Some(cb) = &hooks.on_reject {
                cb(key, conflict, &value, cost);
            }
        }
        if let Some(cb) = &hooks.on_exit {
            cb(Some(&value));
        }
        return;
    }

    // Not enough room: sample candidates tracked by the policy and evict the
    // weakest one if the incoming item's estimate is no worse, or reject the
    // newcomer outright if it loses the comparison.
    let candidates = policy.sample(VICTIM_SAMPLE_SIZE);
    let incoming_estimate = policy.estimate(key);

    match Policy::pick_victim(&candidates) {
        Some(victim) if incoming_estimate >= victim.estimate => {
            let victim_key = victim.key;
            let victim_conflict = victim.conflict;
            let victim_cost = victim.cost;
            let victim_value = store.get(victim_key, victim_conflict).map(|item| item.value);
            policy.del(victim_key);
            if let Some((_, old_exp)) = store.remove(victim_key, victim_conflict) {
                ttl.remove(victim_key, old_exp);
            }
            if let (Some(cb), Some(v)) = (&hooks.on_evict, &victim_value) {
                cb(victim_key, victim_conflict, v, victim_cost);
            }
            if let Some(cb) = &hooks.on_exit {
                cb(victim_value.as_ref());
            }
            apply_new(store, policy, ttl, hooks, metrics, key, conflict, value, cost, expiration, ignore_internal_cost);
        }
        _ => {
            metrics.add(MetricKind::SetsRejected, key, 1);
            if let Some(cb) = &hooks.on_reject {
                cb(key, conflict, &value, cost);
            }
            if let Some(cb) = &hooks.on_exit {
                cb(Some(&value));
            }
        }
    }
}

fn sweep_expired<V: Clone>(store: &Store<V>, policy: &Policy, ttl: &TtlIndex, hooks: &Hooks<V>) {
    let expired = ttl.sweep(crate::ttl::now_unix_secs());
    if expired.is_empty() {
        return;
    }
    warn!(component = "mutator", event = "ttl_sweep", count = expired.len(), "sweeping expired keys");
    for (key, conflict) in expired {
        let value = store.get(key, conflict).map(|item| item.value);
        policy.del(key);
        store.remove(key, conflict);
        if let Some(cb) = &hooks.on_exit {
            cb(value.as_ref());
        }
    }
}
