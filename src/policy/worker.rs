//! The admission-push worker: a single consumer task draining a bounded
//! (capacity 3) channel of read-hit batches into the policy's TinyLFU
//! filter, the same fixed-worker tick-loop shape as the teacher's
//! `workers/evictor/evictor.rs`, minus its governor/replica-scaling layer —
//! this cache runs exactly one such worker, not a scalable pool.

use super::Policy;
use crate::buffer::Consumer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const CHANNEL_CAPACITY: usize = 3;

/// Handed to the read buffer as its [`Consumer`]; every full stripe it
/// receives is forwarded to the worker over the bounded channel. A `push`
/// that cannot buffer the batch without blocking is dropped, matching the
/// "lossy by design" contract of the admission-push path.
pub struct PushHandle {
    tx: mpsc::Sender<Vec<u64>>,
}

impl Consumer for PushHandle {
    fn push(&self, keys: Vec<u64>) -> bool {
        self.tx.try_send(keys).is_ok()
    }
}

/// Spawns the worker and returns the [`PushHandle`] side of its channel.
/// The worker exits once `shutdown` is cancelled and the channel drains.
pub fn spawn_admission_push_worker(
    policy: Arc<Policy>,
    shutdown: CancellationToken,
) -> (PushHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Vec<u64>>(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn(async move {
        info!(component = "policy", event = "push_worker_started", "admission-push worker started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    while let Ok(batch) = rx.try_recv() {
                        policy.push(&batch);
                    }
                    break;
                }
                maybe_batch = rx.recv() => {
                    match maybe_batch {
                        Some(batch) => policy.push(&batch),
                        None => break,
                    }
                }
            }
        }
        info!(component = "policy", event = "push_worker_stopped", "admission-push worker stopped");
    });

    (PushHandle { tx }, handle)
}
