//! Construction-time errors. Runtime operations (`get`/`set`/`del`) stay
//! infallible — a rejected `set` is observable only through metrics and the
//! `on_reject` hook, not a `Result`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("num_counters must be greater than zero")]
    NumCountersZero,

    #[error("max_cost must be greater than zero")]
    MaxCostZero,

    #[error("buffer_items must be greater than zero")]
    BufferItemsZero,
}
