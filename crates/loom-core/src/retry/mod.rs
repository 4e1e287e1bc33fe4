//! Retry module: backoff policy and the engine that applies it.

mod engine;
mod policy;

pub use engine::{Attempted, Retrier, RetryError, StopReason};
pub use policy::RetryPolicy;
