//! Chunk scheduler: bounded-concurrency dispatch with retry and backoff.
//!
//! All live task state is owned by a single coordinator task; the manager
//! talks to it over a command channel and workers report attempt results
//! over a result channel, so no task or queue state is ever shared across
//! threads. Failed attempts re-enter the queue with an eligibility time in
//! the future; exhausted chunks settle their task as Failed.

mod admit;
mod apply;
mod coordinator;
mod queue;

pub(crate) use coordinator::{Command, Coordinator, EnqueueSpec};
