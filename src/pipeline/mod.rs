//! Pipeline execution.
//!
//! ## Data Flow
//!
//! ```text
//! request ──▶ integrity check ──▶ route ──▶ step 1 ──▶ … ──▶ step n ──▶ output
//!                                  (direct      │ normalize text inputs
//!                                  or BFS)      │ temp intermediates
//! ```
//!
//! 1. [`executor`]: one request (verification, routing, step execution)
//! 2. [`cleanup`]: the guard that owns and deletes intermediates
//! 3. [`batch`]: sequential runner with progress events and cancellation

pub(crate) mod batch;
pub mod cleanup;
pub(crate) mod executor;
