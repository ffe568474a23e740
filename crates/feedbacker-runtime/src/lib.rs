//! # feedbacker-runtime
//!
//! Orchestration engine for staged marking.
//!
//! Controllers sequence the stages of `feedbacker-core`, run long stage
//! logic on background workers and fold every result into the model on
//! the controlling thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedbacker_runtime::{Scorer, StageController};
//!
//! let mut scorer = Scorer::new(config, &handlers, model, Box::new(view), "student42")?;
//! scorer.execute_first_stage()?;
//! scorer.wait_for_workers()?;
//!
//! println!("score: {}", scorer.score());
//! ```

pub mod controller;
pub mod worker;

#[cfg(test)]
mod testing;

pub use controller::{Deleter, Engine, Marker, Scorer, StageController};
pub use worker::{spawn_worker, SharedHandler, WorkerEvent};
