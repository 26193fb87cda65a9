//! Batch planning for multi-record streaming phases

pub mod planner;

pub use planner::{plan_batch_size, seed_batch_size, BatchPlanner, MemoryEstimate, PlannerLimits};
