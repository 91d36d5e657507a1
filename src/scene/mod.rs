//! Scene execution engine
//!
//! This module handles:
//! - Resolving scenes from a device's stored collection
//! - Forwarding single commands to the owning controller
//! - Running a scene's commands in PARALLEL, SERIES or WATERFALL mode
//! - Aggregating per-command results into the run outcome

mod aggregate;
mod executor;
mod forwarder;
pub mod lookup;
mod run_state;

pub use executor::ModeExecutor;
pub use forwarder::CommandForwarder;
pub use lookup::DeviceDirectory;
