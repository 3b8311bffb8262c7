//! Invocation handler for the uniqueport Lambda function
//!
//! Each event is logged, handed to the bundled `uniqueport` executable as a
//! single JSON argument, and resolved from the executable's exit status.

pub mod dump;
pub mod handler;
pub mod launcher;

pub use dump::DumpLimits;
pub use handler::InvocationHandler;
pub use launcher::{Launcher, LauncherConfig, DEFAULT_PROGRAM};
