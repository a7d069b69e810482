//! Alert lifecycle: the manager, its per-alert session and the console
//! commands that drive it.

pub mod commands;
mod controller;
mod session;
pub mod state;

pub use controller::AlertLifecycleManager;
pub use state::{AlertEvent, AlertSnapshot};
