//! Background detection of alerts resolved on the responder side.

mod controller;
mod loop_worker;

pub use controller::ResolutionPoller;
