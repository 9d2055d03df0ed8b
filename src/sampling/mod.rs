pub mod controller;
pub mod retry;
pub mod timeslot;

pub use controller::{SamplingController, SamplingSettings};
