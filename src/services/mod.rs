//! Classification services.
//!
//! The invoker, the fan-out coordinator and the consensus engine. Nothing in
//! here touches the memory store.

mod classification;
mod consensus;
mod fan_out;

pub use classification::ClassificationService;
pub use consensus::{MIN_SUCCESSFUL_ATTEMPTS, calculate_consensus, confidence_for_majority};
pub use fan_out::FanOutCoordinator;
