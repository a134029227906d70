pub mod diff;
pub mod worker;

pub use diff::{reconcile, Reconciliation};
pub use worker::{CyclePhase, CycleReport, SubscriberOutcome, Worker};
