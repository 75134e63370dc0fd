//! Application layer coordinating the order and payment aggregates.
//!
//! [`orchestrator::OrderOrchestrator`] is the entry point for every use case the
//! boundary exposes: creating, paying, confirming, updating and cancelling orders.

pub mod orchestrator;
