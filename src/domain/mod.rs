//! Aggregates, value objects, domain services and the ports they depend on.

pub mod money;
pub mod order;
pub mod order_service;
pub mod payment;
pub mod payment_service;
pub mod ports;
pub mod product;
