//! Adapters between the outside world and the application layer: CSV input and the
//! JSON views printed by the binary.

pub mod csv;
pub mod view;
