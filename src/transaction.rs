//! Transaction module split into types, validation and the transfer processor

pub mod processor;
pub mod types;
pub mod validation;

pub use processor::apply_transfer;
pub use types::*;
