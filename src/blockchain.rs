// Thin re-export module: block types and the minter live in `blockchain/chain.rs`,
// account types in `blockchain/state.rs`, proposal checks in `blockchain/validation.rs`.

pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
