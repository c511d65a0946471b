// Thin re-export module: implementation is in `blockchain/core.rs`, split into the block
// record, derived balances, acceptance rules and the chain aggregate.

pub mod core;
pub use core::*;
