//! EmberVM State
//!
//! The transient world-state model the interpreter executes against:
//! - `Account`: address, nonce, balance, and immutable-once-set code
//! - `Storage`: an account's 256-bit key-value store
//! - `Block`: current-block metadata
//! - `WorldState`: the trait the interpreter consumes, with per-frame
//!   snapshot support
//! - `InMemoryWorldState`: a map-backed implementation for hosts and tests

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod storage;
mod world;

pub use account::Account;
pub use storage::Storage;
pub use world::{AccountState, Block, InMemoryWorldState, WorldState};

use ember_primitives::U256;

/// Errors from balance bookkeeping
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A debit larger than the account balance
    #[error("insufficient funds to pay ({amount} > {balance})")]
    InsufficientFunds {
        /// Amount that was to be paid
        amount: U256,
        /// Balance it was to be paid from
        balance: U256,
    },
    /// A credit that would push the balance past 2^256 - 1
    #[error("balance overflow crediting {amount} on top of {balance}")]
    BalanceOverflow {
        /// Amount that was to be credited
        amount: U256,
        /// Balance it was to be credited to
        balance: U256,
    },
}
