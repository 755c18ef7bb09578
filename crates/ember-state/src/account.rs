//! EVM accounts

use crate::StateError;
use ember_primitives::{Address, U256};

/// An account: address, nonce, balance, and contract code.
///
/// Code is write-once: it can be installed on a fresh account and is
/// immutable afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// The account's (masked) address
    pub address: Address,
    /// Transaction / creation counter
    pub nonce: u64,
    /// Balance in wei
    pub balance: U256,
    code: Vec<u8>,
}

impl Account {
    /// Creates an account.
    pub fn new(address: Address, nonce: u64, balance: U256, code: Vec<u8>) -> Self {
        Self {
            address,
            nonce,
            balance,
            code,
        }
    }

    /// The contract code.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Whether the account carries code.
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// Installs code on a codeless account; a second call is a no-op.
    pub fn set_code(&mut self, code: Vec<u8>) {
        if !self.has_code() {
            self.code = code;
        }
    }

    /// Bumps the nonce.
    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Debits `amount` from the balance.
    pub fn deduct(&mut self, amount: U256) -> Result<(), StateError> {
        if amount > self.balance {
            return Err(StateError::InsufficientFunds {
                amount,
                balance: self.balance,
            });
        }
        self.balance = self.balance - amount;
        Ok(())
    }

    /// Credits `amount` to the balance.
    pub fn credit(&mut self, amount: U256) -> Result<(), StateError> {
        self.balance = self.balance.checked_add(amount).ok_or(StateError::BalanceOverflow {
            amount,
            balance: self.balance,
        })?;
        Ok(())
    }
}
