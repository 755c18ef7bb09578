//! The world-state interface and its in-memory implementation

use crate::{Account, Storage};
use ember_primitives::{Address, U256};
use std::collections::HashMap;

/// Metadata of the block a transaction executes in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Block number
    pub number: u64,
    /// Block difficulty
    pub difficulty: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Beneficiary of the block reward
    pub coinbase: Address,
}

/// An account together with its storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    /// The account
    pub account: Account,
    /// The account's storage
    pub storage: Storage,
}

/// The interpreter's view of the world.
///
/// Address lookups auto-create zero-valued, codeless accounts, which is
/// what `BALANCE` and `EXTCODESIZE` observe for never-seen addresses.
/// Snapshots delimit the state a failed child call rolls back; they nest
/// like a stack, so reverting or committing a snapshot discards every
/// snapshot taken after it.
pub trait WorldState {
    /// Whether an account exists at `address`.
    fn exists(&self, address: Address) -> bool;

    /// The account state at `address`, created zero-valued if absent.
    fn get(&mut self, address: Address) -> &mut AccountState;

    /// Creates (or replaces) the account at `address`.
    fn create(&mut self, address: Address, balance: U256, code: Vec<u8>) -> &mut AccountState;

    /// Removes the account at `address`.
    fn remove(&mut self, address: Address);

    /// The number of existing accounts.
    fn num_accounts(&self) -> usize;

    /// The current block's metadata.
    fn current_block(&self) -> &Block;

    /// The hash of one of the previous 256 blocks.
    ///
    /// The default implementation knows no history and returns zero; a host
    /// with real chain data overrides this.
    fn block_hash(&self, offset: u8) -> U256 {
        let _ = offset;
        U256::ZERO
    }

    /// Marks the current state; returns a token for revert or commit.
    fn snapshot(&mut self) -> usize;

    /// Restores the state at `snapshot` and discards it and everything after.
    fn revert_to_snapshot(&mut self, snapshot: usize);

    /// Discards `snapshot` and everything after, keeping the current state.
    fn commit_snapshot(&mut self, snapshot: usize);
}

/// A map-backed world state for hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryWorldState {
    accounts: HashMap<Address, AccountState>,
    block: Block,
    snapshots: Vec<HashMap<Address, AccountState>>,
}

impl InMemoryWorldState {
    /// Creates an empty world with a default block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty world with the given block metadata.
    pub fn with_block(block: Block) -> Self {
        Self {
            block,
            ..Self::default()
        }
    }
}

impl WorldState for InMemoryWorldState {
    fn exists(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    fn get(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_insert_with(|| AccountState {
            account: Account::new(address, 0, U256::ZERO, Vec::new()),
            storage: Storage::new(),
        })
    }

    fn create(&mut self, address: Address, balance: U256, code: Vec<u8>) -> &mut AccountState {
        self.accounts.insert(
            address,
            AccountState {
                account: Account::new(address, 0, balance, code),
                storage: Storage::new(),
            },
        );
        self.get(address)
    }

    fn remove(&mut self, address: Address) {
        self.accounts.remove(&address);
    }

    fn num_accounts(&self) -> usize {
        self.accounts.len()
    }

    fn current_block(&self) -> &Block {
        &self.block
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.accounts.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, snapshot: usize) {
        if let Some(saved) = self.snapshots.get(snapshot) {
            self.accounts = saved.clone();
            self.snapshots.truncate(snapshot);
        }
    }

    fn commit_snapshot(&mut self, snapshot: usize) {
        self.snapshots.truncate(snapshot);
    }
}
