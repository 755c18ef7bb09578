//! EVM error types and execution results

use ember_primitives::U256;
use ember_state::StateError;
use thiserror::Error;

/// Faults raised by bytecode execution.
///
/// These never cross the public `run` boundary; every fault is routed to
/// the faulting frame's error behavior and, at the root, recorded in the
/// [`ExecResult`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    /// Memory address overflow or cap, PC past code end, call depth, or a
    /// stack operand outside the u64 range
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// A transfer larger than the payer's balance
    #[error("insufficient funds to pay ({amount} > {balance})")]
    OutOfFunds {
        /// Amount that was to be paid
        amount: U256,
        /// Balance it was to be paid from
        balance: U256,
    },

    /// A transfer that would push the recipient's balance past 2^256 - 1
    #[error("balance overflow crediting {amount} on top of {balance}")]
    Overflow {
        /// Amount that was to be credited
        amount: U256,
        /// Balance it was to be credited to
        balance: U256,
    },

    /// A jump outside the jump-destination set, or an unknown opcode
    #[error("illegal instruction: {0}")]
    IllegalInstruction(String),

    /// More than 1024 values on the operand stack
    #[error("stack overflow (max 1024)")]
    StackOverflow,

    /// A pop from an empty stack, or dup/swap deeper than the stack
    #[error("stack underflow")]
    StackUnderflow,

    /// A call into a precompiled contract (addresses 1 through 4)
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl From<StateError> for EvmError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::InsufficientFunds { amount, balance } => {
                EvmError::OutOfFunds { amount, balance }
            }
            StateError::BalanceOverflow { amount, balance } => {
                EvmError::Overflow { amount, balance }
            }
        }
    }
}

/// Result type for EVM operations
pub type EvmResult<T> = Result<T, EvmError>;

/// How the root frame left the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `RETURN` was invoked at the root
    Returned,
    /// `STOP`, `SELFDESTRUCT`, or end-of-code at the root
    Halted,
    /// A fault reached the root's error behavior
    Threw,
}

/// The outcome of one `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// How the root frame exited
    pub exit_reason: ExitReason,
    /// Bytes produced by a root-level `RETURN` (empty otherwise)
    pub output: Vec<u8>,
    /// The fault, when `exit_reason` is `Threw`
    pub error: Option<EvmError>,
}

impl ExecResult {
    /// A result for a root frame that returned data.
    pub fn returned(output: Vec<u8>) -> Self {
        Self {
            exit_reason: ExitReason::Returned,
            output,
            error: None,
        }
    }

    /// A result for a root frame that halted.
    pub fn halted() -> Self {
        Self {
            exit_reason: ExitReason::Halted,
            output: Vec::new(),
            error: None,
        }
    }

    /// A result for a root frame that faulted.
    pub fn threw(error: EvmError) -> Self {
        Self {
            exit_reason: ExitReason::Threw,
            output: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether execution completed without a fault.
    pub fn succeeded(&self) -> bool {
        self.exit_reason != ExitReason::Threw
    }

    /// The fault message, when there is one.
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}
