//! # ember-evm
//!
//! A stack-based interpreter for EVM bytecode (Homestead instruction set)
//! executing against a transient world-state model.
//!
//! A host builds a [`WorldState`](ember_state::WorldState), composes a
//! [`Transaction`], and hands the interpreter a callee to run:
//!
//! ```
//! use ember_evm::{Interpreter, NullLogSink, Transaction};
//! use ember_primitives::{Address, U256};
//! use ember_state::{InMemoryWorldState, WorldState};
//!
//! let mut world = InMemoryWorldState::new();
//! let caller = Address::from(1u64);
//! let callee = Address::from(2u64);
//! // PUSH1 13; PUSH1 0; RETURN -- returns 13 zero bytes
//! world.create(callee, U256::ZERO, vec![0x60, 0x0d, 0x60, 0x00, 0xf3]);
//!
//! let mut sink = NullLogSink;
//! let mut tx = Transaction::new(caller, &mut sink);
//! let result = Interpreter::new(&mut world, &mut tx).run(caller, callee, &[], 0, None);
//! assert_eq!(result.output.len(), 13);
//! ```
//!
//! No gas is metered: the `GAS` opcode reports the transaction's gas limit
//! and nothing ever runs out.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod frame;
mod interpreter;
mod memory;
mod opcode;
mod program;
mod stack;
mod trace;
mod transaction;

pub use address::create_address;
pub use error::{EvmError, EvmResult, ExecResult, ExitReason};
pub use frame::{ErrorBehavior, Frame, HaltBehavior, ReturnBehavior};
pub use interpreter::{Interpreter, MAX_CALL_DEPTH};
pub use memory::{Memory, MAX_MEM_SIZE};
pub use opcode::Opcode;
pub use program::Program;
pub use stack::{Stack, MAX_STACK_SIZE};
pub use trace::{Trace, TraceEvent};
pub use transaction::{LogEntry, LogSink, NullLogSink, Transaction, VectorLogSink};
