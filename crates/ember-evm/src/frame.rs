//! Call frames and their continuation behaviors

use crate::memory::Memory;
use crate::program::Program;
use crate::stack::Stack;
use ember_primitives::Address;

/// What happens in the parent when a frame's code invokes `RETURN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnBehavior {
    /// Record the returned bytes in the run's result (root frame)
    RecordAtRoot,
    /// Copy the returned bytes into the parent's output region, zero-padded
    /// to `out_size`, then push 1 onto the parent's stack (CALL family)
    CopyToParent {
        /// Index of the parent frame in the interpreter's arena
        parent: usize,
        /// Destination offset in the parent's memory
        out_offset: u64,
        /// Number of bytes written into the parent's memory
        out_size: u64,
    },
    /// Install the returned bytes as the created account's code, then push
    /// the created address onto the parent's stack (CREATE)
    InstallCode {
        /// Index of the parent frame in the interpreter's arena
        parent: usize,
        /// The address derived for the created account
        created: Address,
    },
}

/// What happens in the parent when a frame halts (`STOP`, `SELFDESTRUCT`,
/// or running off the end of its code).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HaltBehavior {
    /// Record a halt in the run's result (root frame)
    RecordAtRoot,
    /// Push 0 onto the parent's stack
    PushZero {
        /// Index of the parent frame in the interpreter's arena
        parent: usize,
    },
}

/// What happens in the parent when a frame's dispatch faults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorBehavior {
    /// Record the fault in the run's result (root frame)
    RecordAtRoot,
    /// Push 0 onto the parent's stack
    PushZero {
        /// Index of the parent frame in the interpreter's arena
        parent: usize,
    },
}

/// One call's execution state.
///
/// A frame exclusively owns its program, operand stack, memory, and
/// program counter. The callee address identifies the account whose
/// storage and balance the frame's code acts on; for `CALLCODE` and
/// `DELEGATECALL` children that account is the parent's, while the code
/// comes from elsewhere.
pub struct Frame {
    /// Address of the account that invoked this frame
    pub caller: Address,
    /// Address of the account this frame acts on
    pub callee: Address,
    /// Input bytes (`CALLDATA*`)
    pub input: Vec<u8>,
    /// Value reported by `CALLVALUE`
    pub call_value: u64,
    /// The code being executed, with its jump-destination set
    pub program: Program,
    /// Frame-local linear memory
    pub memory: Memory,
    /// Operand stack
    pub stack: Stack,
    /// Continuation on `RETURN`
    pub on_return: ReturnBehavior,
    /// Continuation on halt
    pub on_halt: HaltBehavior,
    /// Continuation on fault
    pub on_error: ErrorBehavior,
    /// World-state snapshot delimiting this frame's effects (child frames
    /// only; the root does not journal)
    pub snapshot: Option<usize>,
    pc: u64,
    pc_dirty: bool,
}

impl Frame {
    /// Creates a frame with the PC at the start of the code.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: Address,
        callee: Address,
        input: Vec<u8>,
        call_value: u64,
        program: Program,
        on_return: ReturnBehavior,
        on_halt: HaltBehavior,
        on_error: ErrorBehavior,
        snapshot: Option<usize>,
    ) -> Self {
        Self {
            caller,
            callee,
            input,
            call_value,
            program,
            memory: Memory::new(),
            stack: Stack::new(),
            on_return,
            on_halt,
            on_error,
            snapshot,
            pc: 0,
            pc_dirty: false,
        }
    }

    /// The current program counter.
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Redirects the PC (JUMP, JUMPI, PUSH) and suppresses the post-step
    /// increment.
    pub fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
        self.pc_dirty = true;
    }

    /// Advances the PC by one unless the last instruction redirected it.
    pub fn step(&mut self) {
        if self.pc_dirty {
            self.pc_dirty = false;
        } else {
            self.pc += 1;
        }
    }

    /// Whether the PC still points inside the code.
    pub fn pc_in_code(&self) -> bool {
        self.pc < self.program.len()
    }

    /// The opcode byte at the current PC.
    pub fn current_op(&self) -> u8 {
        self.program.code()[self.pc as usize]
    }
}
