//! Runtime execution traces (for debugging)

use crate::opcode::Opcode;
use crate::stack::Stack;
use std::fmt;

/// One dispatched instruction: where, what, how deep, and the operand
/// stack as it looked before execution.
#[derive(Clone, Debug)]
pub struct TraceEvent {
    /// Program counter of the instruction
    pub pc: u64,
    /// Raw opcode byte (may be an unassigned byte about to fault)
    pub op: u8,
    /// Call depth at dispatch time (1 = root frame)
    pub depth: usize,
    /// Snapshot of the operand stack before the instruction ran
    pub stack: Stack,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Opcode::from_byte(self.op) {
            Some(op) => write!(f, "{} ({}): {:?}", self.pc, self.depth, op)?,
            None => write!(f, "{} ({}): 0x{:02x}", self.pc, self.depth, self.op)?,
        }
        for (i, value) in self.stack.iter().enumerate() {
            write!(f, "\n  {i}: {value}")?;
        }
        Ok(())
    }
}

/// A sequence of trace events collected across one run.
#[derive(Default)]
pub struct Trace {
    /// The collected events, oldest first
    pub events: Vec<TraceEvent>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn add(&mut self, pc: u64, op: u8, depth: usize, stack: Stack) {
        self.events.push(TraceEvent {
            pc,
            op,
            depth,
            stack,
        });
    }

    /// Discards all collected events.
    pub fn reset(&mut self) {
        self.events.clear();
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{event}")?;
        }
        Ok(())
    }
}
