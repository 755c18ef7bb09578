//! The fetch-decode-execute loop

use crate::address::create_address;
use crate::error::{EvmError, EvmResult, ExecResult};
use crate::frame::{ErrorBehavior, Frame, HaltBehavior, ReturnBehavior};
use crate::opcode::Opcode;
use crate::program::Program;
use crate::trace::Trace;
use crate::transaction::{LogEntry, Transaction};
use ember_crypto::keccak256;
use ember_primitives::{Address, U256};
use ember_state::WorldState;
use tracing::debug;

/// Maximum number of live frames; pushing one more faults.
pub const MAX_CALL_DEPTH: usize = 1024;

/// The execution engine.
///
/// Owns a LIFO arena of [`Frame`]s; the top frame is active. Opcode
/// handlers return `Result` instead of unwinding, and the loop routes each
/// fault to the faulting frame's error behavior. Frames reference each
/// other by arena index through their continuation behaviors, never by
/// pointer.
pub struct Interpreter<'a, 's> {
    world: &'a mut dyn WorldState,
    tx: &'a mut Transaction<'s>,
    frames: Vec<Frame>,
    outcome: Option<ExecResult>,
}

impl<'a, 's> Interpreter<'a, 's> {
    /// Creates an interpreter over a world state and a transaction.
    pub fn new(world: &'a mut dyn WorldState, tx: &'a mut Transaction<'s>) -> Self {
        Self {
            world,
            tx,
            frames: Vec::new(),
            outcome: None,
        }
    }

    /// Runs the callee's code to completion.
    ///
    /// Faults never escape: every outcome is reported through the returned
    /// [`ExecResult`]. Afterwards, accounts scheduled by `SELFDESTRUCT`
    /// are swept from the world state.
    pub fn run(
        &mut self,
        caller: Address,
        callee: Address,
        input: &[u8],
        call_value: u64,
        mut tracer: Option<&mut Trace>,
    ) -> ExecResult {
        self.frames.clear();
        self.outcome = None;

        let code = self.world.get(callee).account.code().to_vec();
        self.frames.push(Frame::new(
            caller,
            callee,
            input.to_vec(),
            call_value,
            Program::new(code),
            ReturnBehavior::RecordAtRoot,
            HaltBehavior::RecordAtRoot,
            ErrorBehavior::RecordAtRoot,
            None,
        ));

        while !self.frames.is_empty() {
            let idx = self.frames.len() - 1;
            if !self.frames[idx].pc_in_code() {
                // running off the end of code halts the frame
                self.finish_halt();
                continue;
            }
            match self.step(idx, tracer.as_deref_mut()) {
                Ok(()) => {
                    // the dispatching frame may have been popped, or a child
                    // pushed above it; only a surviving frame advances
                    if let Some(frame) = self.frames.get_mut(idx) {
                        frame.step();
                    }
                }
                Err(err) => self.fault_frame(err),
            }
        }

        // sweep the transaction's destroy list once the run is over
        for address in self.tx.destroy_list.drain(..) {
            self.world.remove(address);
        }

        self.outcome.take().unwrap_or_else(ExecResult::halted)
    }

    fn step(&mut self, idx: usize, tracer: Option<&mut Trace>) -> EvmResult<()> {
        let frame = &self.frames[idx];
        let op_byte = frame.current_op();
        if let Some(trace) = tracer {
            trace.add(frame.pc(), op_byte, self.frames.len(), frame.stack.clone());
        }
        let op = Opcode::from_byte(op_byte).ok_or_else(|| self.unknown_opcode(idx, op_byte))?;
        self.execute(idx, op)
    }

    fn unknown_opcode(&self, idx: usize, byte: u8) -> EvmError {
        let frame = &self.frames[idx];
        EvmError::IllegalInstruction(format!(
            "unknown opcode 0x{byte:02x} at position {} in {}, at call depth {}, called by {}",
            frame.pc(),
            frame.callee,
            self.frames.len(),
            frame.caller,
        ))
    }

    fn execute(&mut self, idx: usize, op: Opcode) -> EvmResult<()> {
        match op {
            Opcode::STOP => {
                self.finish_halt();
                Ok(())
            }

            // Arithmetic
            Opcode::ADD => self.binary_op(idx, |x, y| x + y),
            Opcode::MUL => self.binary_op(idx, |x, y| x * y),
            Opcode::SUB => self.binary_op(idx, |x, y| x - y),
            Opcode::DIV => self.binary_op(idx, |x, y| x.div_rem(y).0),
            Opcode::SDIV => self.binary_op(idx, U256::sdiv),
            Opcode::MOD => self.binary_op(idx, |x, y| x.div_rem(y).1),
            Opcode::SMOD => self.binary_op(idx, U256::smod),
            Opcode::ADDMOD => self.ternary_op(idx, U256::add_mod),
            Opcode::MULMOD => self.ternary_op(idx, U256::mul_mod),
            Opcode::EXP => {
                let frame = &mut self.frames[idx];
                let base = frame.stack.pop()?;
                let exponent = frame.stack.pop_u64()?;
                frame.stack.push(base.pow(exponent))
            }
            Opcode::SIGNEXTEND => {
                let frame = &mut self.frames[idx];
                let index = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let result = match index.to_u64() {
                    Some(i) if i < 32 => value.sign_extend(i as u32),
                    _ => value,
                };
                frame.stack.push(result)
            }

            // Comparison & bitwise
            Opcode::LT => self.compare_op(idx, |x, y| x < y),
            Opcode::GT => self.compare_op(idx, |x, y| x > y),
            Opcode::SLT => self.compare_op(idx, |x, y| x.signed_lt(y)),
            Opcode::SGT => self.compare_op(idx, |x, y| y.signed_lt(x)),
            Opcode::EQ => self.compare_op(idx, |x, y| x == y),
            Opcode::ISZERO => {
                let frame = &mut self.frames[idx];
                let x = frame.stack.pop()?;
                frame.stack.push(bool_word(x.is_zero()))
            }
            Opcode::AND => self.binary_op(idx, |x, y| x & y),
            Opcode::OR => self.binary_op(idx, |x, y| x | y),
            Opcode::XOR => self.binary_op(idx, |x, y| x ^ y),
            Opcode::NOT => {
                let frame = &mut self.frames[idx];
                let x = frame.stack.pop()?;
                frame.stack.push(!x)
            }
            Opcode::BYTE => {
                let frame = &mut self.frames[idx];
                let index = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let result = match index.to_u64() {
                    Some(i) if i < 32 => U256::from(value.byte(i as usize) as u64),
                    _ => U256::ZERO,
                };
                frame.stack.push(result)
            }

            Opcode::SHA3 => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let size = frame.stack.pop_u64()?;
                let data = frame.memory.read(offset, size)?;
                frame.stack.push(U256::from_big_endian(&keccak256(&data)))
            }

            // Environmental information
            Opcode::ADDRESS => {
                let callee = self.frames[idx].callee;
                self.frames[idx].stack.push(callee)
            }
            Opcode::BALANCE => {
                let target = self.frames[idx].stack.pop_address()?;
                let balance = self.world.get(target).account.balance;
                self.frames[idx].stack.push(balance)
            }
            Opcode::ORIGIN => {
                let origin = self.tx.origin;
                self.frames[idx].stack.push(origin)
            }
            Opcode::CALLER => {
                let caller = self.frames[idx].caller;
                self.frames[idx].stack.push(caller)
            }
            Opcode::CALLVALUE => {
                let value = U256::from(self.frames[idx].call_value);
                self.frames[idx].stack.push(value)
            }
            Opcode::CALLDATALOAD => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                offset.checked_add(32).ok_or_else(|| {
                    EvmError::OutOfBounds(format!(
                        "integer overflow in calldata access ({offset} + 32)"
                    ))
                })?;
                let mut word = [0u8; 32];
                for (i, byte) in word.iter_mut().enumerate() {
                    let j = offset + i as u64;
                    if j < frame.input.len() as u64 {
                        *byte = frame.input[j as usize];
                    }
                }
                frame.stack.push(U256::from_big_endian(&word))
            }
            Opcode::CALLDATASIZE => {
                let size = self.frames[idx].input.len() as u64;
                self.frames[idx].stack.push(U256::from(size))
            }
            Opcode::CALLDATACOPY => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let src_offset = frame.stack.pop_u64()?;
                let size = frame.stack.pop_u64()?;
                frame.memory.copy_in(offset, &frame.input, src_offset, size, 0)
            }
            Opcode::CODESIZE => {
                let size = self.frames[idx].program.len();
                self.frames[idx].stack.push(U256::from(size))
            }
            Opcode::CODECOPY => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let src_offset = frame.stack.pop_u64()?;
                let size = frame.stack.pop_u64()?;
                // out-of-code bytes read as STOP
                frame.memory.copy_in(
                    offset,
                    frame.program.code(),
                    src_offset,
                    size,
                    Opcode::STOP as u8,
                )
            }
            Opcode::GASPRICE => {
                let price = U256::from(self.tx.gas_price);
                self.frames[idx].stack.push(price)
            }
            Opcode::EXTCODESIZE => {
                let target = self.frames[idx].stack.pop_address()?;
                let size = self.world.get(target).account.code().len() as u64;
                self.frames[idx].stack.push(U256::from(size))
            }
            Opcode::EXTCODECOPY => {
                let target = self.frames[idx].stack.pop_address()?;
                let code = self.world.get(target).account.code().to_vec();
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let src_offset = frame.stack.pop_u64()?;
                let size = frame.stack.pop_u64()?;
                frame
                    .memory
                    .copy_in(offset, &code, src_offset, size, Opcode::STOP as u8)
            }

            // Block information
            Opcode::BLOCKHASH => {
                let index = self.frames[idx].stack.pop_u64()?;
                let hash = if index >= 256 {
                    U256::ZERO
                } else {
                    self.world.block_hash(index as u8)
                };
                self.frames[idx].stack.push(hash)
            }
            Opcode::COINBASE => {
                let coinbase = self.world.current_block().coinbase;
                self.frames[idx].stack.push(coinbase)
            }
            Opcode::TIMESTAMP => {
                let timestamp = self.world.current_block().timestamp;
                self.frames[idx].stack.push(U256::from(timestamp))
            }
            Opcode::NUMBER => {
                let number = self.world.current_block().number;
                self.frames[idx].stack.push(U256::from(number))
            }
            Opcode::DIFFICULTY => {
                let difficulty = self.world.current_block().difficulty;
                self.frames[idx].stack.push(U256::from(difficulty))
            }
            Opcode::GASLIMIT => {
                let gas_limit = self.world.current_block().gas_limit;
                self.frames[idx].stack.push(U256::from(gas_limit))
            }

            // Stack, memory, storage, flow
            Opcode::POP => {
                self.frames[idx].stack.pop()?;
                Ok(())
            }
            Opcode::MLOAD => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let word = frame.memory.read_word(offset)?;
                frame.stack.push(word)
            }
            Opcode::MSTORE => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let word = frame.stack.pop()?;
                frame.memory.write_word(offset, word)
            }
            Opcode::MSTORE8 => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let value = frame.stack.pop()?;
                frame.memory.write_byte(offset, value.byte(31))
            }
            Opcode::SLOAD => {
                let key = self.frames[idx].stack.pop()?;
                let callee = self.frames[idx].callee;
                let value = self.world.get(callee).storage.load(key);
                self.frames[idx].stack.push(value)
            }
            Opcode::SSTORE => {
                let frame = &mut self.frames[idx];
                let key = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let callee = frame.callee;
                let storage = &mut self.world.get(callee).storage;
                if value.is_zero() {
                    storage.remove(key);
                } else {
                    storage.store(key, value);
                }
                Ok(())
            }
            Opcode::JUMP => {
                let target = self.frames[idx].stack.pop_u64()?;
                self.jump_to(idx, target)
            }
            Opcode::JUMPI => {
                let frame = &mut self.frames[idx];
                let target = frame.stack.pop_u64()?;
                let condition = frame.stack.pop()?;
                if condition.is_zero() {
                    Ok(())
                } else {
                    self.jump_to(idx, target)
                }
            }
            Opcode::PC => {
                let pc = self.frames[idx].pc();
                self.frames[idx].stack.push(U256::from(pc))
            }
            Opcode::MSIZE => {
                let size = self.frames[idx].memory.size_words() * 32;
                self.frames[idx].stack.push(U256::from(size))
            }
            Opcode::GAS => {
                // gas is not tracked; report the transaction's initial limit
                let gas = U256::from(self.tx.gas_limit);
                self.frames[idx].stack.push(gas)
            }
            Opcode::JUMPDEST => Ok(()),

            Opcode::CREATE => self.create(idx),
            Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL => self.call_like(idx, op),
            Opcode::RETURN => {
                let frame = &mut self.frames[idx];
                let offset = frame.stack.pop_u64()?;
                let size = frame.stack.pop_u64()?;
                let output = frame.memory.read(offset, size)?;
                self.finish_return(output);
                Ok(())
            }
            Opcode::SELFDESTRUCT => self.selfdestruct(idx),

            op if op.push_size() > 0 => self.push_immediate(idx, op.push_size() as u64),
            op if op.dup_depth() > 0 => self.frames[idx].stack.dup(op.dup_depth()),
            op if op.swap_depth() > 0 => self.frames[idx].stack.swap(op.swap_depth()),
            op if op.is_log() => self.log(idx, op.log_topics()),

            op => Err(self.unknown_opcode(idx, op as u8)),
        }
    }

    fn binary_op(&mut self, idx: usize, op: impl FnOnce(U256, U256) -> U256) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        let x = frame.stack.pop()?;
        let y = frame.stack.pop()?;
        frame.stack.push(op(x, y))
    }

    fn ternary_op(
        &mut self,
        idx: usize,
        op: impl FnOnce(U256, U256, U256) -> U256,
    ) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        let x = frame.stack.pop()?;
        let y = frame.stack.pop()?;
        let z = frame.stack.pop()?;
        frame.stack.push(op(x, y, z))
    }

    fn compare_op(&mut self, idx: usize, op: impl FnOnce(U256, U256) -> bool) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        let x = frame.stack.pop()?;
        let y = frame.stack.pop()?;
        frame.stack.push(bool_word(op(x, y)))
    }

    fn push_immediate(&mut self, idx: usize, count: u64) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        let pc = frame.pc();
        let end = pc.checked_add(count).ok_or_else(|| {
            EvmError::OutOfBounds(format!("integer overflow in push ({pc} + {count})"))
        })?;
        if end >= frame.program.len() {
            return Err(EvmError::OutOfBounds(format!(
                "push immediate exceeds size of program ({end} >= {})",
                frame.program.len()
            )));
        }
        let immediate =
            U256::from_big_endian(&frame.program.code()[(pc + 1) as usize..=end as usize]);
        frame.stack.push(immediate)?;
        frame.set_pc(end + 1);
        Ok(())
    }

    fn jump_to(&mut self, idx: usize, target: u64) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        if !frame.program.is_jump_dest(target) {
            return Err(EvmError::IllegalInstruction(format!(
                "{target} is not a jump destination"
            )));
        }
        frame.set_pc(target);
        Ok(())
    }

    fn log(&mut self, idx: usize, topic_count: usize) -> EvmResult<()> {
        let frame = &mut self.frames[idx];
        let offset = frame.stack.pop_u64()?;
        let size = frame.stack.pop_u64()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(frame.stack.pop()?);
        }
        let data = frame.memory.read(offset, size)?;
        let address = frame.callee;
        self.tx.log(LogEntry {
            address,
            data,
            topics,
        });
        Ok(())
    }

    /// Moves `amount` between two balances, checking funds and overflow.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> EvmResult<()> {
        let from_balance = self.world.get(from).account.balance;
        if amount > from_balance {
            return Err(EvmError::OutOfFunds {
                amount,
                balance: from_balance,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.world.get(to).account.balance;
        let credited = to_balance.checked_add(amount).ok_or(EvmError::Overflow {
            amount,
            balance: to_balance,
        })?;
        self.world.get(from).account.balance = from_balance - amount;
        self.world.get(to).account.balance = credited;
        Ok(())
    }

    fn check_depth(&self) -> EvmResult<()> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(EvmError::OutOfBounds(format!(
                "reached max call depth ({MAX_CALL_DEPTH})"
            )));
        }
        Ok(())
    }

    fn create(&mut self, idx: usize) -> EvmResult<()> {
        self.check_depth()?;
        let frame = &mut self.frames[idx];
        let value = frame.stack.pop()?;
        let offset = frame.stack.pop_u64()?;
        let size = frame.stack.pop_u64()?;

        let snapshot = self.world.snapshot();
        self.enter_create(idx, value, offset, size, snapshot)
            .inspect_err(|_| self.world.revert_to_snapshot(snapshot))
    }

    fn enter_create(
        &mut self,
        idx: usize,
        value: U256,
        offset: u64,
        size: u64,
        snapshot: usize,
    ) -> EvmResult<()> {
        let creator = self.frames[idx].callee;
        let state = self.world.get(creator);
        state.account.deduct(value)?;
        let nonce = state.account.nonce;

        let init_code = self.frames[idx].memory.read(offset, size)?;
        let created = create_address(creator, nonce);
        self.world.create(created, value, Vec::new());

        debug!(depth = self.frames.len() + 1, %created, "entering create frame");
        self.frames.push(Frame::new(
            creator,
            created,
            Vec::new(),
            0,
            Program::new(init_code),
            ReturnBehavior::InstallCode {
                parent: idx,
                created,
            },
            HaltBehavior::PushZero { parent: idx },
            ErrorBehavior::PushZero { parent: idx },
            Some(snapshot),
        ));
        Ok(())
    }

    fn call_like(&mut self, idx: usize, op: Opcode) -> EvmResult<()> {
        self.check_depth()?;
        let frame = &mut self.frames[idx];
        let _gas = frame.stack.pop()?;
        let target = frame.stack.pop_address()?;
        let value = if op == Opcode::DELEGATECALL {
            0
        } else {
            frame.stack.pop_u64()?
        };
        let in_offset = frame.stack.pop_u64()?;
        let in_size = frame.stack.pop_u64()?;
        let out_offset = frame.stack.pop_u64()?;
        let out_size = frame.stack.pop_u64()?;

        if !target.is_zero() && target <= U256::from(4u64) {
            return Err(EvmError::NotImplemented(format!(
                "precompiled contract at {target} is not available"
            )));
        }

        let snapshot = self.world.snapshot();
        self.enter_call(
            idx, op, target, value, in_offset, in_size, out_offset, out_size, snapshot,
        )
        .inspect_err(|_| self.world.revert_to_snapshot(snapshot))
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_call(
        &mut self,
        idx: usize,
        op: Opcode,
        target: Address,
        value: u64,
        in_offset: u64,
        in_size: u64,
        out_offset: u64,
        out_size: u64,
        snapshot: usize,
    ) -> EvmResult<()> {
        let callee = self.frames[idx].callee;
        self.transfer(callee, target, U256::from(value))?;

        let code = self.world.get(target).account.code().to_vec();
        if code.is_empty() {
            // nothing to run; the transfer stands as the parent's own effect
            self.world.commit_snapshot(snapshot);
            return self.frames[idx].stack.push(U256::ONE);
        }

        // the output region must exist before the child runs
        let frame = &mut self.frames[idx];
        frame.memory.ensure(out_offset, out_size)?;
        let input = frame.memory.read(in_offset, in_size)?;

        let (caller, child_callee, child_value) = match op {
            Opcode::CALLCODE => (callee, callee, value),
            Opcode::DELEGATECALL => (frame.caller, callee, frame.call_value),
            _ => (callee, target, value),
        };

        debug!(depth = self.frames.len() + 1, callee = %child_callee, "entering call frame");
        self.frames.push(Frame::new(
            caller,
            child_callee,
            input,
            child_value,
            Program::new(code),
            ReturnBehavior::CopyToParent {
                parent: idx,
                out_offset,
                out_size,
            },
            HaltBehavior::PushZero { parent: idx },
            ErrorBehavior::PushZero { parent: idx },
            Some(snapshot),
        ));
        Ok(())
    }

    fn selfdestruct(&mut self, idx: usize) -> EvmResult<()> {
        let beneficiary = self.frames[idx].stack.pop_address()?;
        let callee = self.frames[idx].callee;
        let balance = self.world.get(callee).account.balance;
        self.transfer(callee, beneficiary, balance)?;
        self.tx.destroy_list.push(callee);
        self.finish_halt();
        Ok(())
    }

    /// Pops the top frame after `RETURN`, committing its effects.
    fn finish_return(&mut self, output: Vec<u8>) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(snapshot) = frame.snapshot {
            self.world.commit_snapshot(snapshot);
        }
        debug!(depth = self.frames.len() + 1, "frame returned");
        match frame.on_return {
            ReturnBehavior::RecordAtRoot => {
                self.outcome = Some(ExecResult::returned(output));
            }
            ReturnBehavior::CopyToParent {
                parent,
                out_offset,
                out_size,
            } => {
                // the region was grown before the child was pushed, so the
                // copy cannot fault
                let _ = self.frames[parent]
                    .memory
                    .copy_in(out_offset, &output, 0, out_size, 0);
                self.push_onto(parent, U256::ONE);
            }
            ReturnBehavior::InstallCode { parent, created } => {
                self.world.get(created).account.set_code(output);
                self.push_onto(parent, created);
            }
        }
    }

    /// Pops the top frame after a halt, rolling back its effects.
    fn finish_halt(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(snapshot) = frame.snapshot {
            self.world.revert_to_snapshot(snapshot);
        }
        debug!(depth = self.frames.len() + 1, "frame halted");
        match frame.on_halt {
            HaltBehavior::RecordAtRoot => {
                self.outcome = Some(ExecResult::halted());
            }
            HaltBehavior::PushZero { parent } => self.push_onto(parent, U256::ZERO),
        }
    }

    /// Pops the top frame after a fault, rolling back its effects.
    fn fault_frame(&mut self, err: EvmError) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(snapshot) = frame.snapshot {
            self.world.revert_to_snapshot(snapshot);
        }
        debug!(%err, depth = self.frames.len() + 1, "frame faulted");
        match frame.on_error {
            ErrorBehavior::RecordAtRoot => {
                self.outcome = Some(ExecResult::threw(err));
            }
            ErrorBehavior::PushZero { parent } => self.push_onto(parent, U256::ZERO),
        }
    }

    fn push_onto(&mut self, parent: usize, value: U256) {
        // the parent popped the operands of its call opcode, so one status
        // push cannot overflow
        let _ = self.frames[parent].stack.push(value);
    }
}

fn bool_word(condition: bool) -> U256 {
    if condition {
        U256::ONE
    } else {
        U256::ZERO
    }
}
