//! End-to-end interpreter tests
//!
//! Each scenario builds a world, composes a transaction, runs the
//! interpreter against a callee, and checks the result and the world
//! afterwards.

use ember_evm::{
    create_address, EvmError, ExitReason, Interpreter, LogSink, NullLogSink, Transaction,
    VectorLogSink,
};
use ember_primitives::{Address, U256};
use ember_state::{InMemoryWorldState, WorldState};

fn addr(n: u64) -> Address {
    Address::from(n)
}

fn run(
    world: &mut InMemoryWorldState,
    sink: &mut dyn LogSink,
    caller: Address,
    callee: Address,
    input: &[u8],
    call_value: u64,
) -> ember_evm::ExecResult {
    let mut tx = Transaction::new(caller, sink);
    Interpreter::new(world, &mut tx).run(caller, callee, input, call_value, None)
}

/// Deploys `code` at a fresh address and runs it with no input.
fn run_contract(code: Vec<u8>) -> (ember_evm::ExecResult, InMemoryWorldState) {
    let mut world = InMemoryWorldState::new();
    let callee = addr(0xc0de);
    world.create(callee, U256::ZERO, code);
    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(0xca11), callee, &[], 0);
    (result, world)
}

/// PUSH the bytes of `value` (one byte) and `offset`, then MSTORE8.
fn store_byte(code: &mut Vec<u8>, offset: u8, value: u8) {
    code.extend([0x60, value, 0x60, offset, 0x53]);
}

// =============================================================================
// The concrete end-to-end scenarios
// =============================================================================

#[test]
fn test_hello_world_emission() {
    let message = b"Hello world!";
    let mut code = Vec::new();
    for (offset, &byte) in message.iter().enumerate() {
        store_byte(&mut code, offset as u8, byte);
    }
    // RETURN(0, 13): 12 written bytes plus the unwritten 13th slot
    code.extend([0x60, 0x0d, 0x60, 0x00, 0xf3]);

    let (result, _) = run_contract(code);
    assert_eq!(result.exit_reason, ExitReason::Returned);

    let mut expected = message.to_vec();
    expected.push(0x00);
    assert_eq!(result.output, expected);
}

#[test]
fn test_sum_returns_32_byte_result() {
    // 0xED + 0xFE stored at memory 0, then return the full word
    let code = vec![
        0x60, 0xed, 0x60, 0xfe, 0x01, // PUSH1 0xED; PUSH1 0xFE; ADD
        0x60, 0x00, 0x52, // PUSH1 0; MSTORE
        0x60, 0x20, 0x60, 0x00, 0xf3, // PUSH1 32; PUSH1 0; RETURN
    ];
    let (result, _) = run_contract(code);
    assert_eq!(result.exit_reason, ExitReason::Returned);

    let mut expected = [0u8; 32];
    expected[30] = 0x01;
    expected[31] = 0xeb;
    assert_eq!(result.output, expected);
}

#[test]
fn test_jump_into_push_immediate_throws() {
    // PUSH2 0x005b; PUSH1 0x02; JUMP -- offset 2 is immediate data, not a
    // jump destination, even though the byte there is 0x5b
    let code = vec![0x61, 0x00, 0x5b, 0x60, 0x02, 0x56];
    let (result, _) = run_contract(code);
    assert_eq!(result.exit_reason, ExitReason::Threw);
    assert!(matches!(result.error, Some(EvmError::IllegalInstruction(_))));
}

#[test]
fn test_call_to_empty_account_pushes_one() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0xaa);
    let b = addr(0xbb);

    // CALL(gas=0, addr=B, value=0, in=0/0, out=0/0), then return the status
    let code = vec![
        0x60, 0x00, // out_size
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x60, 0x00, // value
        0x60, 0xbb, // address of B
        0x60, 0x00, // gas (ignored)
        0xf1, // CALL
        0x60, 0x00, 0x52, // MSTORE at 0
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN 32 bytes
    ];
    world.create(a, U256::ZERO, code);
    world.create(b, U256::ZERO, Vec::new());

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Returned);

    let mut expected = [0u8; 32];
    expected[31] = 1;
    assert_eq!(result.output, expected);
}

#[test]
fn test_selfdestruct_sweeps_account() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0xaaaa);
    let b = addr(0xbbbb);

    // PUSH20 B; SELFDESTRUCT
    let mut code = vec![0x73];
    code.extend([0u8; 18]);
    code.extend([0xbb, 0xbb]);
    code.push(0xff);

    world.create(a, U256::from(100u64), code);
    world.create(b, U256::ZERO, Vec::new());

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Halted);

    assert!(!world.exists(a));
    assert_eq!(world.get(b).account.balance, U256::from(100u64));
}

#[test]
fn test_address_derivation_vectors() {
    let sender = U256::from_hex("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
    let expected = [
        "0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d",
        "0x343c43a37d37dff08ae8c4a11544c718abb4fcf8",
        "0xf778b86fa74e846c4f0a1fbd1335fe81c00a0c91",
        "0xfffd933a0bc612844eaf0c6fe3e5b8e9b6c1d19c",
    ];
    for (nonce, hex) in expected.iter().enumerate() {
        assert_eq!(
            create_address(sender, nonce as u64),
            U256::from_hex(hex).unwrap(),
            "nonce {nonce}"
        );
    }
}

// =============================================================================
// Calls, creation, and journaling
// =============================================================================

/// Code for a contract that stores `value` at storage key 1 and returns
/// one byte of memory.
fn sstore_then_return() -> Vec<u8> {
    vec![
        0x60, 0x2a, 0x60, 0x01, 0x55, // SSTORE(1, 42)
        0x60, 0x01, 0x60, 0x00, 0xf3, // RETURN(0, 1)
    ]
}

/// Caller code: CALL(target) with the given value, then return the call
/// status as a 32-byte word.
fn call_and_return_status(target: u64, value: u8) -> Vec<u8> {
    vec![
        0x60, 0x00, // out_size
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x60, value, // value
        0x61, (target >> 8) as u8, target as u8, // PUSH2 target
        0x60, 0x00, // gas
        0xf1, // CALL
        0x60, 0x00, 0x52, // MSTORE status at 0
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN 32 bytes
    ]
}

fn status_of(result: &ember_evm::ExecResult) -> U256 {
    assert_eq!(result.exit_reason, ExitReason::Returned);
    U256::from_big_endian(&result.output)
}

#[test]
fn test_call_runs_callee_and_commits_on_return() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);
    world.create(a, U256::from(50u64), call_and_return_status(0x0bbb, 5));
    world.create(b, U256::ZERO, sstore_then_return());

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(status_of(&result), U256::ONE);

    // the child returned, so its storage write and the transfer stand
    assert_eq!(world.get(b).storage.load(U256::ONE), U256::from(0x2au64));
    assert_eq!(world.get(b).account.balance, U256::from(5u64));
    assert_eq!(world.get(a).account.balance, U256::from(45u64));
}

#[test]
fn test_call_rolls_back_on_child_fault() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);
    // child stores then hits an unassigned opcode
    world.create(a, U256::from(50u64), call_and_return_status(0x0bbb, 5));
    world.create(b, U256::ZERO, vec![0x60, 0x2a, 0x60, 0x01, 0x55, 0xfe]);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    // the fault is absorbed: the parent sees 0 and keeps running
    assert_eq!(status_of(&result), U256::ZERO);

    // the child's storage write and the value transfer are undone
    assert!(world.get(b).storage.is_empty());
    assert_eq!(world.get(b).account.balance, U256::ZERO);
    assert_eq!(world.get(a).account.balance, U256::from(50u64));
}

#[test]
fn test_call_rolls_back_on_child_halt() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);
    // child stores then halts with STOP; a halting child reports failure
    world.create(a, U256::from(50u64), call_and_return_status(0x0bbb, 5));
    world.create(b, U256::ZERO, vec![0x60, 0x2a, 0x60, 0x01, 0x55, 0x00]);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(status_of(&result), U256::ZERO);
    assert!(world.get(b).storage.is_empty());
    assert_eq!(world.get(a).account.balance, U256::from(50u64));
}

#[test]
fn test_call_with_insufficient_funds_faults_caller() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);
    world.create(a, U256::from(3u64), call_and_return_status(0x0bbb, 5));
    world.create(b, U256::ZERO, Vec::new());

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Threw);
    assert!(matches!(result.error, Some(EvmError::OutOfFunds { .. })));
}

#[test]
fn test_call_copies_output_with_padding() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);

    // B returns one byte, 0x2a (memory starts zeroed, so store 42 first)
    world.create(
        b,
        U256::ZERO,
        vec![0x60, 0x2a, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3],
    );
    // A calls B with out region (0, 4) and returns memory 0..4
    let code = vec![
        0x60, 0x04, // out_size 4
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x60, 0x00, // value
        0x61, 0x0b, 0xbb, // PUSH2 B
        0x60, 0x00, // gas
        0xf1, // CALL
        0x50, // POP the status
        0x60, 0x04, 0x60, 0x00, 0xf3, // RETURN(0, 4)
    ];
    world.create(a, U256::ZERO, code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Returned);
    // one returned byte, zero-padded to the four-byte output region
    assert_eq!(result.output, vec![0x2a, 0x00, 0x00, 0x00]);
}

#[test]
fn test_precompile_addresses_fault() {
    for precompile in 1u64..=4 {
        let mut world = InMemoryWorldState::new();
        let a = addr(0x0aaa);
        world.create(a, U256::ZERO, call_and_return_status(precompile, 0));

        let mut sink = NullLogSink;
        let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
        assert_eq!(result.exit_reason, ExitReason::Threw, "address {precompile}");
        assert!(matches!(result.error, Some(EvmError::NotImplemented(_))));
    }
}

#[test]
fn test_create_installs_code_and_pushes_address() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);

    // init code: MSTORE8(0, 0x2a); RETURN(0, 1) -- runtime code is [0x2a]
    let init = [0x60, 0x2a, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];

    // write init code into memory, then CREATE(value=7, offset=0, size=10)
    // and return the pushed address as a 32-byte word
    let mut code = Vec::new();
    for (offset, &byte) in init.iter().enumerate() {
        store_byte(&mut code, offset as u8, byte);
    }
    code.extend([
        0x60, 0x0a, // size
        0x60, 0x00, // offset
        0x60, 0x07, // value
        0xf0, // CREATE
        0x60, 0x00, 0x52, // MSTORE
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN 32 bytes
    ]);
    world.create(a, U256::from(10u64), code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Returned);

    let created = U256::from_big_endian(&result.output);
    assert_eq!(created, create_address(a, 0));
    assert_eq!(world.get(created).account.code(), &[0x2a]);
    assert_eq!(world.get(created).account.balance, U256::from(7u64));
    assert_eq!(world.get(a).account.balance, U256::from(3u64));
}

#[test]
fn test_create_with_faulting_init_pushes_zero() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);

    // init code faults immediately; CREATE reports 0 and the deducted
    // value and created account roll back
    let mut code = Vec::new();
    store_byte(&mut code, 0, 0xfe);
    code.extend([
        0x60, 0x01, // size
        0x60, 0x00, // offset
        0x60, 0x07, // value
        0xf0, // CREATE
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ]);
    world.create(a, U256::from(10u64), code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(status_of(&result), U256::ZERO);
    assert_eq!(world.get(a).account.balance, U256::from(10u64));
    assert!(!world.exists(create_address(a, 0)));
}

#[test]
fn test_create_with_insufficient_funds_faults_creator() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let code = vec![
        0x60, 0x00, // size
        0x60, 0x00, // offset
        0x60, 0x07, // value, but the account holds only 3
        0xf0, // CREATE
        0x00,
    ];
    world.create(a, U256::from(3u64), code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Threw);
    assert!(matches!(result.error, Some(EvmError::OutOfFunds { .. })));
}

#[test]
fn test_delegatecall_keeps_callers_context() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);

    // B's code stores CALLVALUE at key 1 and CALLER at key 2, then returns
    world.create(
        b,
        U256::ZERO,
        vec![
            0x34, 0x60, 0x01, 0x55, // SSTORE(1, CALLVALUE)
            0x33, 0x60, 0x02, 0x55, // SSTORE(2, CALLER)
            0x60, 0x00, 0x60, 0x00, 0xf3, // RETURN(0, 0)
        ],
    );
    // A delegate-calls B: six operands, no value
    let code = vec![
        0x60, 0x00, // out_size
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x61, 0x0b, 0xbb, // PUSH2 B
        0x60, 0x00, // gas
        0xf4, // DELEGATECALL
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    world.create(a, U256::ZERO, code);

    let origin = addr(0x0123);
    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, origin, a, &[], 99);
    assert_eq!(status_of(&result), U256::ONE);

    // the writes landed in A's storage, with A's own call context
    let storage = &world.get(a).storage;
    assert_eq!(storage.load(U256::ONE), U256::from(99u64));
    assert_eq!(storage.load(U256::from(2u64)), origin);
    assert!(world.get(b).storage.is_empty());
}

#[test]
fn test_callcode_borrows_code_but_keeps_account() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);

    // B's code stores CALLER at key 1; under CALLCODE the caller is A
    world.create(
        b,
        U256::ZERO,
        vec![0x33, 0x60, 0x01, 0x55, 0x60, 0x00, 0x60, 0x00, 0xf3],
    );
    let code = vec![
        0x60, 0x00, // out_size
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x60, 0x05, // value
        0x61, 0x0b, 0xbb, // PUSH2 B
        0x60, 0x00, // gas
        0xf2, // CALLCODE
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    world.create(a, U256::from(20u64), code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(status_of(&result), U256::ONE);

    // storage effects land on A; the value still moved to B
    assert_eq!(world.get(a).storage.load(U256::ONE), a);
    assert!(world.get(b).storage.is_empty());
    assert_eq!(world.get(b).account.balance, U256::from(5u64));
    assert_eq!(world.get(a).account.balance, U256::from(15u64));
}

#[test]
fn test_max_call_depth() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);

    // A calls itself unconditionally; the recursion must bottom out at the
    // depth limit, each level absorbing the child's fault as a 0
    let code = vec![
        0x60, 0x00, // out_size
        0x60, 0x00, // out_offset
        0x60, 0x00, // in_size
        0x60, 0x00, // in_offset
        0x60, 0x00, // value
        0x61, 0x0a, 0xaa, // PUSH2 A
        0x60, 0x00, // gas
        0xf1, // CALL
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    world.create(a, U256::ZERO, code);

    let mut sink = NullLogSink;
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    // the root still returns; the deepest call failed with out-of-bounds
    // and every level above it saw its child succeed
    assert_eq!(result.exit_reason, ExitReason::Returned);
}

// =============================================================================
// Logs
// =============================================================================

#[test]
fn test_logs_are_delivered_in_program_order() {
    let mut world = InMemoryWorldState::new();
    let a = addr(0x0aaa);
    let b = addr(0x0bbb);

    // B emits LOG1 with topic 7 over two bytes of memory, then returns
    world.create(
        b,
        U256::ZERO,
        vec![
            0x60, 0x11, 0x60, 0x00, 0x53, // MSTORE8(0, 0x11)
            0x60, 0x07, // topic
            0x60, 0x02, // size
            0x60, 0x00, // offset
            0xa1, // LOG1
            0x60, 0x00, 0x60, 0x00, 0xf3,
        ],
    );
    // A emits LOG0 over no data, calls B, then emits LOG0 again
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0xa0]; // LOG0
    code.extend(call_and_return_status(0x0bbb, 0)[..16].to_vec()); // CALL part
    code.push(0x50); // POP status
    code.extend([0x60, 0x00, 0x60, 0x00, 0xa0]); // LOG0
    code.push(0x00); // STOP
    world.create(a, U256::ZERO, code);

    let mut sink = VectorLogSink::new();
    let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
    assert_eq!(result.exit_reason, ExitReason::Halted);

    assert_eq!(sink.logs.len(), 3);
    assert_eq!(sink.logs[0].address, a);
    assert!(sink.logs[0].topics.is_empty());
    assert_eq!(sink.logs[1].address, b);
    assert_eq!(sink.logs[1].topics, vec![U256::from(7u64)]);
    assert_eq!(sink.logs[1].data, vec![0x11, 0x00]);
    assert_eq!(sink.logs[2].address, a);
}

// =============================================================================
// Properties
// =============================================================================

mod props {
    use super::*;
    use ember_evm::Program;
    use proptest::prelude::*;

    proptest! {
        /// Every reported jump destination is an actual JUMPDEST byte, and
        /// prefixing the code with a PUSH1 immediate shifts all of them.
        #[test]
        fn jumpdests_are_jumpdest_bytes(code in proptest::collection::vec(any::<u8>(), 0..256)) {
            let program = Program::new(code.clone());
            for offset in 0..code.len() as u64 {
                if program.is_jump_dest(offset) {
                    prop_assert_eq!(code[offset as usize], 0x5b);
                }
            }

            let mut shifted = vec![0x60, 0x00];
            shifted.extend(&code);
            let shifted_program = Program::new(shifted);
            for offset in 0..code.len() as u64 {
                prop_assert_eq!(
                    program.is_jump_dest(offset),
                    shifted_program.is_jump_dest(offset + 2)
                );
            }
        }

        /// A child frame that faults at an arbitrary point leaves the
        /// parent's storage exactly as it was before the call.
        #[test]
        fn faulting_child_preserves_parent_storage(
            key in any::<u64>(),
            value in 1u64..,
            junk in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut world = InMemoryWorldState::new();
            let a = addr(0x0aaa);
            let b = addr(0x0bbb);

            // the child writes some junk-derived slots and then faults on
            // an unassigned opcode
            let mut child_code = Vec::new();
            for (i, &byte) in junk.iter().enumerate() {
                child_code.extend([0x60, byte, 0x60, i as u8, 0x55]); // SSTORE
            }
            child_code.push(0x0c); // unassigned byte, faults

            world.create(a, U256::ZERO, call_and_return_status(0x0bbb, 0));
            world.create(b, U256::ZERO, child_code);
            world.get(a).storage.store(U256::from(key), U256::from(value));

            let mut sink = NullLogSink;
            let result = run(&mut world, &mut sink, addr(1), a, &[], 0);
            prop_assert_eq!(status_of(&result), U256::ZERO);

            // parent storage unchanged, child storage rolled back
            prop_assert_eq!(world.get(a).storage.load(U256::from(key)), U256::from(value));
            prop_assert_eq!(world.get(a).storage.len(), 1);
            prop_assert!(world.get(b).storage.is_empty());
        }
    }
}
