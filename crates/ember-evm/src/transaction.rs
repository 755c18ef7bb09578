//! Per-transaction context and log delivery

use ember_primitives::{Address, U256};

/// A record emitted by one of the `LOG0`..`LOG4` instructions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogEntry {
    /// Address of the account whose code emitted the log
    pub address: Address,
    /// Raw data bytes read from the emitting frame's memory
    pub data: Vec<u8>,
    /// Indexed topics, 0 to 4 of them
    pub topics: Vec<U256>,
}

/// Receives log entries in the program order of the emitting instructions.
pub trait LogSink {
    /// Handles one emitted entry.
    fn handle(&mut self, entry: LogEntry);
}

/// A sink that discards every entry.
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn handle(&mut self, _entry: LogEntry) {}
}

/// A sink that accumulates entries for later inspection.
#[derive(Default)]
pub struct VectorLogSink {
    /// The entries received so far, oldest first
    pub logs: Vec<LogEntry>,
}

impl VectorLogSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for VectorLogSink {
    fn handle(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }
}

/// Immutable per-transaction data plus the transaction's side channels:
/// the log sink and the list of addresses scheduled for destruction.
pub struct Transaction<'s> {
    /// The externally-owned account that started the transaction
    pub origin: Address,
    /// Value attached to the transaction
    pub value: u64,
    /// Gas price; reported by `GASPRICE`, never charged
    pub gas_price: u64,
    /// Gas limit; reported by `GAS`, never metered
    pub gas_limit: u64,
    /// Addresses self-destructed during the run, swept afterwards
    pub destroy_list: Vec<Address>,
    sink: &'s mut dyn LogSink,
}

impl<'s> Transaction<'s> {
    /// Creates a transaction with zero value, gas price, and gas limit.
    pub fn new(origin: Address, sink: &'s mut dyn LogSink) -> Self {
        Self {
            origin,
            value: 0,
            gas_price: 0,
            gas_limit: 0,
            destroy_list: Vec::new(),
            sink,
        }
    }

    /// Delivers a log entry to the sink.
    pub fn log(&mut self, entry: LogEntry) {
        self.sink.handle(entry);
    }
}
