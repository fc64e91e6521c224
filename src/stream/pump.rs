use crate::bytestr::ByteStr;
use crate::conn::Transaction;
use crate::stream::{StreamError, StreamIo, StreamProcessor, StreamSegment};
use crate::types::Direction;

struct PumpEntry {
    name: String,
    processor: Box<dyn StreamProcessor>,
}

/// The per-transaction, per-direction ordered chain of stream processors.
///
/// `push` runs one data segment through the chain, `flush` runs a flush
/// marker through it. Execution is strictly sequential within one pump;
/// pumps of different transactions are independent.
pub struct StreamPump {
    direction: Direction,
    entries: Vec<PumpEntry>,
}

impl StreamPump {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: Vec::new(),
        }
    }

    /// Placeholder pump used while a transaction's real pump is checked
    /// out for a push.
    pub(crate) fn empty() -> Self {
        Self::new(Direction::Request)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the chained processors, in execution order.
    pub fn processor_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub(crate) fn insert(
        &mut self,
        index: usize,
        name: impl Into<String>,
        processor: Box<dyn StreamProcessor>,
    ) -> Result<(), StreamError> {
        if index > self.entries.len() {
            return Err(StreamError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.entries.insert(
            index,
            PumpEntry {
                name: name.into(),
                processor,
            },
        );
        Ok(())
    }

    /// Run one data chunk through the chain.
    pub(crate) fn push(&mut self, tx: &mut Transaction, data: &[u8]) -> Result<(), StreamError> {
        self.run(tx, StreamSegment::data(ByteStr::copy_from(data)))
    }

    /// Run a flush marker through the chain so buffering processors emit
    /// pending data.
    pub(crate) fn flush(&mut self, tx: &mut Transaction) -> Result<(), StreamError> {
        self.run(tx, StreamSegment::flush())
    }

    fn run(&mut self, tx: &mut Transaction, seed: StreamSegment) -> Result<(), StreamError> {
        let mut io = StreamIo::seeded(seed);
        for entry in self.entries.iter_mut() {
            entry
                .processor
                .execute(tx, &mut io)
                .map_err(|cause| StreamError::ProcessorFailed {
                    name: entry.name.clone(),
                    message: cause.message,
                })?;
            io.rotate();
        }
        Ok(())
    }
}
