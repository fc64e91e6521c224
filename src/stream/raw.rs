use crate::conn::Transaction;
use crate::error::CallbackError;
use crate::stream::{StreamIo, StreamProcessor};
use crate::types::Direction;

/// Name of the built-in capture processor, inserted at index 0 of every
/// pump.
pub const RAW_PROCESSOR: &str = "raw";

/// Copies body bytes into the transaction's capture buffer up to the
/// configured log limit and forwards every segment unchanged.
pub(crate) struct RawCapture {
    direction: Direction,
}

impl RawCapture {
    pub(crate) fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl StreamProcessor for RawCapture {
    fn execute(&mut self, tx: &mut Transaction, io: &mut StreamIo) -> Result<(), CallbackError> {
        while let Some(segment) = io.take() {
            if segment.is_data() {
                tx.body_mut(self.direction).absorb(segment.bytes());
            }
            io.put(segment);
        }
        Ok(())
    }
}
