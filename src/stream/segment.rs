use std::collections::VecDeque;

use crate::bytestr::ByteStr;

/// What a stream segment carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentType {
    /// Body bytes.
    Data,
    /// A marker that makes buffering processors emit pending data.
    Flush,
}

/// One reference-counted unit of in-flight stream data.
///
/// Cloning a segment is the retain operation: a processor that wants to
/// keep a segment past its `execute` call clones it, and the bytes are
/// released when the last clone is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSegment {
    stype: SegmentType,
    bytes: ByteStr,
}

impl StreamSegment {
    pub fn data(bytes: ByteStr) -> Self {
        Self {
            stype: SegmentType::Data,
            bytes,
        }
    }

    pub fn flush() -> Self {
        Self {
            stype: SegmentType::Flush,
            bytes: ByteStr::empty(),
        }
    }

    pub fn segment_type(&self) -> SegmentType {
        self.stype
    }

    pub fn is_data(&self) -> bool {
        self.stype == SegmentType::Data
    }

    pub fn is_flush(&self) -> bool {
        self.stype == SegmentType::Flush
    }

    pub fn bytes(&self) -> &ByteStr {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The in-flight segment queue carried through one push of a pump.
///
/// A processor pops the segments produced upstream with [`StreamIo::take`]
/// and pushes zero or more segments downstream with [`StreamIo::put`];
/// between processors the pump rotates the output back into the input.
pub struct StreamIo {
    input: VecDeque<StreamSegment>,
    output: VecDeque<StreamSegment>,
}

impl StreamIo {
    pub(crate) fn seeded(segment: StreamSegment) -> Self {
        let mut input = VecDeque::with_capacity(1);
        input.push_back(segment);
        Self {
            input,
            output: VecDeque::new(),
        }
    }

    /// Pop the next upstream segment.
    pub fn take(&mut self) -> Option<StreamSegment> {
        self.input.pop_front()
    }

    /// Queue a segment for the next processor in the chain.
    pub fn put(&mut self, segment: StreamSegment) {
        self.output.push_back(segment);
    }

    /// Hand the previous processor's output to the next one. Anything the
    /// previous processor left untaken is dropped.
    pub(crate) fn rotate(&mut self) {
        self.input.clear();
        std::mem::swap(&mut self.input, &mut self.output);
    }

    /// Segments still queued for the next stage.
    pub fn pending(&self) -> usize {
        self.input.len() + self.output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_moves_output_to_input() {
        let mut io = StreamIo::seeded(StreamSegment::data(ByteStr::from("abc")));
        let seg = io.take().unwrap();
        assert!(io.take().is_none());
        io.put(seg.clone());
        io.put(StreamSegment::flush());
        io.rotate();
        assert_eq!(io.take(), Some(seg));
        assert_eq!(io.take(), Some(StreamSegment::flush()));
        assert!(io.take().is_none());
    }

    #[test]
    fn clone_retains_the_same_bytes() {
        let seg = StreamSegment::data(ByteStr::from("payload"));
        let kept = seg.clone();
        drop(seg);
        assert_eq!(kept.bytes().as_bytes(), b"payload");
    }
}
