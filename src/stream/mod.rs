//! The streaming body pipeline: reference-counted segments pushed through
//! an ordered chain of per-transaction processors.

mod error;
mod processor;
mod pump;
mod raw;
mod segment;

pub use error::StreamError;
pub use processor::{
    StreamProcessor, StreamProcessorDef, StreamProcessorFactory, StreamProcessorRegistry,
};
pub use pump::StreamPump;
pub use raw::RAW_PROCESSOR;
pub use segment::{SegmentType, StreamIo, StreamSegment};

pub(crate) use raw::RawCapture;
