mod buffer;
mod codec;
mod segments;

pub use codec::{AudioCodec, FfmpegCodec};
pub use segments::SegmentCache;

#[cfg(test)]
pub(crate) use segments::{tests::FakeCodec, SegmentPair};
