mod engine;

pub use engine::{AudioOutput, PlaybackEngine};

#[cfg(test)]
pub(crate) use engine::tests::{DeviceCall, DeviceLog, FakeOutput};
