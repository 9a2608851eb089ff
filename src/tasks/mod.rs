mod clock;
mod rotation;
mod scheduler;

pub use rotation::RotationPolicy;
pub use scheduler::{Scheduler, SchedulerConfig};
