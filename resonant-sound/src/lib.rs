//! Sound object resolution (spec §4.B): random/sequence schedulers for
//! Collections and a set-diffing resolver for SwitchContainers.

pub mod instance;
pub mod random;
pub mod sequence;
pub mod switch_container;

pub use instance::SoundInstance;
pub use random::{RandomScheduler, RandomSchedulerConfig, WeightedEntry};
pub use sequence::SequenceScheduler;
pub use switch_container::{StateDiff, SwitchContainer, SwitchContainerItem};
