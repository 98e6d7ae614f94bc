//! Channel handles, the fade state machine, and priority-based
//! virtualisation over `resonant_mixer`'s fixed layer pool (spec §4.D).

pub mod channel;
pub mod fade;
pub mod handle;
pub mod policy;
pub mod spatial;
pub mod virtualization;

pub use channel::{ChannelEvent, ChannelEventListener, ChannelPool, EndedAction, PlayRequest, SoundSourceFactory};
pub use fade::{FadeOutTarget, PlaybackState};
pub use handle::ChannelHandle;
pub use policy::{CollectionPlayMode, EndOfSoundOutcome, EndOfSoundPolicy};
pub use spatial::{doppler_factor, room_gain, EntityState, ListenerState, RoomState};
pub use virtualization::{diff_assignment, rank_top_k, Candidate, VirtualizationDiff};
