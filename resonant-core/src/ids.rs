//! Object identifiers. The original source types every id as `AmObjectID =
//! AmUInt64` (see `Core/Common/Types.h`); we keep the same underlying width
//! but give each id kind its own newtype so the compiler rejects mixing a
//! `SoundId` with a `BusId`, something the original's typedef-of-typedef
//! scheme could not enforce.

macro_rules! object_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

object_id!(SoundId);
object_id!(CollectionId);
object_id!(SwitchContainerId);
object_id!(SwitchId);
object_id!(SwitchStateId);
object_id!(BusId);
object_id!(EntityId);
object_id!(ListenerId);
object_id!(RoomId);
object_id!(EnvironmentId);
object_id!(EventId);
object_id!(RtpcId);
object_id!(PipelineId);

/// Invalid-sentinel pattern used throughout the original source
/// (`kAmInvalidObjectId`); kept as an associated constant per id type
/// instead of a single untyped global.
pub const INVALID_OBJECT_ID: u64 = 0;
