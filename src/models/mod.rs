pub mod media;
pub mod play;
pub mod state;
pub mod station;

pub use media::{Media, MediaKind};
pub use play::Play;
pub use state::{NowPlaying, OverlayIdent, StationState};
pub use station::{Schedule, ScheduleEntry, StationConfig, StationRow};
