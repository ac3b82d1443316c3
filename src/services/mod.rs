pub mod audio_backend;
pub mod dial;
pub mod mixer;
pub mod scheduler;
pub mod store;

pub use audio_backend::{AudioBackend, AudioStream, MpvBackend};
pub use dial::Dial;
pub use mixer::Mixer;
pub use scheduler::Scheduler;
pub use store::Store;
