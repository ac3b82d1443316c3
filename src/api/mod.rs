pub mod stations;

pub use stations::{router, AppState};
