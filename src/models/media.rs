use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kinds of audio asset tracked in the `media` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Song,
    Commercial,
    Ident,
    Noise,
    Overlay,
    TopOfHour,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Song => "song",
            MediaKind::Commercial => "commercial",
            MediaKind::Ident => "ident",
            MediaKind::Noise => "noise",
            MediaKind::Overlay => "overlay",
            MediaKind::TopOfHour => "top_of_hour",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Media {
    pub id: i64,
    pub path: String,
    pub kind: MediaKind,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub tag: Option<String>,
    pub duration_s: Option<f64>,
    pub mtime: Option<f64>,
}
