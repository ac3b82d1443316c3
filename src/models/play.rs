use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Play {
    pub id: i64,
    pub station_id: i64,
    pub media_id: i64,
    pub kind: String,
    pub started_ts: f64,
    pub ended_ts: Option<f64>,
}
