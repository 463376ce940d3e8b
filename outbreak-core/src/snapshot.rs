use serde::{Deserialize, Serialize};

/// A snapshot of the population state at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Wall-clock seconds since the driver started.
    pub time_s: f32,
    pub prey_count: u32,
    pub predator_count: u32,
    /// Promotions performed since simulation start.
    pub conversions_total: u64,
    /// Raw [x, y] prey positions, included only on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prey_positions: Option<Vec<(f32, f32)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predator_positions: Option<Vec<(f32, f32)>>,
}
