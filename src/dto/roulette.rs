use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::restaurant::RestaurantSummary;

/// One slice of a wheel, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WheelSegment {
    pub label: String,
    pub start_angle: f64,
    pub end_angle: f64,
    /// CSS color of the slice.
    pub color: String,
}

/// Spin machine state exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestaurantSpinStatus {
    pub spinning: bool,
    /// Restaurant drawn by the last completed spin, if it is still displayed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<RestaurantSummary>,
}

/// Everything the roulette tab renders.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouletteView {
    pub segments: Vec<WheelSegment>,
    pub spin: RestaurantSpinStatus,
}
