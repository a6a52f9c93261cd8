use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::{
        collection_store::DocumentId,
        models::{CoffeeWinEntity, Record},
    },
    dto::{format_system_time, member::MemberSummary, roulette::WheelSegment},
};

/// Coffee spin machine state exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CoffeeSpinStatus {
    pub spinning: bool,
    /// Names drawn by the last completed spin; empty while idle or spinning.
    pub winners: Vec<String>,
}

/// Everything the coffee tab renders.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CoffeeView {
    pub segments: Vec<WheelSegment>,
    pub members: Vec<MemberSummary>,
    pub spin: CoffeeSpinStatus,
}

/// Confirmed coffee result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CoffeeWinSummary {
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub winners: Vec<String>,
    /// RFC 3339 confirmation timestamp.
    pub date: String,
    pub confirmed: bool,
}

impl From<&Record<CoffeeWinEntity>> for CoffeeWinSummary {
    fn from(record: &Record<CoffeeWinEntity>) -> Self {
        Self {
            id: record.id.clone(),
            winners: record.body.winners.clone(),
            date: format_system_time(record.body.date),
            confirmed: record.body.confirmed,
        }
    }
}
