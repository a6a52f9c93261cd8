use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::{
        collection_store::DocumentId,
        models::{MemberEntity, Record},
    },
    dto::validation::validate_not_blank,
};

/// Name typed into the member form; stored trimmed.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct AddMemberRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Member of the coffee pool.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberSummary {
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub name: String,
}

impl From<&Record<MemberEntity>> for MemberSummary {
    fn from(record: &Record<MemberEntity>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.body.name.clone(),
        }
    }
}
