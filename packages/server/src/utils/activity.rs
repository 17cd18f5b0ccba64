use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

use crate::entity::activity_log;
use crate::error::AppError;

/// Append an audit row. Call with the transaction that performs the change.
pub async fn record<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    action: &str,
    entity_type: &str,
    entity_id: i32,
    details: Option<String>,
) -> Result<(), AppError> {
    activity_log::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_string()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        details: Set(details),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}
