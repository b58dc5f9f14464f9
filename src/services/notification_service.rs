use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::errors::AppError;
use crate::models::enums::NotificationKind;
use crate::models::notification;

pub struct NotificationService;

impl NotificationService {
    /// Crée une notification pour un utilisateur
    pub async fn notify<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        kind: NotificationKind,
        title: &str,
        message: impl Into<String>,
    ) -> Result<notification::Model, AppError> {
        let model = notification::ActiveModel {
            user_id: Set(user_id),
            title: Set(title.to_string()),
            message: Set(message.into()),
            kind: Set(kind),
            read: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(model)
    }

    /// Notifications de l'utilisateur, les plus récentes d'abord
    pub async fn list(db: &DatabaseConnection, user_id: i32) -> Result<Vec<notification::Model>, AppError> {
        let notifications = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .all(db)
            .await?;

        Ok(notifications)
    }

    pub async fn unread_count(db: &DatabaseConnection, user_id: i32) -> Result<u64, AppError> {
        let count = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(db)
            .await?;

        Ok(count)
    }

    pub async fn mark_read(
        db: &DatabaseConnection,
        user_id: i32,
        notification_id: i32,
    ) -> Result<notification::Model, AppError> {
        let existing = Self::find_owned(db, user_id, notification_id).await?;
        if existing.read {
            return Ok(existing);
        }

        let mut active: notification::ActiveModel = existing.into();
        active.read = Set(true);
        Ok(active.update(db).await?)
    }

    /// Retourne le nombre de notifications marquées comme lues
    pub async fn mark_all_read(db: &DatabaseConnection, user_id: i32) -> Result<u64, AppError> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn delete(db: &DatabaseConnection, user_id: i32, notification_id: i32) -> Result<(), AppError> {
        let existing = Self::find_owned(db, user_id, notification_id).await?;
        existing.delete(db).await?;
        Ok(())
    }

    // Une notification d'un autre utilisateur est traitée comme inexistante
    async fn find_owned(
        db: &DatabaseConnection,
        user_id: i32,
        notification_id: i32,
    ) -> Result<notification::Model, AppError> {
        notification::Entity::find_by_id(notification_id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Notification not found"))
    }
}
