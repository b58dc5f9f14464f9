use actix_web::{delete, get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::services::notification_service::NotificationService;

/// GET /api/notifications - Plus récentes d'abord
#[get("")]
pub async fn list_notifications(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let notifications = NotificationService::list(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[get("/unread-count")]
pub async fn unread_count(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let count = NotificationService::unread_count(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "unread_count": count })))
}

#[post("/read-all")]
pub async fn mark_all_read(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let updated = NotificationService::mark_all_read(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "updated": updated })))
}

#[post("/{id}/read")]
pub async fn mark_read(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let notification = NotificationService::mark_read(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[delete("/{id}")]
pub async fn delete_notification(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    NotificationService::delete(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn notification_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .service(list_notifications)
            .service(unread_count)
            .service(mark_all_read)
            .service(mark_read)
            .service(delete_notification),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::test_support::{create_user, memory_db};
    use crate::models::enums::NotificationKind;
    use crate::utils::jwt;
    use actix_web::{http::StatusCode, test, App};
    use rust_decimal_macros::dec;
    use serde_json::Value;

    #[actix_web::test]
    async fn test_notification_inbox() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "inbox@example.com", dec!(0)).await;
        let other = create_user(&db, "other@example.com", dec!(0)).await;
        NotificationService::notify(&db, user.id, NotificationKind::Info, "One", "first").await.unwrap();
        NotificationService::notify(&db, user.id, NotificationKind::Success, "Two", "second").await.unwrap();
        let foreign = NotificationService::notify(&db, other.id, NotificationKind::Info, "Other", "x")
            .await
            .unwrap();
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(notification_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/notifications/unread-count")
            .insert_header(auth.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["unread_count"], 2);

        // notification d'un autre utilisateur
        let req = test::TestRequest::delete()
            .uri(&format!("/notifications/{}", foreign.id))
            .insert_header(auth.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/notifications/read-all")
            .insert_header(auth.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updated"], 2);

        let req = test::TestRequest::get()
            .uri("/notifications")
            .insert_header(auth.clone())
            .to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[0]["read"], true);
    }
}
