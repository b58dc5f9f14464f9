use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::config::{AdminBootstrap, AppConfig};
use crate::errors::AppError;
use crate::models::dto::{AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::models::enums::NotificationKind;
use crate::models::users;
use crate::services::notification_service::NotificationService;
use crate::services::referral_service::ReferralService;
use crate::utils::{jwt, password};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;

pub struct AccountService;

/// Nom ou prénom: espaces retirés, 2 à 50 caractères
pub fn clean_name(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(AppError::validation(format!(
            "{} must be between {} and {} characters",
            field, NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn issue_token(config: &AppConfig, user: &users::Model) -> Result<String, AppError> {
    jwt::generate_token(&config.jwt, user.id, &user.email, user.is_staff).map_err(AppError::Internal)
}

impl AccountService {
    /// Inscription: crée le compte, enregistre le parrainage éventuel et retourne un token
    pub async fn register(
        db: &DatabaseConnection,
        config: &AppConfig,
        request: RegisterRequest,
    ) -> Result<AuthResponse, AppError> {
        // 1. Validation des champs
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        let first_name = clean_name("First name", &request.first_name)?;
        let last_name = clean_name("Last name", &request.last_name)?;
        password::validate_strength(&request.password).map_err(AppError::Validation)?;
        if request.password != request.password2 {
            return Err(AppError::validation("Password fields didn't match."));
        }

        let txn = db.begin().await?;

        // 2. Email unique
        let exists = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .count(&txn)
            .await?
            > 0;
        if exists {
            return Err(AppError::Conflict("A user with this email already exists.".to_string()));
        }

        // 3. Parrain (code optionnel, mais doit exister s'il est fourni)
        let referrer = match request.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(ReferralService::find_referrer(&txn, code).await?),
            _ => None,
        };

        // 4. Création du compte
        let password_hash = password::hash_password(&request.password).map_err(AppError::Internal)?;
        let referral_code = ReferralService::unique_code(&txn).await?;
        let now = Utc::now();

        let user = users::ActiveModel {
            email: Set(email),
            first_name: Set(first_name),
            last_name: Set(last_name),
            phone: Set(request.phone),
            password_hash: Set(password_hash),
            balance: Set(Decimal::ZERO),
            is_staff: Set(false),
            is_superuser: Set(false),
            is_active: Set(true),
            referral_code: Set(referral_code),
            referred_by: Set(referrer.as_ref().map(|r| r.id)),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if let Some(referrer) = &referrer {
            ReferralService::create_referral(&txn, referrer.id, user.id, config.referral_reward).await?;
        }

        NotificationService::notify(
            &txn,
            user.id,
            NotificationKind::Success,
            "Welcome to GrowFund",
            format!("Welcome {}! Your account is ready.", user.full_name()),
        )
        .await?;

        txn.commit().await?;

        info!("User {} registered ({})", user.id, user.email);
        let token = issue_token(config, &user)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn login(
        db: &DatabaseConnection,
        config: &AppConfig,
        request: LoginRequest,
    ) -> Result<AuthResponse, AppError> {
        let email = request.email.trim().to_lowercase();
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        // 1. Trouver l'utilisateur
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
            .ok_or_else(invalid)?;

        // 2. Vérifier le mot de passe
        if !password::verify_password(&request.password, &user.password_hash).map_err(AppError::Internal)? {
            warn!("Failed login for {}", email);
            return Err(invalid());
        }

        // 3. Compte suspendu
        if !user.is_active {
            return Err(AppError::Forbidden("This account has been suspended".to_string()));
        }

        // 4. Dernière connexion
        let mut active: users::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now()));
        let user = active.update(db).await?;

        let token = issue_token(config, &user)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> Result<users::Model, AppError> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn update_profile(
        db: &DatabaseConnection,
        user_id: i32,
        request: UpdateProfileRequest,
    ) -> Result<users::Model, AppError> {
        request.validate()?;
        let user = Self::get_user(db, user_id).await?;

        let mut active: users::ActiveModel = user.into();
        if let Some(first_name) = &request.first_name {
            active.first_name = Set(clean_name("First name", first_name)?);
        }
        if let Some(last_name) = &request.last_name {
            active.last_name = Set(clean_name("Last name", last_name)?);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }

        Ok(active.update(db).await?)
    }

    pub async fn change_password(
        db: &DatabaseConnection,
        user_id: i32,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let user = Self::get_user(db, user_id).await?;

        // 1. Vérifier l'ancien mot de passe
        if !password::verify_password(&request.current_password, &user.password_hash).map_err(AppError::Internal)? {
            return Err(AppError::Unauthorized("Current password is incorrect".to_string()));
        }

        // 2. Valider puis hasher le nouveau
        password::validate_strength(&request.new_password).map_err(AppError::Validation)?;
        let new_hash = password::hash_password(&request.new_password).map_err(AppError::Internal)?;

        // 3. Mettre à jour
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.update(db).await?;

        info!("User {} changed password", user_id);
        Ok(())
    }

    /// Liste des utilisateurs (admin), les plus récents d'abord
    pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<users::Model>, AppError> {
        Ok(users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .all(db)
            .await?)
    }

    /// Suspend / réactive un compte
    pub async fn toggle_suspension(
        db: &DatabaseConnection,
        admin_id: i32,
        user_id: i32,
    ) -> Result<users::Model, AppError> {
        if admin_id == user_id {
            return Err(AppError::validation("You cannot suspend your own account"));
        }

        let user = Self::get_user(db, user_id).await?;
        let is_active = !user.is_active;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        let user = active.update(db).await?;

        info!(
            "User {} {} by admin {}",
            user.id,
            if is_active { "reactivated" } else { "suspended" },
            admin_id
        );
        Ok(user)
    }

    /// Crée (ou promeut) le compte admin configuré au démarrage
    pub async fn ensure_admin(db: &DatabaseConnection, admin: &AdminBootstrap) -> Result<users::Model, AppError> {
        let email = admin.email.trim().to_lowercase();

        if let Some(existing) = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
        {
            if existing.is_staff && existing.is_superuser && existing.is_active {
                return Ok(existing);
            }
            let mut active: users::ActiveModel = existing.into();
            active.is_staff = Set(true);
            active.is_superuser = Set(true);
            active.is_active = Set(true);
            let user = active.update(db).await?;
            info!("Promoted {} to admin", user.email);
            return Ok(user);
        }

        let now = Utc::now();
        let user = users::ActiveModel {
            email: Set(email),
            first_name: Set("Admin".to_string()),
            last_name: Set("GrowFund".to_string()),
            phone: Set(None),
            password_hash: Set(password::hash_password(&admin.password).map_err(AppError::Internal)?),
            balance: Set(Decimal::ZERO),
            is_staff: Set(true),
            is_superuser: Set(true),
            is_active: Set(true),
            referral_code: Set(ReferralService::unique_code(db).await?),
            referred_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("Created admin account {}", user.email);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::referral;
    use crate::db::test_support::memory_db;
    use rust_decimal_macros::dec;

    fn register_request(email: &str, referral_code: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "Secret123".to_string(),
            password2: "Secret123".to_string(),
            first_name: " Ama ".to_string(),
            last_name: "Mensah".to_string(),
            phone: None,
            referral_code: referral_code.map(str::to_string),
        }
    }

    #[actix_web::test]
    async fn test_register_and_login() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();

        let registered = AccountService::register(&db, &config, register_request("Ama@Example.com", None))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "ama@example.com");
        assert_eq!(registered.user.first_name, "Ama");
        assert_eq!(registered.user.referral_code.len(), 8);

        let claims = jwt::verify_token(&config.jwt, &registered.token).unwrap();
        assert_eq!(claims.sub, registered.user.id);
        assert!(!claims.is_staff);

        let logged_in = AccountService::login(
            &db,
            &config,
            LoginRequest {
                email: "AMA@example.com".to_string(),
                password: "Secret123".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(logged_in.user.last_login_at.is_some());

        let bad = AccountService::login(
            &db,
            &config,
            LoginRequest {
                email: "ama@example.com".to_string(),
                password: "Wrong1234".to_string(),
            },
        )
        .await;
        assert!(matches!(bad, Err(AppError::Unauthorized(_))));
    }

    #[actix_web::test]
    async fn test_register_rules() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();

        AccountService::register(&db, &config, register_request("dup@example.com", None))
            .await
            .unwrap();
        assert!(matches!(
            AccountService::register(&db, &config, register_request("DUP@example.com", None)).await,
            Err(AppError::Conflict(_))
        ));

        let mut mismatch = register_request("mismatch@example.com", None);
        mismatch.password2 = "Secret124".to_string();
        assert!(matches!(
            AccountService::register(&db, &config, mismatch).await,
            Err(AppError::Validation(_))
        ));

        let mut weak = register_request("weak@example.com", None);
        weak.password = "secret123".to_string();
        weak.password2 = "secret123".to_string();
        assert!(AccountService::register(&db, &config, weak).await.is_err());

        let mut short_name = register_request("name@example.com", None);
        short_name.first_name = "A".to_string();
        assert!(AccountService::register(&db, &config, short_name).await.is_err());

        assert!(matches!(
            AccountService::register(&db, &config, register_request("ref@example.com", Some("NOPE0000"))).await,
            Err(AppError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn test_register_with_referral_code() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();

        let referrer = AccountService::register(&db, &config, register_request("host@example.com", None))
            .await
            .unwrap()
            .user;
        let code = referrer.referral_code.to_lowercase();
        let referred = AccountService::register(&db, &config, register_request("guest@example.com", Some(&code)))
            .await
            .unwrap()
            .user;

        assert_eq!(referred.referred_by, Some(referrer.id));
        let referrals = referral::Entity::find().all(&db).await.unwrap();
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0].referrer_id, referrer.id);
        assert_eq!(referrals[0].reward_amount.round_dp(2), dec!(5));
    }

    #[actix_web::test]
    async fn test_suspended_user_cannot_login() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();

        let admin = AccountService::ensure_admin(
            &db,
            &AdminBootstrap {
                email: "root@example.com".to_string(),
                password: "Admin1234".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(admin.is_staff);

        let user = AccountService::register(&db, &config, register_request("bad@example.com", None))
            .await
            .unwrap()
            .user;

        assert!(AccountService::toggle_suspension(&db, admin.id, admin.id).await.is_err());
        let suspended = AccountService::toggle_suspension(&db, admin.id, user.id).await.unwrap();
        assert!(!suspended.is_active);

        let result = AccountService::login(
            &db,
            &config,
            LoginRequest {
                email: "bad@example.com".to_string(),
                password: "Secret123".to_string(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[actix_web::test]
    async fn test_change_password() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = AccountService::register(&db, &config, register_request("pw@example.com", None))
            .await
            .unwrap()
            .user;

        let wrong = ChangePasswordRequest {
            current_password: "Nope12345".to_string(),
            new_password: "Newpass123".to_string(),
        };
        assert!(matches!(
            AccountService::change_password(&db, user.id, wrong).await,
            Err(AppError::Unauthorized(_))
        ));

        let ok = ChangePasswordRequest {
            current_password: "Secret123".to_string(),
            new_password: "Newpass123".to_string(),
        };
        AccountService::change_password(&db, user.id, ok).await.unwrap();

        let login = LoginRequest {
            email: "pw@example.com".to_string(),
            password: "Newpass123".to_string(),
        };
        assert!(AccountService::login(&db, &config, login).await.is_ok());
    }
}
