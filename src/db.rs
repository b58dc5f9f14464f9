// connexion BD + création du schéma à partir des entités SeaORM

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::info;

use crate::models::{
    crypto_holding, crypto_price, crypto_price_history, investment_plan, notification, referral,
    trade, trade_history, transaction, users,
};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);

    Database::connect(options).await
}

/// Crée les tables manquantes (CREATE TABLE IF NOT EXISTS)
/// L'ordre respecte les clés étrangères: users d'abord
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(referral::Entity),
        schema.create_table_from_entity(investment_plan::Entity),
        schema.create_table_from_entity(trade::Entity),
        schema.create_table_from_entity(trade_history::Entity),
        schema.create_table_from_entity(crypto_price::Entity),
        schema.create_table_from_entity(crypto_price_history::Entity),
        schema.create_table_from_entity(crypto_holding::Entity),
        schema.create_table_from_entity(transaction::Entity),
        schema.create_table_from_entity(notification::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    info!("Database schema ready ({} tables)", statements.len());
    Ok(())
}
