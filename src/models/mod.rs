// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table avec SeaORM (tables créées au
//   démarrage par db::create_schema).
//
// Liste des modules:
//   - health : Health check API
//   - enums : Types énumérés stockés en VARCHAR
//   - dto : Data Transfer Objects pour les requêtes/réponses API
//   - users : Utilisateurs (solde, parrainage, droits admin)
//   - referral : Parrainages et récompenses
//   - investment_plan : Plans d'investissement à croissance composée
//   - trade / trade_history : Trades simulés (or, USDT) et leur historique
//   - crypto_price / crypto_price_history : Prix crypto fixés par l'admin
//   - crypto_holding : Positions crypto des utilisateurs
//   - transaction : Journal des mouvements de solde
//   - notification : Notifications utilisateur
//
// Points d'attention:
//   - Tous les montants sont des Decimal (jamais de f64)
//   - Les relations entre tables sont définies dans chaque modèle
//
// ============================================================================

pub mod health;
pub mod enums;
pub mod dto;
pub mod users;
pub mod referral;
pub mod investment_plan;
pub mod trade;
pub mod trade_history;
pub mod crypto_price;
pub mod crypto_price_history;
pub mod crypto_holding;
pub mod transaction;
pub mod notification;
