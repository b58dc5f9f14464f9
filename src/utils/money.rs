// Arrondis monétaires partagés par tous les calculs (plans, trades, crypto)
use rust_decimal::{Decimal, RoundingStrategy};

/// Plus grand montant stockable dans une colonne monétaire numeric(16,2)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_874_919_423, 2_328_306, 0, false, 2);

/// Arrondi à 2 décimales, demi-unité vers l'extérieur (0.005 → 0.01)
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Arrondi des quantités crypto (8 décimales, troncature vers zéro)
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(8, RoundingStrategy::ToZero)
}

/// part / total * 100, ou 0 si total est nul
pub fn percentage(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        round2(part / total * Decimal::ONE_HUNDRED)
    }
}
