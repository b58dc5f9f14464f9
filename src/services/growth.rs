// Projection de croissance composée mensuelle des plans d'investissement
//
// Pour chaque mois m = 1..=n:
//   starting_amount = ending_amount du mois précédent (mois 1: initial_amount)
//   monthly_gain    = round2(starting_amount * growth_rate / 100)
//   ending_amount   = starting_amount + monthly_gain
//
// L'arrondi est appliqué à CHAQUE étape: final_amount peut donc différer de
// quelques centimes de initial * (1 + rate)^n calculé sans arrondi.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::enums::PlanType;
use crate::utils::money::{round2, MAX_AMOUNT};

pub const MIN_PERIOD_MONTHS: i32 = 1;
pub const MAX_PERIOD_MONTHS: i32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGrowth {
    pub month: i32,
    pub starting_amount: Decimal,
    pub growth_rate: Decimal,
    pub monthly_gain: Decimal,
    pub ending_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthProjection {
    pub months: Vec<MonthlyGrowth>,
    pub total_return: Decimal,
    pub final_amount: Decimal,
}

/// Taux mensuel (en %) retenu pour un type de plan
/// basic et standard ont un taux fixe; advance accepte 40, 50 ou 60 (40 par défaut)
pub fn resolve_growth_rate(plan_type: PlanType, requested: Option<Decimal>) -> Result<Decimal, String> {
    match plan_type {
        PlanType::Basic => Ok(Decimal::from(20)),
        PlanType::Standard => Ok(Decimal::from(30)),
        PlanType::Advance => match requested {
            None => Ok(Decimal::from(40)),
            Some(rate) if [40, 50, 60].iter().any(|r| Decimal::from(*r) == rate) => Ok(rate),
            Some(_) => Err("Advance plan growth rate must be 40%, 50%, or 60%".to_string()),
        },
    }
}

/// Calcule la projection mois par mois
pub fn project(initial_amount: Decimal, growth_rate: Decimal, period_months: i32) -> Result<GrowthProjection, String> {
    if initial_amount <= Decimal::ZERO {
        return Err("Initial amount must be greater than 0".to_string());
    }
    if !(MIN_PERIOD_MONTHS..=MAX_PERIOD_MONTHS).contains(&period_months) {
        return Err(format!(
            "period_months must be between {} and {}",
            MIN_PERIOD_MONTHS, MAX_PERIOD_MONTHS
        ));
    }
    if growth_rate < Decimal::ZERO {
        return Err("Growth rate cannot be negative".to_string());
    }

    let initial = round2(initial_amount);
    let rate = growth_rate / Decimal::ONE_HUNDRED;

    let mut months = Vec::with_capacity(period_months as usize);
    let mut current = initial;

    for month in 1..=period_months {
        let monthly_gain = current
            .checked_mul(rate)
            .map(round2)
            .ok_or("Projection exceeds supported amount range")?;
        let ending_amount = current
            .checked_add(monthly_gain)
            .filter(|amount| *amount <= MAX_AMOUNT)
            .ok_or("Projection exceeds supported amount range")?;

        months.push(MonthlyGrowth {
            month,
            starting_amount: current,
            growth_rate,
            monthly_gain,
            ending_amount,
        });

        current = ending_amount;
    }

    Ok(GrowthProjection {
        months,
        total_return: current - initial,
        final_amount: current,
    })
}
