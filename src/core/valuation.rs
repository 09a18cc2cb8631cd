use super::types::{
    CareerProfile, HUMAN_CAPITAL_DISCOUNT_RATE, RETIREMENT_AGE, RUIN_UTILITY_PENALTY,
};

/// Log utility of `consumption` measured against the run's fixed baseline.
pub fn utility(consumption: f64, baseline_consumption: f64) -> f64 {
    if consumption <= 0.0 {
        return RUIN_UTILITY_PENALTY;
    }
    (consumption / baseline_consumption).ln()
}

/// Present value of labour income from `age` until retirement, valued as a
/// growing annuity at the career's wage drift.
pub fn human_capital(age: u32, income: f64, profile: &CareerProfile) -> f64 {
    let years_left = RETIREMENT_AGE.saturating_sub(age);
    if years_left == 0 {
        return 0.0;
    }

    let growth = profile.wage_growth;
    let r = HUMAN_CAPITAL_DISCOUNT_RATE - growth;
    if r == 0.0 {
        return income * years_left as f64;
    }

    let ratio = (1.0 + growth) / (1.0 + HUMAN_CAPITAL_DISCOUNT_RATE);
    income * (1.0 - ratio.powf(f64::from(years_left))) / r
}

pub fn total_balance_sheet(wealth: f64, age: u32, income: f64, profile: &CareerProfile) -> f64 {
    wealth + human_capital(age, income, profile)
}
