use std::f64::consts::PI;

use rand::Rng;

use super::types::{
    CareerProfile, EMPLOYMENT_SHOCK_COST, EMPLOYMENT_SHOCK_THRESHOLD, HEALTH_SHOCK_COST,
    HEALTH_SHOCK_PROBABILITY, IncomeShock, MARKET_DYNAMICS, MarketSample, ReturnDistribution,
    ShockKind, YearOutcome,
};

/// Uniform draw on (0, 1); exact zeros are redrawn so `ln` stays finite.
fn open_unit<R: Rng>(rng: &mut R) -> f64 {
    loop {
        let u: f64 = rng.random();
        if u != 0.0 {
            return u;
        }
    }
}

/// Box-Muller, cosine branch only. Every call consumes two fresh uniforms.
pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1 = open_unit(rng);
    let u2 = open_unit(rng);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn sample_return<R: Rng>(dist: &ReturnDistribution, rng: &mut R) -> f64 {
    dist.mean + dist.std_dev * standard_normal(rng)
}

/// Independent draws for each asset class and inflation. No clamping: the
/// lifecycle game lets a stock year lose more than everything.
pub fn sample_market<R: Rng>(rng: &mut R) -> MarketSample {
    let stock_return = sample_return(&MARKET_DYNAMICS.stocks, rng);
    let bond_return = sample_return(&MARKET_DYNAMICS.bonds, rng);
    let cash_return = sample_return(&MARKET_DYNAMICS.cash, rng);
    let inflation = sample_return(&MARKET_DYNAMICS.inflation, rng);

    MarketSample {
        stock_return,
        bond_return,
        cash_return,
        inflation,
    }
}

pub fn classify_shock(roll: f64, current_income: f64) -> Option<IncomeShock> {
    if roll < HEALTH_SHOCK_PROBABILITY {
        Some(IncomeShock {
            kind: ShockKind::Health,
            cost: current_income * HEALTH_SHOCK_COST,
        })
    } else if roll < EMPLOYMENT_SHOCK_THRESHOLD {
        Some(IncomeShock {
            kind: ShockKind::Employment,
            cost: current_income * EMPLOYMENT_SHOCK_COST,
        })
    } else {
        None
    }
}

pub fn sample_shock<R: Rng>(current_income: f64, rng: &mut R) -> Option<IncomeShock> {
    let roll: f64 = rng.random();
    classify_shock(roll, current_income)
}

/// Wage growth loads on the realized stock return plus an idiosyncratic
/// shock scaled by `wage_shock`, a standard normal.
pub fn income_after_growth(
    profile: &CareerProfile,
    current_income: f64,
    stock_return: f64,
    wage_shock: f64,
) -> f64 {
    let wage_growth = profile.wage_growth
        + profile.market_correlation * stock_return
        + profile.volatility * wage_shock;
    current_income * (1.0 + wage_growth)
}

pub fn next_income<R: Rng>(
    profile: &CareerProfile,
    current_income: f64,
    stock_return: f64,
    rng: &mut R,
) -> f64 {
    let wage_shock = standard_normal(rng);
    income_after_growth(profile, current_income, stock_return, wage_shock)
}

pub fn draw_year<R: Rng>(
    profile: &CareerProfile,
    current_income: f64,
    rng: &mut R,
) -> YearOutcome {
    let market = sample_market(rng);
    let new_income = next_income(profile, current_income, market.stock_return, rng);
    let shock = sample_shock(current_income, rng);

    YearOutcome {
        market,
        new_income,
        shock,
    }
}
