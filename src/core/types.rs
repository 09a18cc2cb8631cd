use serde::{Deserialize, Serialize};

pub const STARTING_AGE: u32 = 25;
pub const RETIREMENT_AGE: u32 = 65;
pub const STARTING_WEALTH: f64 = 20_000.0;
pub const STARTING_INCOME: f64 = 50_000.0;
/// Savings rate assumed for the seed year of every run.
pub const STARTING_SAVINGS_RATE: f64 = 0.2;

pub const HUMAN_CAPITAL_DISCOUNT_RATE: f64 = 0.04;
pub const RUIN_UTILITY_PENALTY: f64 = -100.0;
pub const SCORE_MULTIPLIER: f64 = 10.0;
pub const MAX_HISTORY_ENTRIES: usize = 10;

pub const HEALTH_SHOCK_PROBABILITY: f64 = 0.05;
pub const HEALTH_SHOCK_COST: f64 = 0.2;
/// Cumulative threshold: employment shocks occupy [0.05, 0.08).
pub const EMPLOYMENT_SHOCK_THRESHOLD: f64 = 0.08;
pub const EMPLOYMENT_SHOCK_COST: f64 = 0.4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReturnDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MarketDynamics {
    pub stocks: ReturnDistribution,
    pub bonds: ReturnDistribution,
    pub cash: ReturnDistribution,
    pub inflation: ReturnDistribution,
}

pub const MARKET_DYNAMICS: MarketDynamics = MarketDynamics {
    stocks: ReturnDistribution {
        mean: 0.08,
        std_dev: 0.18,
    },
    bonds: ReturnDistribution {
        mean: 0.03,
        std_dev: 0.05,
    },
    cash: ReturnDistribution {
        mean: 0.01,
        std_dev: 0.01,
    },
    inflation: ReturnDistribution {
        mean: 0.02,
        std_dev: 0.015,
    },
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CareerProfile {
    pub wage_growth: f64,
    pub volatility: f64,
    pub market_correlation: f64,
    pub description: &'static str,
}

pub const STABLE_PROFILE: CareerProfile = CareerProfile {
    wage_growth: 0.02,
    volatility: 0.05,
    market_correlation: 0.1,
    description: "Low volatility, bond-like wages. Good for higher equity risk.",
};

pub const CYCLICAL_PROFILE: CareerProfile = CareerProfile {
    wage_growth: 0.04,
    volatility: 0.15,
    market_correlation: 0.7,
    description: "High growth potential but moves with the stock market.",
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareerType {
    #[serde(alias = "stable", alias = "Stable")]
    Stable,
    #[serde(alias = "cyclical", alias = "Cyclical")]
    Cyclical,
}

impl CareerType {
    pub fn profile(self) -> &'static CareerProfile {
        match self {
            CareerType::Stable => &STABLE_PROFILE,
            CareerType::Cyclical => &CYCLICAL_PROFILE,
        }
    }
}

/// Per-year choices supplied by the caller. Bounds are enforced upstream;
/// the cash weight is always derived.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearDecisions {
    pub savings_rate: f64,
    pub stock_allocation: f64,
    pub bond_allocation: f64,
}

impl YearDecisions {
    pub fn cash_allocation(&self) -> f64 {
        1.0 - self.stock_allocation - self.bond_allocation
    }
}

impl Default for YearDecisions {
    fn default() -> Self {
        Self {
            savings_rate: 0.2,
            stock_allocation: 0.8,
            bond_allocation: 0.1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MarketSample {
    pub stock_return: f64,
    pub bond_return: f64,
    pub cash_return: f64,
    pub inflation: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShockKind {
    Health,
    Employment,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IncomeShock {
    pub kind: ShockKind,
    pub cost: f64,
}

/// Every random outcome of one simulated year.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct YearOutcome {
    pub market: MarketSample,
    pub new_income: f64,
    pub shock: Option<IncomeShock>,
}

impl YearOutcome {
    pub fn shock_cost(&self) -> f64 {
        self.shock.map_or(0.0, |shock| shock.cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub age: u32,
    pub wealth: f64,
    pub income: f64,
    pub consumption: f64,
    pub savings: f64,
    pub portfolio_return: f64,
    pub inflation: f64,
    pub utility: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Termination {
    Ruin,
    Retired,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum RunPhase {
    NotStarted,
    InProgress,
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub career_type: CareerType,
    pub final_wealth: f64,
    pub score: f64,
    pub age_reached: u32,
    pub was_ruin: bool,
}
