mod analysis;
mod engine;
mod history;
mod market;
mod types;
mod valuation;

pub use analysis::{
    AgeTracePoint, AnalysisInputs, CareerComparison, PolicyAnalysis, compare_careers,
    run_policy_analysis,
};
pub use engine::{LifecycleSimulation, SimulationState};
pub use history::{HistoryStore, JsonFileStore, RunHistory};
pub use market::{
    classify_shock, draw_year, income_after_growth, next_income, sample_market, sample_shock,
    standard_normal,
};
pub use types::{
    CYCLICAL_PROFILE, CareerProfile, CareerType, EMPLOYMENT_SHOCK_COST,
    EMPLOYMENT_SHOCK_THRESHOLD, HEALTH_SHOCK_COST, HEALTH_SHOCK_PROBABILITY,
    HUMAN_CAPITAL_DISCOUNT_RATE, IncomeShock, MARKET_DYNAMICS, MAX_HISTORY_ENTRIES,
    MarketDynamics, MarketSample, RETIREMENT_AGE, RUIN_UTILITY_PENALTY, ReturnDistribution,
    RunPhase, SCORE_MULTIPLIER, STABLE_PROFILE, STARTING_AGE, STARTING_INCOME,
    STARTING_SAVINGS_RATE, STARTING_WEALTH, ShockKind, SimulationSummary, Termination,
    YearDecisions, YearOutcome, YearRecord,
};
pub use valuation::{human_capital, total_balance_sheet, utility};
