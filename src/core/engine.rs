use rand::Rng;
use serde::Serialize;

use super::market::draw_year;
use super::types::{
    CareerType, RETIREMENT_AGE, RunPhase, SCORE_MULTIPLIER, STARTING_AGE, STARTING_INCOME,
    STARTING_SAVINGS_RATE, STARTING_WEALTH, ShockKind, SimulationSummary, Termination,
    YearDecisions, YearOutcome, YearRecord,
};
use super::valuation::{human_capital, total_balance_sheet, utility};

/// One lifetime, from the first pay cheque to retirement or ruin.
///
/// Only [`SimulationState::advance_year`] and [`SimulationState::apply_year`]
/// mutate a run, and both are no-ops once the run has terminated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    age: u32,
    wealth: f64,
    income: f64,
    career_type: CareerType,
    history: Vec<YearRecord>,
    is_game_over: bool,
    total_utility: f64,
    termination: Option<Termination>,
}

impl SimulationState {
    pub fn start(career_type: CareerType) -> Self {
        let savings = STARTING_INCOME * STARTING_SAVINGS_RATE;
        let consumption = STARTING_INCOME - savings;
        let seed_year = YearRecord {
            age: STARTING_AGE,
            wealth: STARTING_WEALTH,
            income: STARTING_INCOME,
            consumption,
            savings,
            portfolio_return: 0.0,
            inflation: 0.0,
            utility: utility(consumption, consumption),
            event: Some("Started career".to_string()),
        };

        Self {
            age: STARTING_AGE,
            wealth: STARTING_WEALTH,
            income: STARTING_INCOME,
            career_type,
            history: vec![seed_year],
            is_game_over: false,
            total_utility: 0.0,
            termination: None,
        }
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn wealth(&self) -> f64 {
        self.wealth
    }

    pub fn income(&self) -> f64 {
        self.income
    }

    pub fn career_type(&self) -> CareerType {
        self.career_type
    }

    pub fn history(&self) -> &[YearRecord] {
        &self.history
    }

    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }

    pub fn total_utility(&self) -> f64 {
        self.total_utility
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn phase(&self) -> RunPhase {
        match self.termination {
            Some(reason) => RunPhase::Terminated(reason),
            None => RunPhase::InProgress,
        }
    }

    /// Consumption of the seed year; every later year is scored against it.
    pub fn baseline_consumption(&self) -> f64 {
        self.history[0].consumption
    }

    pub fn human_capital(&self) -> f64 {
        human_capital(self.age, self.income, self.career_type.profile())
    }

    pub fn total_balance_sheet(&self) -> f64 {
        total_balance_sheet(
            self.wealth,
            self.age,
            self.income,
            self.career_type.profile(),
        )
    }

    /// Draws one year of market, wage and shock outcomes and applies them.
    /// Returns the appended record, or `None` when the run is already over.
    pub fn advance_year<R: Rng>(
        &mut self,
        decisions: &YearDecisions,
        rng: &mut R,
    ) -> Option<&YearRecord> {
        if self.is_game_over {
            return None;
        }
        let outcome = draw_year(self.career_type.profile(), self.income, rng);
        self.apply_year(decisions, &outcome)
    }

    /// Applies an already-realized year. The new record is built in full
    /// before any field of the state changes.
    pub fn apply_year(
        &mut self,
        decisions: &YearDecisions,
        outcome: &YearOutcome,
    ) -> Option<&YearRecord> {
        if self.is_game_over {
            return None;
        }

        let market = &outcome.market;
        let portfolio_return = decisions.stock_allocation * market.stock_return
            + decisions.bond_allocation * market.bond_return
            + decisions.cash_allocation() * market.cash_return;

        let returns_in_dollars = self.wealth * portfolio_return;
        let savings = self.income * decisions.savings_rate;
        let consumption = self.income - savings;
        let new_wealth =
            (self.wealth + returns_in_dollars + savings - outcome.shock_cost()).max(0.0);
        let year_utility = utility(consumption, self.baseline_consumption());
        let new_age = self.age + 1;

        let record = YearRecord {
            age: new_age,
            wealth: new_wealth,
            income: outcome.new_income,
            consumption,
            savings,
            portfolio_return,
            inflation: market.inflation,
            utility: year_utility,
            event: Some(describe_year(outcome)),
        };

        let termination = if new_wealth <= 0.0 {
            Some(Termination::Ruin)
        } else if new_age >= RETIREMENT_AGE {
            Some(Termination::Retired)
        } else {
            None
        };

        self.age = new_age;
        self.wealth = new_wealth;
        self.income = outcome.new_income;
        self.total_utility += year_utility;
        self.termination = termination;
        self.is_game_over = termination.is_some();
        self.history.push(record);

        if let Some(reason) = termination {
            log::debug!(
                "{:?} career terminated by {:?} at age {} with wealth {:.2}",
                self.career_type,
                reason,
                self.age,
                self.wealth
            );
        }

        self.history.last()
    }

    /// Advances until the run terminates. Returns the number of years played.
    pub fn run_to_completion<R: Rng>(&mut self, decisions: &YearDecisions, rng: &mut R) -> u32 {
        let mut years = 0;
        while self.advance_year(decisions, rng).is_some() {
            years += 1;
        }
        years
    }

    /// Cross-run record for this lifetime; `None` while still in progress.
    pub fn summary(&self) -> Option<SimulationSummary> {
        let termination = self.termination?;
        Some(SimulationSummary {
            career_type: self.career_type,
            final_wealth: self.wealth,
            score: (self.total_utility * SCORE_MULTIPLIER).max(0.0),
            age_reached: self.age,
            was_ruin: termination == Termination::Ruin,
        })
    }
}

fn describe_year(outcome: &YearOutcome) -> String {
    let stock_return = outcome.market.stock_return;
    let direction = if stock_return > 0.0 { "Up" } else { "Down" };
    let mut event = format!(
        "Markets: Stocks {direction} ({:.1}%)",
        stock_return * 100.0
    );
    if let Some(shock) = outcome.shock {
        let label = match shock.kind {
            ShockKind::Health => "Medical emergency",
            ShockKind::Employment => "Layoff",
        };
        event.push_str(&format!(
            " | {label} hit you for ${}!",
            format_dollars(shock.cost)
        ));
    }
    event
}

/// en-US style amount: comma-grouped whole dollars, then up to two
/// fractional digits with trailing zeros dropped.
fn format_dollars(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    match fraction {
        0 => format!("{sign}{grouped}"),
        f if f % 10 == 0 => format!("{sign}{grouped}.{}", f / 10),
        f => format!("{sign}{grouped}.{f:02}"),
    }
}

/// Phase-aware wrapper: a game that has not started yet, or the current run.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSimulation {
    state: Option<SimulationState>,
}

impl LifecycleSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a fresh run, discarding any previous one.
    pub fn start(&mut self, career_type: CareerType) -> &SimulationState {
        self.state.insert(SimulationState::start(career_type))
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn phase(&self) -> RunPhase {
        self.state
            .as_ref()
            .map_or(RunPhase::NotStarted, SimulationState::phase)
    }

    pub fn advance_year<R: Rng>(
        &mut self,
        decisions: &YearDecisions,
        rng: &mut R,
    ) -> Option<&YearRecord> {
        self.state.as_mut()?.advance_year(decisions, rng)
    }

    pub fn summary(&self) -> Option<SimulationSummary> {
        self.state.as_ref().and_then(SimulationState::summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IncomeShock, MarketSample};
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn flat_outcome(stock: f64, bond: f64, cash: f64, new_income: f64) -> YearOutcome {
        YearOutcome {
            market: MarketSample {
                stock_return: stock,
                bond_return: bond,
                cash_return: cash,
                inflation: 0.02,
            },
            new_income,
            shock: None,
        }
    }

    fn default_decisions() -> YearDecisions {
        YearDecisions {
            savings_rate: 0.2,
            stock_allocation: 0.8,
            bond_allocation: 0.1,
        }
    }

    #[test]
    fn start_seeds_one_record_at_twenty_five() {
        let state = SimulationState::start(CareerType::Stable);

        assert_eq!(state.age(), 25);
        assert_approx(state.wealth(), 20_000.0);
        assert_approx(state.income(), 50_000.0);
        assert_eq!(state.history().len(), 1);
        assert!(!state.is_game_over());
        assert_eq!(state.total_utility(), 0.0);
        assert_eq!(state.phase(), RunPhase::InProgress);

        let seed = &state.history()[0];
        assert_approx(seed.consumption, 40_000.0);
        assert_approx(seed.savings, 10_000.0);
        assert_eq!(seed.utility, 0.0);
        assert_eq!(seed.event.as_deref(), Some("Started career"));
    }

    #[test]
    fn oracle_single_year_matches_hand_calculation() {
        let mut state = SimulationState::start(CareerType::Stable);
        let outcome = flat_outcome(0.10, 0.04, 0.01, 52_000.0);

        let record = state
            .apply_year(&default_decisions(), &outcome)
            .expect("run in progress")
            .clone();

        // 0.8 * 0.10 + 0.1 * 0.04 + 0.1 * 0.01
        let portfolio_return = 0.085;
        assert_approx(record.portfolio_return, portfolio_return);
        assert_approx(record.savings, 10_000.0);
        assert_approx(record.consumption, 40_000.0);
        assert_approx(record.wealth, 20_000.0 * 1.085 + 10_000.0);
        assert_approx(record.income, 52_000.0);
        assert_eq!(record.age, 26);
        assert_eq!(record.utility, 0.0);
        assert_eq!(
            record.event.as_deref(),
            Some("Markets: Stocks Up (10.0%)")
        );
        assert_approx(state.wealth(), record.wealth);
        assert_approx(state.income(), 52_000.0);
    }

    #[test]
    fn dollar_amounts_are_grouped_with_optional_cents() {
        assert_eq!(format_dollars(0.0), "0");
        assert_eq!(format_dollars(950.0), "950");
        assert_eq!(format_dollars(20_000.0), "20,000");
        assert_eq!(format_dollars(1_234_567.0), "1,234,567");
        assert_eq!(format_dollars(12_345.5), "12,345.5");
        assert_eq!(format_dollars(9_876.543), "9,876.54");
        assert_eq!(format_dollars(-4_200.25), "-4,200.25");
    }

    #[test]
    fn shock_cost_uses_income_before_growth() {
        let mut state = SimulationState::start(CareerType::Cyclical);
        let mut outcome = flat_outcome(-0.05, 0.0, 0.0, 60_000.0);
        outcome.shock = Some(IncomeShock {
            kind: ShockKind::Employment,
            cost: 20_000.0,
        });
        let decisions = YearDecisions {
            savings_rate: 0.1,
            stock_allocation: 1.0,
            bond_allocation: 0.0,
        };

        let record = state.apply_year(&decisions, &outcome).expect("in progress");
        assert_approx(record.wealth, 20_000.0 * 0.95 + 5_000.0 - 20_000.0);
        assert_eq!(
            record.event.as_deref(),
            Some("Markets: Stocks Down (-5.0%) | Layoff hit you for $20,000!")
        );
    }

    #[test]
    fn utility_is_scored_against_the_seed_year_not_the_prior_year() {
        let mut state = SimulationState::start(CareerType::Stable);
        let decisions = YearDecisions {
            savings_rate: 0.0,
            stock_allocation: 0.0,
            bond_allocation: 0.0,
        };

        state.apply_year(&decisions, &flat_outcome(0.0, 0.0, 0.0, 100_000.0));
        let record = state
            .apply_year(&decisions, &flat_outcome(0.0, 0.0, 0.0, 100_000.0))
            .expect("in progress");

        // 100k consumed against a 40k baseline, both years.
        assert_approx(record.utility, (100_000.0_f64 / 40_000.0).ln());
        assert_approx(
            state.total_utility(),
            (50_000.0_f64 / 40_000.0).ln() + 2.5_f64.ln(),
        );
    }

    #[test]
    fn exact_zero_wealth_is_ruin_before_retirement() {
        let mut state = SimulationState::start(CareerType::Stable);
        let all_stocks_no_savings = YearDecisions {
            savings_rate: 0.0,
            stock_allocation: 1.0,
            bond_allocation: 0.0,
        };

        state.apply_year(&all_stocks_no_savings, &flat_outcome(-1.0, 0.0, 0.0, 50_000.0));

        assert_eq!(state.wealth(), 0.0);
        assert_eq!(state.age(), 26);
        assert!(state.is_game_over());
        assert_eq!(state.phase(), RunPhase::Terminated(Termination::Ruin));
        let summary = state.summary().expect("terminated");
        assert!(summary.was_ruin);
        assert_eq!(summary.age_reached, 26);
    }

    #[test]
    fn losses_beyond_wealth_are_floored_at_zero() {
        let mut state = SimulationState::start(CareerType::Stable);
        let leveraged = YearDecisions {
            savings_rate: 0.0,
            stock_allocation: 1.5,
            bond_allocation: 0.0,
        };

        state.apply_year(&leveraged, &flat_outcome(-0.9, 0.0, 0.3, 50_000.0));
        assert_eq!(state.wealth(), 0.0);
        assert_eq!(state.termination(), Some(Termination::Ruin));
    }

    #[test]
    fn reaching_sixty_five_retires_the_run() {
        let mut state = SimulationState::start(CareerType::Stable);
        let outcome = flat_outcome(0.05, 0.03, 0.01, 50_000.0);
        for _ in 0..39 {
            state.apply_year(&default_decisions(), &outcome);
        }
        assert_eq!(state.age(), 64);
        assert!(!state.is_game_over());

        state.apply_year(&default_decisions(), &outcome);
        assert_eq!(state.age(), 65);
        assert_eq!(state.phase(), RunPhase::Terminated(Termination::Retired));
        assert_eq!(state.history().len(), 41);
        assert_eq!(state.human_capital(), 0.0);
    }

    #[test]
    fn advances_after_termination_are_silent_no_ops() {
        let mut state = SimulationState::start(CareerType::Cyclical);
        let wipe_out = YearDecisions {
            savings_rate: 0.0,
            stock_allocation: 1.0,
            bond_allocation: 0.0,
        };
        state.apply_year(&wipe_out, &flat_outcome(-1.0, 0.0, 0.0, 50_000.0));
        let frozen = state.clone();

        let mut rng = Pcg64::seed_from_u64(1);
        for _ in 0..5 {
            assert!(state.advance_year(&default_decisions(), &mut rng).is_none());
            assert!(
                state
                    .apply_year(&default_decisions(), &flat_outcome(1.0, 1.0, 1.0, 1e6))
                    .is_none()
            );
        }

        assert_eq!(state.age(), frozen.age());
        assert_eq!(state.wealth(), frozen.wealth());
        assert_eq!(state.income(), frozen.income());
        assert_eq!(state.history().len(), frozen.history().len());
        assert_eq!(state.total_utility(), frozen.total_utility());
    }

    #[test]
    fn seeded_forty_year_run_ends_at_retirement() {
        let mut state = SimulationState::start(CareerType::Stable);
        let mut rng = Pcg64::seed_from_u64(2024);

        for _ in 0..40 {
            state.advance_year(&default_decisions(), &mut rng);
        }

        assert!(state.is_game_over());
        assert_eq!(state.termination(), Some(Termination::Retired));
        assert_eq!(state.age(), 65);
        assert_eq!(state.history().len(), 41);
        assert!(state.wealth() > 0.0);
    }

    #[test]
    fn summary_scores_ten_times_utility_floored_at_zero() {
        let mut state = SimulationState::start(CareerType::Stable);
        assert!(state.summary().is_none());

        let decisions = YearDecisions {
            savings_rate: 0.0,
            stock_allocation: 0.0,
            bond_allocation: 0.0,
        };
        for _ in 0..40 {
            state.apply_year(&decisions, &flat_outcome(0.0, 0.0, 0.0, 50_000.0));
        }

        let summary = state.summary().expect("retired");
        assert!(!summary.was_ruin);
        assert_eq!(summary.age_reached, 65);
        assert_eq!(summary.career_type, CareerType::Stable);
        assert_approx(summary.final_wealth, 20_000.0);
        assert_approx(
            summary.score,
            40.0 * (50_000.0_f64 / 40_000.0).ln() * 10.0,
        );

        let mut gloomy = SimulationState::start(CareerType::Stable);
        let frugal = YearDecisions {
            savings_rate: 0.8,
            stock_allocation: 0.0,
            bond_allocation: 0.0,
        };
        for _ in 0..40 {
            gloomy.apply_year(&frugal, &flat_outcome(0.0, 0.0, 0.0, 50_000.0));
        }
        assert_eq!(gloomy.summary().expect("retired").score, 0.0);
    }

    #[test]
    fn lifecycle_phases_follow_the_run() {
        let mut game = LifecycleSimulation::new();
        let mut rng = Pcg64::seed_from_u64(8);
        assert_eq!(game.phase(), RunPhase::NotStarted);
        assert!(game.advance_year(&default_decisions(), &mut rng).is_none());
        assert!(game.summary().is_none());

        game.start(CareerType::Cyclical);
        assert_eq!(game.phase(), RunPhase::InProgress);
        while game.advance_year(&default_decisions(), &mut rng).is_some() {}
        assert!(matches!(game.phase(), RunPhase::Terminated(_)));
        assert!(game.summary().is_some());

        let restarted = game.start(CareerType::Stable);
        assert_eq!(restarted.age(), 25);
        assert_eq!(game.phase(), RunPhase::InProgress);
    }

    proptest! {
        #[test]
        fn prop_advances_keep_age_and_wealth_invariants(
            seed in any::<u64>(),
            career_is_stable in any::<bool>(),
            savings_rate in 0.0_f64..=0.8,
            stock in 0.0_f64..=1.0,
            bond_share in 0.0_f64..=1.0,
        ) {
            let career = if career_is_stable { CareerType::Stable } else { CareerType::Cyclical };
            let decisions = YearDecisions {
                savings_rate,
                stock_allocation: stock,
                bond_allocation: (1.0 - stock) * bond_share,
            };
            let mut state = SimulationState::start(career);
            let mut rng = Pcg64::seed_from_u64(seed);

            let mut advances = 0;
            while state.advance_year(&decisions, &mut rng).is_some() {
                advances += 1;
                prop_assert_eq!(state.age(), 25 + advances);
                prop_assert!(state.wealth() >= 0.0);
                prop_assert_eq!(state.history().len() as u32, advances + 1);
            }

            prop_assert!(advances >= 1 && advances <= 40);
            prop_assert!(state.is_game_over());
            prop_assert!(state.age() == 65 || state.wealth() <= 0.0);

            let age = state.age();
            let wealth = state.wealth();
            let len = state.history().len();
            for _ in 0..3 {
                prop_assert!(state.advance_year(&decisions, &mut rng).is_none());
            }
            prop_assert_eq!(state.age(), age);
            prop_assert_eq!(state.wealth(), wealth);
            prop_assert_eq!(state.history().len(), len);
        }
    }
}
