use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;

use super::engine::SimulationState;
use super::types::{CareerType, RETIREMENT_AGE, STARTING_AGE, SimulationSummary, YearDecisions};
use super::valuation::human_capital;

#[derive(Debug, Clone, Copy)]
pub struct AnalysisInputs {
    pub career_type: CareerType,
    pub decisions: YearDecisions,
    pub simulations: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeTracePoint {
    pub age: u32,
    pub median_wealth: f64,
    pub p10_wealth: f64,
    pub median_income: f64,
    pub median_human_capital: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAnalysis {
    pub career_type: CareerType,
    pub decisions: YearDecisions,
    pub simulations: u32,
    pub ruin_rate: f64,
    pub median_final_wealth: f64,
    pub p10_final_wealth: f64,
    pub p90_final_wealth: f64,
    pub median_score: f64,
    pub mean_total_utility: f64,
    pub mean_age_reached: f64,
    pub trace: Vec<AgeTracePoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerComparison {
    pub stable: PolicyAnalysis,
    pub cyclical: PolicyAnalysis,
}

struct ScenarioResult {
    summary: SimulationSummary,
    total_utility: f64,
}

#[derive(Debug, Clone, Copy)]
struct YearTracePoint {
    wealth: f64,
    income: f64,
    human_capital: f64,
}

struct YearlyAccumulator {
    ages: Vec<u32>,
    wealth: Vec<Vec<f64>>,
    income: Vec<Vec<f64>>,
    human_capital: Vec<Vec<f64>>,
}

impl YearlyAccumulator {
    fn new(ages: Vec<u32>, expected_samples: usize) -> Self {
        let n = ages.len();
        let make = || {
            (0..n)
                .map(|_| Vec::with_capacity(expected_samples))
                .collect::<Vec<_>>()
        };
        Self {
            ages,
            wealth: make(),
            income: make(),
            human_capital: make(),
        }
    }

    fn push(&mut self, index: usize, point: YearTracePoint) {
        self.wealth[index].push(point.wealth);
        self.income[index].push(point.income);
        self.human_capital[index].push(point.human_capital);
    }

    fn into_results(mut self) -> Vec<AgeTracePoint> {
        let mut out = Vec::with_capacity(self.ages.len());
        for (idx, age) in self.ages.iter().copied().enumerate() {
            out.push(AgeTracePoint {
                age,
                median_wealth: percentile(&mut self.wealth[idx], 50.0),
                p10_wealth: percentile(&mut self.wealth[idx], 10.0),
                median_income: percentile(&mut self.income[idx], 50.0),
                median_human_capital: percentile(&mut self.human_capital[idx], 50.0),
            });
        }
        out
    }
}

/// Plays `simulations` independent lifetimes under one fixed policy.
pub fn run_policy_analysis(inputs: &AnalysisInputs) -> PolicyAnalysis {
    let simulations = inputs.simulations.max(1);
    let ages: Vec<u32> = (STARTING_AGE..=RETIREMENT_AGE).collect();
    let mut yearly = YearlyAccumulator::new(ages, simulations as usize);

    let mut final_wealth = Vec::with_capacity(simulations as usize);
    let mut scores = Vec::with_capacity(simulations as usize);
    let mut ruined = 0_u32;
    let mut utility_sum = 0.0;
    let mut age_sum = 0.0;

    for scenario_id in 0..simulations {
        let mut trace = Vec::with_capacity(yearly.ages.len());
        let result = simulate_scenario(inputs, scenario_id, &mut trace);
        push_ruin_tail(&mut trace, inputs.career_type);
        for (idx, point) in trace.into_iter().enumerate() {
            yearly.push(idx, point);
        }

        if result.summary.was_ruin {
            ruined += 1;
        }
        final_wealth.push(result.summary.final_wealth);
        scores.push(result.summary.score);
        utility_sum += result.total_utility;
        age_sum += result.summary.age_reached as f64;
    }

    let n = simulations as f64;
    PolicyAnalysis {
        career_type: inputs.career_type,
        decisions: inputs.decisions,
        simulations,
        ruin_rate: ruined as f64 / n,
        median_final_wealth: percentile(&mut final_wealth, 50.0),
        p10_final_wealth: percentile(&mut final_wealth, 10.0),
        p90_final_wealth: percentile(&mut final_wealth, 90.0),
        median_score: percentile(&mut scores, 50.0),
        mean_total_utility: utility_sum / n,
        mean_age_reached: age_sum / n,
        trace: yearly.into_results(),
    }
}

/// Same policy and seed for both careers, so the paths share market luck.
pub fn compare_careers(
    decisions: YearDecisions,
    simulations: u32,
    seed: u64,
) -> CareerComparison {
    let run = |career_type: CareerType| {
        run_policy_analysis(&AnalysisInputs {
            career_type,
            decisions,
            simulations,
            seed,
        })
    };
    CareerComparison {
        stable: run(CareerType::Stable),
        cyclical: run(CareerType::Cyclical),
    }
}

fn simulate_scenario(
    inputs: &AnalysisInputs,
    scenario_id: u32,
    trace: &mut Vec<YearTracePoint>,
) -> ScenarioResult {
    let mut rng = Pcg64::seed_from_u64(derive_seed(inputs.seed, scenario_id));
    let mut state = SimulationState::start(inputs.career_type);
    trace.push(trace_point(&state));

    while state.advance_year(&inputs.decisions, &mut rng).is_some() {
        trace.push(trace_point(&state));
    }

    let summary = state
        .summary()
        .unwrap_or_else(|| unreachable!("advance_year only stops on a terminated run"));
    ScenarioResult {
        summary,
        total_utility: state.total_utility(),
    }
}

fn trace_point(state: &SimulationState) -> YearTracePoint {
    YearTracePoint {
        wealth: state.wealth(),
        income: state.income(),
        human_capital: state.human_capital(),
    }
}

/// Ruined careers keep their last income and hold zero wealth to 65.
fn push_ruin_tail(trace: &mut Vec<YearTracePoint>, career_type: CareerType) {
    let expected = (RETIREMENT_AGE - STARTING_AGE + 1) as usize;
    let Some(last) = trace.last().copied() else {
        return;
    };
    let profile = career_type.profile();
    while trace.len() < expected {
        let age = STARTING_AGE + trace.len() as u32;
        trace.push(YearTracePoint {
            wealth: 0.0,
            income: last.income,
            human_capital: human_capital(age, last.income, profile),
        });
    }
}

fn derive_seed(base_seed: u64, scenario_id: u32) -> u64 {
    splitmix64(base_seed ^ ((scenario_id as u64) << 32) ^ scenario_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
