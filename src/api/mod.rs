use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum, error::ErrorKind};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;

use crate::core::{
    AnalysisInputs, CareerComparison, CareerType, HistoryStore, JsonFileStore, PolicyAnalysis,
    RETIREMENT_AGE, RunHistory, RunPhase, STARTING_AGE, SimulationState, SimulationSummary,
    YearDecisions, compare_careers, human_capital, run_policy_analysis,
};

const DEFAULT_HISTORY_FILE: &str = "lifewealth_history.json";
const MAX_SIMULATIONS: u32 = 100_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCareer {
    Stable,
    Cyclical,
}

impl From<CliCareer> for CareerType {
    fn from(value: CliCareer) -> Self {
        match value {
            CliCareer::Stable => CareerType::Stable,
            CliCareer::Cyclical => CareerType::Cyclical,
        }
    }
}

impl From<CareerType> for CliCareer {
    fn from(value: CareerType) -> Self {
        match value {
            CareerType::Stable => CliCareer::Stable,
            CareerType::Cyclical => CliCareer::Cyclical,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Single,
    Analysis,
    Compare,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMode {
    #[serde(alias = "run")]
    Single,
    #[serde(alias = "policy")]
    Analysis,
    #[serde(alias = "comparison")]
    Compare,
}

impl From<ApiMode> for CliMode {
    fn from(value: ApiMode) -> Self {
        match value {
            ApiMode::Single => CliMode::Single,
            ApiMode::Analysis => CliMode::Analysis,
            ApiMode::Compare => CliMode::Compare,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    career: Option<CareerType>,
    savings_rate: Option<f64>,
    stock_allocation: Option<f64>,
    bond_allocation: Option<f64>,
    years: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,
    mode: Option<ApiMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HumanCapitalQuery {
    age: u32,
    income: f64,
    career: CareerType,
}

#[derive(Parser, Debug)]
#[command(
    name = "lifewealth",
    about = "Life-cycle investing simulator: 40 years of wages, markets, shocks and log utility"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliCareer::Stable)]
    career: CliCareer,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Share of income saved each year in percent (0-80)"
    )]
    savings_rate: f64,
    #[arg(long, default_value_t = 80.0, help = "Stock allocation in percent")]
    stock_allocation: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Bond allocation in percent; cash takes the remainder"
    )]
    bond_allocation: f64,
    #[arg(
        long,
        help = "Stop a single run after this many years instead of playing to the end"
    )]
    years: Option<u32>,
    #[arg(long, default_value_t = 1_000)]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = CliMode::Single)]
    mode: CliMode,
    #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
    history_file: PathBuf,
}

#[derive(Debug, Clone)]
struct RunInputs {
    career_type: CareerType,
    decisions: YearDecisions,
    years: Option<u32>,
    simulations: u32,
    seed: u64,
    mode: CliMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    seed: u64,
    decisions: YearDecisions,
    phase: RunPhase,
    human_capital: f64,
    total_balance_sheet: f64,
    summary: Option<SimulationSummary>,
    state: SimulationState,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnalysisResponse {
    Policy(PolicyAnalysis),
    Comparison(CareerComparison),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HumanCapitalResponse {
    age: u32,
    income: f64,
    career_type: CareerType,
    human_capital: f64,
}

#[derive(Debug, Serialize)]
struct HistoryResponse<'a> {
    entries: &'a [SimulationSummary],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    history: Arc<Mutex<RunHistory>>,
    store: Arc<dyn HistoryStore>,
}

fn build_inputs(cli: Cli) -> Result<RunInputs, String> {
    if !cli.savings_rate.is_finite() || !(0.0..=80.0).contains(&cli.savings_rate) {
        return Err("--savings-rate must be between 0 and 80".to_string());
    }

    if !cli.stock_allocation.is_finite() || !(0.0..=100.0).contains(&cli.stock_allocation) {
        return Err("--stock-allocation must be between 0 and 100".to_string());
    }

    if !cli.bond_allocation.is_finite()
        || cli.bond_allocation < 0.0
        || cli.bond_allocation > 100.0 - cli.stock_allocation
    {
        return Err(
            "--bond-allocation must be between 0 and 100 minus --stock-allocation".to_string(),
        );
    }

    let max_years = RETIREMENT_AGE - STARTING_AGE;
    if let Some(years) = cli.years {
        if years == 0 || years > max_years {
            return Err(format!("--years must be between 1 and {max_years}"));
        }
    }

    if cli.simulations == 0 || cli.simulations > MAX_SIMULATIONS {
        return Err(format!("--simulations must be between 1 and {MAX_SIMULATIONS}"));
    }

    Ok(RunInputs {
        career_type: cli.career.into(),
        decisions: YearDecisions {
            savings_rate: cli.savings_rate / 100.0,
            stock_allocation: cli.stock_allocation / 100.0,
            bond_allocation: cli.bond_allocation / 100.0,
        },
        years: cli.years,
        simulations: cli.simulations,
        seed: cli.seed,
        mode: cli.mode,
    })
}

fn default_cli() -> Cli {
    Cli {
        career: CliCareer::Stable,
        savings_rate: 20.0,
        stock_allocation: 80.0,
        bond_allocation: 10.0,
        years: None,
        simulations: 1_000,
        seed: 42,
        mode: CliMode::Single,
        history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
    }
}

fn run_inputs_from_payload(payload: SimulatePayload) -> Result<RunInputs, String> {
    let mut cli = default_cli();

    if let Some(v) = payload.career {
        cli.career = v.into();
    }
    if let Some(v) = payload.savings_rate {
        cli.savings_rate = v;
    }
    if let Some(v) = payload.stock_allocation {
        cli.stock_allocation = v;
    }
    if let Some(v) = payload.bond_allocation {
        cli.bond_allocation = v;
    }
    if payload.years.is_some() {
        cli.years = payload.years;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.mode {
        cli.mode = v.into();
    }

    build_inputs(cli)
}

#[cfg(test)]
fn run_inputs_from_json(json: &str) -> Result<RunInputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    run_inputs_from_payload(payload)
}

/// Plays one seeded career, stopping early if `years` is set.
fn run_single(inputs: &RunInputs) -> SimulationState {
    let mut rng = Pcg64::seed_from_u64(inputs.seed);
    let mut state = SimulationState::start(inputs.career_type);
    match inputs.years {
        Some(limit) => {
            for _ in 0..limit {
                if state.advance_year(&inputs.decisions, &mut rng).is_none() {
                    break;
                }
            }
        }
        None => {
            state.run_to_completion(&inputs.decisions, &mut rng);
        }
    }
    state
}

fn run_analysis(inputs: &RunInputs) -> AnalysisResponse {
    match inputs.mode {
        CliMode::Compare => AnalysisResponse::Comparison(compare_careers(
            inputs.decisions,
            inputs.simulations,
            inputs.seed,
        )),
        CliMode::Single | CliMode::Analysis => {
            AnalysisResponse::Policy(run_policy_analysis(&AnalysisInputs {
                career_type: inputs.career_type,
                decisions: inputs.decisions,
                simulations: inputs.simulations,
                seed: inputs.seed,
            }))
        }
    }
}

fn build_simulate_response(inputs: &RunInputs, state: SimulationState) -> SimulateResponse {
    SimulateResponse {
        seed: inputs.seed,
        decisions: inputs.decisions,
        phase: state.phase(),
        human_capital: state.human_capital(),
        total_balance_sheet: state.total_balance_sheet(),
        summary: state.summary(),
        state,
    }
}

/// Adds a finished career to the history. Unfinished runs are not recorded;
/// callers persist the history when this returns `true`.
fn record_completed_run(history: &mut RunHistory, summary: Option<&SimulationSummary>) -> bool {
    let Some(summary) = summary else {
        return false;
    };
    log::info!(
        "{:?} career finished at age {} (ruin: {}, score {:.1})",
        summary.career_type,
        summary.age_reached,
        summary.was_ruin,
        summary.score
    );
    history.record(summary.clone());
    true
}

/// One-shot command line run. Returns the JSON document to print.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Ok(e.to_string());
        }
        Err(e) => return Err(e.to_string()),
    };
    let store = JsonFileStore::new(cli.history_file.clone());
    let inputs = build_inputs(cli)?;

    let json = match inputs.mode {
        CliMode::Single => {
            let response = build_simulate_response(&inputs, run_single(&inputs));
            let mut history = RunHistory::load(&store);
            if record_completed_run(&mut history, response.summary.as_ref()) {
                history.persist(&store);
            }
            serde_json::to_string_pretty(&response)
        }
        CliMode::Analysis | CliMode::Compare => {
            serde_json::to_string_pretty(&run_analysis(&inputs))
        }
    };
    json.map_err(|e| format!("Failed to serialize result: {e}"))
}

pub async fn run_http_server(port: u16, history_file: PathBuf) -> std::io::Result<()> {
    let store: Arc<dyn HistoryStore> = Arc::new(JsonFileStore::new(history_file));
    let app_state = AppState {
        history: Arc::new(Mutex::new(RunHistory::load(store.as_ref()))),
        store,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/analysis",
            get(analysis_get_handler).post(analysis_post_handler),
        )
        .route("/api/human-capital", get(human_capital_handler))
        .route("/api/history", get(history_handler))
        .fallback(not_found_handler)
        .with_state(app_state);

    let listener = TcpListener::bind(addr).await?;
    log::info!("LifeWealth HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(app): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(app, payload).await
}

async fn simulate_post_handler(
    State(app): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(app, payload).await
}

async fn simulate_handler_impl(app: AppState, payload: SimulatePayload) -> Response {
    let inputs = match run_inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let response = build_simulate_response(&inputs, run_single(&inputs));
    let snapshot = {
        let mut history = app.history.lock().unwrap_or_else(PoisonError::into_inner);
        record_completed_run(&mut history, response.summary.as_ref()).then(|| history.clone())
    };
    if let Some(snapshot) = snapshot {
        let store = Arc::clone(&app.store);
        let write = tokio::task::spawn_blocking(move || snapshot.persist(store.as_ref()));
        if let Err(e) = write.await {
            log::warn!("Career history writer task failed: {e}");
        }
    }
    json_response(StatusCode::OK, response)
}

async fn analysis_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    analysis_handler_impl(payload).await
}

async fn analysis_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    analysis_handler_impl(payload).await
}

async fn analysis_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match run_inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    json_response(StatusCode::OK, run_analysis(&inputs))
}

async fn human_capital_handler(Query(query): Query<HumanCapitalQuery>) -> Response {
    if !query.income.is_finite() || query.income < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "income must be >= 0");
    }
    json_response(
        StatusCode::OK,
        HumanCapitalResponse {
            age: query.age,
            income: query.income,
            career_type: query.career,
            human_capital: human_capital(query.age, query.income, query.career.profile()),
        },
    )
}

async fn history_handler(State(app): State<AppState>) -> Response {
    let history = app.history.lock().unwrap_or_else(PoisonError::into_inner);
    json_response(
        StatusCode::OK,
        HistoryResponse {
            entries: history.entries(),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
