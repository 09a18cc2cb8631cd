use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let history_file = raw_args
            .get(3)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("lifewealth_history.json"));
        if let Err(e) = lifewealth::api::run_http_server(port, history_file).await {
            log::error!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    match lifewealth::api::run_cli(raw_args) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Usage: lifewealth serve [port] [history-file] | lifewealth [OPTIONS]");
            std::process::exit(1);
        }
    }
}
