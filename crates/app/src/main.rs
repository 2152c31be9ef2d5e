use std::process;

use tracing::level_filters::LevelFilter;

mod logging;
mod session;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match session::parse_session_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("argument error: {err}");
            process::exit(2);
        }
    };
    logging::setup_tracing(parsed.log_level.unwrap_or(LevelFilter::INFO));

    tracing::info!("Amazi starting");

    if let Err(err) = session::run_session(&parsed) {
        eprintln!("session error: {err}");
        process::exit(1);
    }
}
