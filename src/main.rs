use std::fmt::Debug;
use std::fmt::Display;

use tokio::task::JoinError;
use waitlist::configuration::get_configuration;
use waitlist::rate_limit::init_sweep_worker;
use waitlist::startup::Application;
use waitlist::telemetry::get_subscriber;
use waitlist::telemetry::init_subscriber;

fn report_exit(
    name: &str,
    outcome: Result<Result<(), impl Debug + Display>, JoinError>,
) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{name} exited gracefully")
        }

        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (inner)"
            )
        }

        Err(e) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (outer)"
            )
        }
    }
}

/// Initialise telemetry, load config, and start the server (and the rate limit
/// sweeper)
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("waitlist", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;

    let app = Application::build(cfg.clone())?;
    let sweep_worker = init_sweep_worker(app.rate_limiter(), cfg.rate_limit.sweep_interval());

    let server_thread = tokio::spawn(app.run_until_stopped());
    let sweep_worker_thread = tokio::spawn(sweep_worker);

    // returns when the first branch completes, cancelling the other
    tokio::select! {
        o = server_thread => { report_exit("API", o) },
        o = sweep_worker_thread => { report_exit("Rate limit sweep worker", o) },
    }

    Ok(())
}
