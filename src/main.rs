use lead_crm::{app::App, config, telemetry, workers::expiration::Worker};
use std::fmt::{Debug, Display};
use tokio::task::JoinError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // telemetry
    let subscriber = telemetry::get_subscriber("lead_crm", "info", std::io::stdout);
    telemetry::init_subscriber(subscriber);

    // config
    let config = config::get().map_err(|e| anyhow::anyhow!("Failed to read configuration: {e}"))?;

    let app = App::build(&config).await?;
    tracing::info!(addr = %app.addr(), "Listening");
    let app = tokio::spawn(app.run_until_stopped());
    let worker = tokio::spawn(Worker::builder(&config).finish());

    tokio::select! {
        outcome = app => report_exit("API", outcome),
        outcome = worker => report_exit("Expiration worker", outcome),
    };

    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} task failed to complete",
                task_name
            )
        }
    }
}
