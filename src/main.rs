use std::{process, time::Duration};

use kami::{
    application::{error::AppError, pages::bootstrap},
    config,
    i18n::MessageCatalog,
    infra::{
        api::ApiClient,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Probe(_) => run_probe(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let api = ApiClient::new(&settings.api)?;
    let messages =
        MessageCatalog::load(&settings.i18n.messages_dir, &settings.i18n.locales).await?;
    let state = HttpState::new(api.clone(), &settings.i18n, messages);
    let app = http::build_app(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "kami::server",
        addr = %settings.server.addr,
        api = %settings.api.base_url,
        instance_id = %api.instance_id(),
        default_locale = %settings.i18n.locales.default_locale(),
        "kami listening"
    );

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = shutdown_deadline(settings.server.graceful_shutdown) => {
            warn!(
                target = "kami::server",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "kami::server", "kami stopped");
    Ok(())
}

/// Fetch the bootstrap aggregate once; failure is the no-data condition.
async fn run_probe(settings: config::Settings) -> Result<(), AppError> {
    let api = ApiClient::new(&settings.api)?;
    let initial = bootstrap(&api).await?;

    info!(
        target = "kami::probe",
        api = %settings.api.base_url,
        categories = initial.aggregate.categories.len(),
        "content api reachable"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "kami::server", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "kami::server", "shutdown requested");
}

/// Resolves `grace` after the shutdown signal.
async fn shutdown_deadline(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
