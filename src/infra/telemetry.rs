use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "kami_collection_hit_total",
            Unit::Count,
            "Lookups answered from a cached entity snapshot."
        );
        describe_counter!(
            "kami_collection_miss_total",
            Unit::Count,
            "Lookups that started a new content API request."
        );
        describe_counter!(
            "kami_collection_shared_total",
            Unit::Count,
            "Lookups that joined a request already in flight."
        );
        describe_counter!(
            "kami_collection_fetch_failed_total",
            Unit::Count,
            "Collection fetches that ended in an error."
        );
        describe_counter!(
            "kami_api_request_failed_total",
            Unit::Count,
            "Content API requests that failed, labelled by upstream status."
        );
        describe_histogram!(
            "kami_api_request_ms",
            Unit::Milliseconds,
            "Content API round-trip latency in milliseconds."
        );
        describe_counter!(
            "kami_locale_redirect_total",
            Unit::Count,
            "Requests redirected to their canonical locale path."
        );
    });
}
