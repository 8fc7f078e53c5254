/*!
 * Tracing setup, with optional export of spans to Jaeger
 */

use opentelemetry::{sdk::Resource, KeyValue};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::TracingConfig;

const DEFAULT_FILTER: &str = "info";

/// Flushes exported spans when dropped.
pub struct TelemetryGuard {
    jaeger: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.jaeger {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

pub fn install(config: Option<&TracingConfig>) -> Result<TelemetryGuard, Box<dyn std::error::Error>> {
    let default_filter = config.and_then(|c| c.filter.as_deref()).unwrap_or(DEFAULT_FILTER);

    let tracer = match config.and_then(|c| c.jaeger.as_deref()) {
        Some(endpoint) => Some(
            opentelemetry_jaeger::new_agent_pipeline()
                .with_endpoint(endpoint)
                .with_service_name("steam-compete")
                .with_trace_config(opentelemetry::sdk::trace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])))
                .install_simple()?,
        ),
        None => None,
    };
    let jaeger = tracer.is_some();

    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)));
    tracing::subscriber::set_global_default(subscriber)?;

    if jaeger {
        tracing::info!("Installed jaeger tracing");
    }
    Ok(TelemetryGuard { jaeger })
}
