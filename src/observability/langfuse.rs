use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_langfuse::ExporterBuilder;
use opentelemetry_sdk::trace::span_processor_with_async_runtime::BatchSpanProcessor;
use opentelemetry_sdk::{resource::Resource, runtime, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::{Metadata, Subscriber};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, Registry};

use super::logging::console_filter;

const SERVICE: &str = "toolcall-demo";

#[derive(Debug, Clone, Default)]
pub struct LangfuseOptions {
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub host: Option<String>,
    /// Debug-level console output, as with `init_default_tracing(true)`.
    pub verbose: bool,
}

#[derive(Debug)]
pub struct LangfuseInitError(String);

impl std::fmt::Display for LangfuseInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Langfuse exporter could not be built: {}", self.0)
    }
}

impl std::error::Error for LangfuseInitError {}

/// Only this crate's spans are exported.
#[derive(Debug, Clone)]
struct CrateSpanFilter;

impl<S> Filter<S> for CrateSpanFilter
where
    S: Subscriber,
{
    fn enabled(&self, meta: &Metadata<'_>, _cx: &tracing_subscriber::layer::Context<'_, S>) -> bool {
        meta.target().starts_with("toolcall_demo")
    }
}

/// Installs console logging plus a Langfuse span exporter.
///
/// Call `shutdown()` on the returned provider before exit to flush spans.
pub fn init(config: LangfuseOptions) -> Result<SdkTracerProvider, LangfuseInitError> {
    let mut builder = ExporterBuilder::default();
    if let (Some(pk), Some(sk)) = (config.public_key.as_deref(), config.secret_key.as_deref()) {
        builder = builder.with_basic_auth(pk, sk);
    }
    if let Some(host) = config.host.as_deref() {
        builder = builder.with_host(host);
    }
    let exporter = builder.build().map_err(|e| LangfuseInitError(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, SERVICE),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(processor)
        .build();

    let tracer = provider.tracer(SERVICE);
    global::set_tracer_provider(provider.clone());

    let stderr_filter = console_filter(config.verbose);

    let fmt_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let otel_layer = tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(CrateSpanFilter);

    Registry::default().with(fmt_layer).with(otel_layer).init();

    Ok(provider)
}
