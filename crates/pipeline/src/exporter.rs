use autotrace_core::config::Config;
use autotrace_core::{AutotraceError, Result};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, info};

/// Tracer provider for `cfg`: a service-name resource plus a batching OTLP
/// gRPC exporter when an endpoint is configured.
///
/// Must be called from within a tokio runtime when an endpoint is set.
pub fn build_provider(cfg: &Config) -> Result<SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(cfg.service_name.clone())
        .build();
    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    match &cfg.otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .with_timeout(cfg.export_timeout)
                .build()
                .map_err(|e| {
                    AutotraceError::Export(format!(
                        "failed building OTLP exporter for {endpoint}: {e}"
                    ))
                })?;
            builder = builder.with_batch_exporter(exporter);
            info!(endpoint = %endpoint, service = %cfg.service_name, "exporting spans over OTLP");
        }
        None => debug!("no OTLP endpoint configured; spans will not leave the process"),
    }

    Ok(builder.build())
}
