//! Turns span descriptors into exported spans.
//!
//! Captured calls have already finished by the time they reach us, so every
//! span is started at its recorded start time and ended immediately at its
//! recorded end time, under the ids the capture side assigned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::model::tracer::TracerIdentity;
use autotrace_core::time::BootClock;
use autotrace_core::{AutotraceError, Result};
use opentelemetry::Context;
use opentelemetry::trace::{Span, SpanBuilder, TraceContextExt, Tracer};
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, info, warn};

use crate::tracer_cache::{SdkTracer, TracerCache};

pub struct SpanController {
    clock: BootClock,
    provider: SdkTracerProvider,
    tracers: TracerCache,
    shut_down: AtomicBool,
}

impl SpanController {
    /// Estimates the boot clock offset and wraps `provider`. Fails if the
    /// clocks cannot be read; there is no mode with wrong timestamps.
    pub fn new(provider: SdkTracerProvider) -> Result<Self> {
        let clock = BootClock::estimate()?;
        info!(offset_ns = clock.offset_ns(), "estimated boot clock offset");
        Ok(Self::with_clock(provider, clock))
    }

    pub fn with_clock(provider: SdkTracerProvider, clock: BootClock) -> Self {
        Self {
            clock,
            tracers: TracerCache::new(provider.clone()),
            provider,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn clock(&self) -> BootClock {
        self.clock
    }

    pub fn tracer(&self, identity: &TracerIdentity) -> Arc<SdkTracer> {
        self.tracers.get(identity)
    }

    pub fn tracer_count(&self) -> usize {
        self.tracers.len()
    }

    pub fn trace(&self, spans: Vec<SpanDescriptor>) {
        for span in spans {
            self.trace_one(span);
        }
    }

    pub fn trace_one(&self, span: SpanDescriptor) {
        if self.shut_down.load(Ordering::Acquire) {
            debug!(name = %span.name, "controller shut down; dropping span");
            return;
        }

        let Some(span_context) = span.span_context else {
            warn!(
                name = %span.name,
                scope = %span.scope.name,
                "dropping span without span context"
            );
            return;
        };

        let tracer = self.tracer(&span.scope);
        let builder = SpanBuilder::from_name(span.name)
            .with_kind(span.kind)
            .with_trace_id(span_context.trace_id())
            .with_span_id(span_context.span_id())
            .with_start_time(SystemTime::from(span.start))
            .with_attributes(span.attributes.into_vec());

        let parent = match span.parent {
            Some(parent) => Context::new().with_remote_span_context(parent),
            None => Context::new(),
        };

        let mut otel_span = tracer.build_with_context(builder, &parent);
        otel_span.set_status(span.status);
        otel_span.end_with_timestamp(SystemTime::from(span.end));
    }

    pub fn force_flush(&self) -> Result<()> {
        self.provider
            .force_flush()
            .map_err(|e| AutotraceError::Export(format!("flush failed: {e}")))
    }

    /// Flushes and shuts the provider down. Later calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.provider
            .shutdown()
            .map_err(|e| AutotraceError::Export(format!("tracer provider shutdown failed: {e}")))
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}
