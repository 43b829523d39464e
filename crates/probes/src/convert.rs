use autotrace_core::config::Config;
use autotrace_core::model::event::BaseSpanProperties;
use autotrace_core::model::span::{Attributes, SpanDescriptor};
use autotrace_core::model::tracer::TracerIdentity;
use autotrace_core::semconv;
use autotrace_core::time::BootClock;
use opentelemetry::trace::{SpanContext, Status};

use crate::probe::ProbeId;

/// Everything a converter needs besides the record itself. Built once at
/// startup and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct ConvertContext {
    pub clock: BootClock,
    pub include_db_statement: bool,
    pub scope_prefix: String,
    pub instrumentation_version: String,
}

impl ConvertContext {
    pub fn new(clock: BootClock, cfg: &Config) -> Self {
        Self {
            clock,
            include_db_statement: cfg.include_db_statement,
            scope_prefix: cfg.scope_prefix.clone(),
            instrumentation_version: cfg.instrumentation_version.clone(),
        }
    }

    pub fn scope(&self, probe: ProbeId) -> TracerIdentity {
        TracerIdentity::for_package(
            &self.scope_prefix,
            probe.package,
            &self.instrumentation_version,
        )
        .with_schema_url(semconv::SCHEMA_URL)
    }

    /// Span for the call described by `base`, with no attributes and unset
    /// status.
    pub fn span(
        &self,
        probe: ProbeId,
        name: impl Into<String>,
        base: &BaseSpanProperties,
    ) -> SpanDescriptor {
        self.span_with_context(probe, name, base, base.span_context())
    }

    /// Like [`ConvertContext::span`] but with an explicit span context, for
    /// records that carry more than one span id.
    pub fn span_with_context(
        &self,
        probe: ProbeId,
        name: impl Into<String>,
        base: &BaseSpanProperties,
        span_context: Option<SpanContext>,
    ) -> SpanDescriptor {
        SpanDescriptor {
            name: name.into(),
            kind: probe.kind.span_kind(),
            start: self.clock.to_datetime(base.start_time),
            end: self.clock.to_datetime(base.end_time),
            span_context,
            parent: base.parent(),
            attributes: Attributes::new(),
            status: Status::Unset,
            scope: self.scope(probe),
        }
    }
}

/// Shared conversion interface of every captured record type.
pub trait Convert {
    fn probe(&self) -> ProbeId;

    /// Pure function of the record: never blocks, never fails. Payload that
    /// cannot be decoded degrades to a missing or placeholder attribute.
    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor>;
}

/// Protocol status codes are captured unsigned; anything past `i64::MAX` is
/// clamped rather than wrapped negative.
pub(crate) fn status_code(code: u64) -> i64 {
    i64::try_from(code).unwrap_or(i64::MAX)
}

/// `"<target> <operation>"`, or just the operation when no target was
/// captured.
pub(crate) fn span_name(target: &str, operation: &str) -> String {
    if target.is_empty() {
        return operation.to_string();
    }
    format!("{target} {operation}")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use autotrace_core::model::event::{BaseSpanProperties, CapturedSpanContext};

    use super::*;

    pub const OFFSET_NS: i64 = 1_700_000_000_000_000_000;

    pub fn ctx() -> ConvertContext {
        ConvertContext::new(BootClock::from_offset(OFFSET_NS), &Config::default())
    }

    pub fn ctx_with_statements() -> ConvertContext {
        ConvertContext {
            include_db_statement: true,
            ..ctx()
        }
    }

    pub fn base(with_parent: bool) -> BaseSpanProperties {
        BaseSpanProperties {
            start_time: 5_000,
            end_time: 9_000,
            span_context: CapturedSpanContext::new([0xaa; 16], [0x01; 8]),
            parent_span_context: if with_parent {
                CapturedSpanContext::new([0xaa; 16], [0x02; 8])
            } else {
                CapturedSpanContext::default()
            },
        }
    }

    pub fn field<const N: usize>(s: &str) -> [u8; N] {
        let mut out = [0u8; N];
        out[..s.len()].copy_from_slice(s.as_bytes());
        out
    }
}
