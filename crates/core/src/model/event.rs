use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

use crate::ids::is_zero;

/// Size of a span context as laid out in a captured record: trace id, span
/// id, one flag byte and seven bytes of padding.
pub const SPAN_CONTEXT_SIZE: usize = 32;

/// Size of the common prefix every captured record starts with.
pub const BASE_PROPERTIES_SIZE: usize = 16 + 2 * SPAN_CONTEXT_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapturedSpanContext {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub trace_flags: u8,
}

impl CapturedSpanContext {
    pub fn new(trace_id: [u8; 16], span_id: [u8; 8]) -> Self {
        Self {
            trace_id,
            span_id,
            trace_flags: TraceFlags::SAMPLED.to_u8(),
        }
    }

    /// All-zero ids are the "not set" sentinel.
    pub fn is_valid(&self) -> bool {
        !is_zero(&self.trace_id) && !is_zero(&self.span_id)
    }

    pub fn to_span_context(&self, remote: bool) -> Option<SpanContext> {
        if !self.is_valid() {
            return None;
        }
        Some(SpanContext::new(
            TraceId::from_bytes(self.trace_id),
            SpanId::from_bytes(self.span_id),
            TraceFlags::SAMPLED,
            remote,
            TraceState::default(),
        ))
    }
}

/// Fields shared by every captured record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseSpanProperties {
    pub start_time: u64,
    pub end_time: u64,
    pub span_context: CapturedSpanContext,
    pub parent_span_context: CapturedSpanContext,
}

impl BaseSpanProperties {
    pub fn span_context(&self) -> Option<SpanContext> {
        self.span_context.to_span_context(false)
    }

    pub fn parent(&self) -> Option<SpanContext> {
        self.parent_span_context.to_span_context(true)
    }
}

/// Bytes of a null-padded fixed-size field up to the first NUL.
pub fn c_bytes(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

pub fn c_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(c_bytes(buf)).into_owned()
}

/// Like [`c_string`] but an empty field reads as "not captured".
pub fn captured_string(buf: &[u8]) -> Option<String> {
    let bytes = c_bytes(buf);
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}
