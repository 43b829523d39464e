use autotrace_core::model::event::{BaseSpanProperties, CapturedSpanContext};
use autotrace_core::time::BootClock;
use autotrace_probes::http::HttpClientEvent;
use autotrace_probes::kafka::{KafkaMessage, KafkaProducerEvent, MAX_BATCH_MESSAGES};
use autotrace_probes::manual::{AttributeSlot, MAX_ATTRIBUTES, ManualSpanEvent};
use autotrace_probes::redis::GoRedisEvent;
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt};
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanData, SpanExporter};

pub use opentelemetry_sdk::trace::InMemorySpanExporter;

pub const TRACE_ID: [u8; 16] = [0x4b; 16];
pub const BOOT_OFFSET_NS: i64 = 1_767_225_600_000_000_000;

/// Provider that exports synchronously into memory.
pub fn in_memory_provider() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

/// Keeps every exported span for the life of the handle, including after the
/// provider shuts down, and can be told to fail its own shutdown.
#[derive(Debug, Clone, Default)]
pub struct RecordingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    fail_shutdown: bool,
}

impl RecordingExporter {
    pub fn failing_shutdown() -> Self {
        Self {
            fail_shutdown: true,
            ..Self::default()
        }
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpanExporter for RecordingExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, OTelSdkResult> {
        let result = self
            .spans
            .lock()
            .map(|mut spans| spans.extend(batch))
            .map_err(|e| OTelSdkError::InternalFailure(e.to_string()));
        future::ready(result).boxed()
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        if self.fail_shutdown {
            return Err(OTelSdkError::InternalFailure("collector unreachable".into()));
        }
        Ok(())
    }
}

/// Provider whose spans stay readable after shutdown.
pub fn recording_provider() -> (SdkTracerProvider, RecordingExporter) {
    provider_with(RecordingExporter::default())
}

/// Like [`recording_provider`] but shutdown reports an export failure.
pub fn failing_provider() -> (SdkTracerProvider, RecordingExporter) {
    provider_with(RecordingExporter::failing_shutdown())
}

fn provider_with(exporter: RecordingExporter) -> (SdkTracerProvider, RecordingExporter) {
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

pub fn fixed_clock() -> BootClock {
    BootClock::from_offset(BOOT_OFFSET_NS)
}

pub fn field<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = s.len().min(N);
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    out
}

/// Boot-relative timing and ids for a call that took 1.8ms, optionally
/// below a remote parent.
pub fn base(span: u8, parent: Option<u8>) -> BaseSpanProperties {
    BaseSpanProperties {
        start_time: 3_600_000_000_000,
        end_time: 3_600_001_800_000,
        span_context: CapturedSpanContext::new(TRACE_ID, [span; 8]),
        parent_span_context: parent
            .map(|p| CapturedSpanContext::new(TRACE_ID, [p; 8]))
            .unwrap_or_default(),
    }
}

/// `GET google.com/home` answered with `status_code`.
pub fn http_client_event(span: u8, status_code: u64) -> HttpClientEvent {
    HttpClientEvent {
        base: base(span, None),
        host: field("google.com"),
        proto: field("HTTP/1.1"),
        status_code,
        method: field("GET"),
        path: field("/home"),
    }
}

pub fn go_redis_event(span: u8, resp: &str, segments: i32) -> GoRedisEvent {
    GoRedisEvent {
        base: base(span, Some(0x01)),
        resp_msg: field(resp),
        segments,
    }
}

/// Batch write of one message per key to `topic`, message span ids counting
/// up from 0x10.
pub fn kafka_batch(topic: &str, keys: &[&str]) -> KafkaProducerEvent {
    let mut messages: [KafkaMessage; MAX_BATCH_MESSAGES] = Default::default();
    for (i, (slot, key)) in messages.iter_mut().zip(keys).enumerate() {
        slot.span_id = [0x10 + i as u8; 8];
        slot.key = field(key);
    }
    let props = base(0, Some(0x01));
    KafkaProducerEvent {
        start_time: props.start_time,
        end_time: props.end_time,
        parent_span_context: props.parent_span_context,
        trace_id: TRACE_ID,
        messages,
        global_topic: field(topic),
        valid_messages: keys.len().min(MAX_BATCH_MESSAGES) as u64,
    }
}

/// Span `name` started by the application on the tracer called `tracer`.
pub fn manual_span_event(span: u8, tracer: &str, name: &str) -> ManualSpanEvent {
    let mut attributes: [AttributeSlot; MAX_ATTRIBUTES] = Default::default();
    attributes[0] = AttributeSlot::string("job.queue", "emails");
    ManualSpanEvent {
        base: base(span, Some(0x01)),
        span_name: field(name),
        attributes,
        valid_attributes: 1,
        status_code: 0,
        status_description: [0; 64],
        tracer_name: field(tracer),
        tracer_version: field("v1.4.0"),
        schema_url: [0; 128],
    }
}
