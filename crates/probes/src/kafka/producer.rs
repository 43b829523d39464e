use autotrace_core::model::event::{
    BaseSpanProperties, CapturedSpanContext, SPAN_CONTEXT_SIZE, c_string, captured_string,
};
use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::semconv;

use super::MESSAGING_SYSTEM;
use crate::convert::{Convert, ConvertContext, span_name};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Messages captured per `(*Writer).WriteMessages` call.
pub const MAX_BATCH_MESSAGES: usize = 10;

const OPERATION: &str = "publish";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaMessage {
    pub span_id: [u8; 8],
    pub topic: [u8; 256],
    pub key: [u8; 256],
}

impl KafkaMessage {
    const SIZE: usize = 8 + 256 + 256;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            span_id: r.bytes(),
            topic: r.bytes(),
            key: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.bytes(&self.span_id);
        w.bytes(&self.topic);
        w.bytes(&self.key);
    }
}

impl Default for KafkaMessage {
    fn default() -> Self {
        Self {
            span_id: [0; 8],
            topic: [0; 256],
            key: [0; 256],
        }
    }
}

/// One batch write. Every message gets its own span; they share the batch's
/// trace id, timing and parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaProducerEvent {
    pub start_time: u64,
    pub end_time: u64,
    pub parent_span_context: CapturedSpanContext,
    pub trace_id: [u8; 16],
    pub messages: [KafkaMessage; MAX_BATCH_MESSAGES],
    /// Writer-level topic. When set it overrides the per-message topic.
    pub global_topic: [u8; 256],
    pub valid_messages: u64,
}

impl KafkaProducerEvent {
    fn batch_base(&self) -> BaseSpanProperties {
        BaseSpanProperties {
            start_time: self.start_time,
            end_time: self.end_time,
            span_context: CapturedSpanContext::default(),
            parent_span_context: self.parent_span_context,
        }
    }
}

impl Record for KafkaProducerEvent {
    const SIZE: usize =
        8 + 8 + SPAN_CONTEXT_SIZE + 16 + MAX_BATCH_MESSAGES * KafkaMessage::SIZE + 256 + 8;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            start_time: r.u64(),
            end_time: r.u64(),
            parent_span_context: r.span_context(),
            trace_id: r.bytes(),
            messages: std::array::from_fn(|_| KafkaMessage::read_fields(r)),
            global_topic: r.bytes(),
            valid_messages: r.u64(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.u64(self.start_time);
        w.u64(self.end_time);
        w.span_context(&self.parent_span_context);
        w.bytes(&self.trace_id);
        for message in &self.messages {
            message.write_fields(w);
        }
        w.bytes(&self.global_topic);
        w.u64(self.valid_messages);
    }
}

impl Convert for KafkaProducerEvent {
    fn probe(&self) -> ProbeId {
        probe::KAFKA_PRODUCER
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let base = self.batch_base();
        let global_topic = c_string(&self.global_topic);
        let count = usize::try_from(self.valid_messages)
            .unwrap_or(usize::MAX)
            .min(MAX_BATCH_MESSAGES);

        self.messages[..count]
            .iter()
            .map(|message| {
                let topic = if global_topic.is_empty() {
                    c_string(&message.topic)
                } else {
                    global_topic.clone()
                };
                let span_context = CapturedSpanContext::new(self.trace_id, message.span_id)
                    .to_span_context(false);

                let mut span = ctx.span_with_context(
                    self.probe(),
                    span_name(&topic, OPERATION),
                    &base,
                    span_context,
                );
                let attrs = &mut span.attributes;
                attrs.set_opt(semconv::MESSAGING_KAFKA_MESSAGE_KEY, captured_string(&message.key));
                attrs.set_opt(
                    semconv::MESSAGING_DESTINATION_NAME,
                    Some(topic).filter(|t| !t.is_empty()),
                );
                attrs.set(semconv::MESSAGING_SYSTEM, MESSAGING_SYSTEM);
                attrs.set(semconv::MESSAGING_OPERATION_TYPE, OPERATION);
                attrs.set(semconv::MESSAGING_BATCH_MESSAGE_COUNT, count as i64);
                span
            })
            .collect()
    }
}
