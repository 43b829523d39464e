use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_string, captured_string,
};
use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::semconv;

use super::MESSAGING_SYSTEM;
use crate::convert::{Convert, ConvertContext, span_name};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

const OPERATION: &str = "receive";

/// Message returned from `(*Reader).FetchMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConsumerEvent {
    pub base: BaseSpanProperties,
    pub topic: [u8; 256],
    pub key: [u8; 256],
    pub consumer_group: [u8; 128],
    pub offset: i64,
    pub partition: i64,
}

impl Record for KafkaConsumerEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 256 + 256 + 128 + 8 + 8;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            topic: r.bytes(),
            key: r.bytes(),
            consumer_group: r.bytes(),
            offset: r.i64(),
            partition: r.i64(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.topic);
        w.bytes(&self.key);
        w.bytes(&self.consumer_group);
        w.i64(self.offset);
        w.i64(self.partition);
    }
}

impl Convert for KafkaConsumerEvent {
    fn probe(&self) -> ProbeId {
        probe::KAFKA_CONSUMER
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let topic = c_string(&self.topic);
        let mut span = ctx.span(self.probe(), span_name(&topic, OPERATION), &self.base);

        let attrs = &mut span.attributes;
        attrs.set(semconv::MESSAGING_SYSTEM, MESSAGING_SYSTEM);
        attrs.set(semconv::MESSAGING_OPERATION_TYPE, OPERATION);
        attrs.set(
            semconv::MESSAGING_DESTINATION_PARTITION_ID,
            self.partition.to_string(),
        );
        if !topic.is_empty() {
            attrs.set(semconv::MESSAGING_DESTINATION_NAME, topic);
        }
        attrs.set(semconv::MESSAGING_KAFKA_OFFSET, self.offset);
        attrs.set_opt(semconv::MESSAGING_KAFKA_MESSAGE_KEY, captured_string(&self.key));
        attrs.set_opt(
            semconv::MESSAGING_CONSUMER_GROUP_NAME,
            captured_string(&self.consumer_group),
        );
        vec![span]
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry::trace::{SpanKind, Status};

    use super::*;
    use crate::convert::fixtures::*;

    fn event() -> KafkaConsumerEvent {
        KafkaConsumerEvent {
            base: base(true),
            topic: field("orders"),
            key: field("order-17"),
            consumer_group: field("billing"),
            offset: 4_200,
            partition: 3,
        }
    }

    #[test]
    fn receive_span() {
        let span = event().convert(&ctx()).remove(0);
        assert_eq!(span.name, "orders receive");
        assert_eq!(span.kind, SpanKind::Consumer);
        assert_eq!(span.status, Status::Unset);

        let attrs = &span.attributes;
        assert_eq!(attrs.get(semconv::MESSAGING_SYSTEM), Some(&Value::from("kafka")));
        assert_eq!(attrs.get(semconv::MESSAGING_OPERATION_TYPE), Some(&Value::from("receive")));
        assert_eq!(attrs.get(semconv::MESSAGING_DESTINATION_PARTITION_ID), Some(&Value::from("3")));
        assert_eq!(attrs.get(semconv::MESSAGING_DESTINATION_NAME), Some(&Value::from("orders")));
        assert_eq!(attrs.get(semconv::MESSAGING_KAFKA_OFFSET), Some(&Value::I64(4_200)));
        assert_eq!(attrs.get(semconv::MESSAGING_KAFKA_MESSAGE_KEY), Some(&Value::from("order-17")));
        assert_eq!(
            attrs.get(semconv::MESSAGING_CONSUMER_GROUP_NAME),
            Some(&Value::from("billing"))
        );
    }

    #[test]
    fn missing_key_and_group_are_omitted() {
        let mut e = event();
        e.key = [0; 256];
        e.consumer_group = [0; 128];
        let span = e.convert(&ctx()).remove(0);
        assert!(!span.attributes.contains(semconv::MESSAGING_KAFKA_MESSAGE_KEY));
        assert!(!span.attributes.contains(semconv::MESSAGING_CONSUMER_GROUP_NAME));
    }

    #[test]
    fn reads_raw_record() {
        let e = event();
        assert_eq!(KafkaConsumerEvent::read(&e.to_bytes()).unwrap(), e);
    }
}
