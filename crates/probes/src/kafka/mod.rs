//! github.com/segmentio/kafka-go producer and consumer probes.

pub mod consumer;
pub mod producer;

pub use consumer::KafkaConsumerEvent;
pub use producer::{KafkaMessage, KafkaProducerEvent, MAX_BATCH_MESSAGES};

const MESSAGING_SYSTEM: &str = "kafka";
