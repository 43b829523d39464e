use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_string, captured_string,
};
use autotrace_core::model::span::{SpanDescriptor, status_for};
use autotrace_core::semconv;
use autotrace_decode::net::ip_from_bytes;

use super::DB_SYSTEM;
use crate::convert::{Convert, ConvertContext, span_name};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetAddr {
    pub ip: [u8; 16],
    pub port: i32,
}

/// Command completed by a rueidis pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RueidisEvent {
    pub base: BaseSpanProperties,
    pub operation: [u8; 20],
    pub addr: NetAddr,
    pub error_message: [u8; 64],
}

impl Record for RueidisEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 20 + 16 + 4 + 64;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            operation: r.bytes(),
            addr: NetAddr {
                ip: r.bytes(),
                port: r.i32(),
            },
            error_message: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.operation);
        w.bytes(&self.addr.ip);
        w.i32(self.addr.port);
        w.bytes(&self.error_message);
    }
}

impl Convert for RueidisEvent {
    fn probe(&self) -> ProbeId {
        probe::RUEIDIS
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let operation = c_string(&self.operation);
        let mut span = ctx.span(self.probe(), span_name("cache", &operation), &self.base);

        let attrs = &mut span.attributes;
        attrs.set(semconv::DB_SYSTEM, DB_SYSTEM);
        if !operation.is_empty() {
            attrs.set(semconv::DB_OPERATION_NAME, operation);
        }
        attrs.set_opt(
            semconv::SERVER_ADDRESS,
            ip_from_bytes(self.addr.ip).map(|ip| ip.to_string()),
        );
        if self.addr.port > 0 {
            attrs.set(semconv::SERVER_PORT, i64::from(self.addr.port));
        }

        let message = captured_string(&self.error_message);
        span.status = status_for(message.is_some(), message.as_deref());
        vec![span]
    }
}
