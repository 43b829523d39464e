use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_string, captured_string,
};
use autotrace_core::model::span::{SpanDescriptor, status_for};
use autotrace_core::semconv;
use autotrace_decode::http::host_port;

use super::RPC_SYSTEM;
use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Unary call observed in `grpc.(*ClientConn).Invoke`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcClientEvent {
    pub base: BaseSpanProperties,
    pub method: [u8; 50],
    pub target: [u8; 50],
    pub status_code: i32,
    pub error_message: [u8; 128],
}

impl Record for GrpcClientEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 50 + 50 + 4 + 128;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            method: r.bytes(),
            target: r.bytes(),
            status_code: r.i32(),
            error_message: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.method);
        w.bytes(&self.target);
        w.i32(self.status_code);
        w.bytes(&self.error_message);
    }
}

impl Convert for GrpcClientEvent {
    fn probe(&self) -> ProbeId {
        probe::GRPC_CLIENT
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let method = c_string(&self.method);
        let mut span = ctx.span(self.probe(), method.clone(), &self.base);

        let attrs = &mut span.attributes;
        attrs.set(semconv::RPC_SYSTEM, RPC_SYSTEM);
        attrs.set_opt(semconv::RPC_SERVICE, Some(method).filter(|m| !m.is_empty()));

        let target = host_port(&c_string(&self.target));
        attrs.set_opt(semconv::SERVER_ADDRESS, target.host);
        attrs.set_opt(semconv::SERVER_PORT, target.port);
        attrs.set(semconv::RPC_GRPC_STATUS_CODE, i64::from(self.status_code));

        let message = captured_string(&self.error_message);
        span.status = status_for(self.status_code != 0, message.as_deref());
        vec![span]
    }
}
