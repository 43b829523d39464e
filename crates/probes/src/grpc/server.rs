use autotrace_core::model::event::{BaseSpanProperties, BASE_PROPERTIES_SIZE, c_string};
use autotrace_core::model::span::{SpanDescriptor, status_for};
use autotrace_core::semconv;

use super::RPC_SYSTEM;
use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Call handled in `grpc.(*Server).handleStream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcServerEvent {
    pub base: BaseSpanProperties,
    pub method: [u8; 100],
    pub status_code: i32,
}

impl Record for GrpcServerEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 100 + 4;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            method: r.bytes(),
            status_code: r.i32(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.method);
        w.i32(self.status_code);
    }
}

impl Convert for GrpcServerEvent {
    fn probe(&self) -> ProbeId {
        probe::GRPC_SERVER
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let method = c_string(&self.method);
        let mut span = ctx.span(self.probe(), method.clone(), &self.base);

        span.attributes.set(semconv::RPC_SYSTEM, RPC_SYSTEM);
        span.attributes
            .set_opt(semconv::RPC_SERVICE, Some(method).filter(|m| !m.is_empty()));
        span.attributes
            .set(semconv::RPC_GRPC_STATUS_CODE, i64::from(self.status_code));

        span.status = status_for(self.status_code != 0, None);
        vec![span]
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry::trace::{SpanKind, Status};

    use super::*;
    use crate::convert::fixtures::*;

    fn event(status_code: i32) -> GrpcServerEvent {
        GrpcServerEvent {
            base: base(true),
            method: field("/helloworld.Greeter/SayHello"),
            status_code,
        }
    }

    #[test]
    fn server_span_is_child_of_caller() {
        let span = event(0).convert(&ctx()).remove(0);
        assert_eq!(span.kind, SpanKind::Server);
        assert_eq!(span.status, Status::Unset);
        assert!(span.parent.is_some());
        assert_eq!(span.attributes.get(semconv::RPC_SYSTEM), Some(&Value::from("grpc")));
    }

    #[test]
    fn missing_method_is_omitted() {
        let mut e = event(0);
        e.method = [0; 100];
        let span = e.convert(&ctx()).remove(0);
        assert!(!span.attributes.contains(semconv::RPC_SERVICE));
    }

    #[test]
    fn nonzero_status_is_error() {
        let span = event(2).convert(&ctx()).remove(0);
        assert!(matches!(span.status, Status::Error { .. }));
    }
}
