use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_string, captured_string,
};
use autotrace_core::model::span::{SpanDescriptor, status_for};
use autotrace_core::semconv;
use autotrace_decode::http::{host_port, protocol_version};

use crate::convert::{Convert, ConvertContext, status_code};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Outgoing request observed in `net/http.(*Transport).roundTrip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientEvent {
    pub base: BaseSpanProperties,
    pub host: [u8; 256],
    pub proto: [u8; 8],
    pub status_code: u64,
    pub method: [u8; 10],
    pub path: [u8; 100],
}

impl Record for HttpClientEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 256 + 8 + 8 + 10 + 100;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            host: r.bytes(),
            proto: r.bytes(),
            status_code: r.u64(),
            method: r.bytes(),
            path: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.host);
        w.bytes(&self.proto);
        w.u64(self.status_code);
        w.bytes(&self.method);
        w.bytes(&self.path);
    }
}

impl Convert for HttpClientEvent {
    fn probe(&self) -> ProbeId {
        probe::HTTP_CLIENT
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let method = c_string(&self.method);
        let mut span = ctx.span(self.probe(), method.clone(), &self.base);

        let attrs = &mut span.attributes;
        attrs.set_opt(semconv::HTTP_REQUEST_METHOD, Some(method).filter(|m| !m.is_empty()));
        attrs.set_opt(semconv::URL_PATH, captured_string(&self.path));
        attrs.set(semconv::HTTP_RESPONSE_STATUS_CODE, status_code(self.status_code));

        let host = host_port(&c_string(&self.host));
        attrs.set_opt(semconv::SERVER_ADDRESS, host.host);
        attrs.set_opt(semconv::SERVER_PORT, host.port);
        attrs.set_opt(
            semconv::NETWORK_PROTOCOL_VERSION,
            protocol_version(&c_string(&self.proto)),
        );

        span.status = status_for(self.status_code >= 400, None);
        vec![span]
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry::trace::{SpanKind, Status};

    use super::*;
    use crate::convert::fixtures::*;

    fn event(status_code: u64) -> HttpClientEvent {
        HttpClientEvent {
            base: base(true),
            host: field("google.com"),
            proto: field("HTTP/1.1"),
            status_code,
            method: field("GET"),
            path: field("/home"),
        }
    }

    #[test]
    fn successful_request() {
        let spans = event(200).convert(&ctx());
        assert_eq!(spans.len(), 1);

        let span = &spans[0];
        assert_eq!(span.name, "GET");
        assert_eq!(span.kind, SpanKind::Client);
        assert_eq!(span.status, Status::Unset);

        let attrs = &span.attributes;
        assert_eq!(attrs.get(semconv::HTTP_REQUEST_METHOD), Some(&Value::from("GET")));
        assert_eq!(attrs.get(semconv::URL_PATH), Some(&Value::from("/home")));
        assert_eq!(attrs.get(semconv::HTTP_RESPONSE_STATUS_CODE), Some(&Value::I64(200)));
        assert_eq!(attrs.get(semconv::SERVER_ADDRESS), Some(&Value::from("google.com")));
        assert_eq!(attrs.get(semconv::NETWORK_PROTOCOL_VERSION), Some(&Value::from("1.1")));
        assert!(!attrs.contains(semconv::SERVER_PORT));
    }

    #[test]
    fn server_error_marks_span() {
        let ok = event(200).convert(&ctx()).remove(0);
        let failed = event(500).convert(&ctx()).remove(0);

        assert!(matches!(failed.status, Status::Error { .. }));
        assert_eq!(
            failed.attributes.get(semconv::HTTP_RESPONSE_STATUS_CODE),
            Some(&Value::I64(500))
        );

        let strip = |span: &SpanDescriptor| {
            span.attributes
                .iter()
                .filter(|kv| kv.key.as_str() != semconv::HTTP_RESPONSE_STATUS_CODE)
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&ok), strip(&failed));
    }

    #[test]
    fn client_errors_are_errors() {
        let span = event(404).convert(&ctx()).remove(0);
        assert!(matches!(span.status, Status::Error { .. }));
        let span = event(399).convert(&ctx()).remove(0);
        assert_eq!(span.status, Status::Unset);
    }

    #[test]
    fn host_with_port() {
        let mut e = event(200);
        e.host = field("localhost:8080");
        let span = e.convert(&ctx()).remove(0);
        assert_eq!(span.attributes.get(semconv::SERVER_ADDRESS), Some(&Value::from("localhost")));
        assert_eq!(span.attributes.get(semconv::SERVER_PORT), Some(&Value::I64(8080)));
    }

    #[test]
    fn empty_fields_are_omitted() {
        let mut e = event(200);
        e.host = [0; 256];
        e.proto = [0; 8];
        e.method = [0; 10];
        e.path = [0; 100];
        let span = e.convert(&ctx()).remove(0);
        assert!(!span.attributes.contains(semconv::SERVER_ADDRESS));
        assert!(!span.attributes.contains(semconv::NETWORK_PROTOCOL_VERSION));
        assert!(!span.attributes.contains(semconv::HTTP_REQUEST_METHOD));
        assert!(!span.attributes.contains(semconv::URL_PATH));
        assert!(span.attributes.contains(semconv::HTTP_RESPONSE_STATUS_CODE));
    }

    #[test]
    fn oversized_status_code_saturates() {
        let span = event(u64::MAX).convert(&ctx()).remove(0);
        assert_eq!(
            span.attributes.get(semconv::HTTP_RESPONSE_STATUS_CODE),
            Some(&Value::I64(i64::MAX))
        );
        assert!(matches!(span.status, Status::Error { .. }));
    }

    #[test]
    fn reads_raw_record() {
        let e = event(201);
        let raw = e.to_bytes();
        assert_eq!(raw.len(), HttpClientEvent::SIZE);
        assert_eq!(HttpClientEvent::read(&raw).unwrap(), e);
        assert!(HttpClientEvent::read(&raw[..HttpClientEvent::SIZE - 1]).is_err());
    }
}
