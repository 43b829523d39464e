use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_string, captured_string,
};
use autotrace_core::model::span::{SpanDescriptor, status_for};
use autotrace_core::semconv;
use autotrace_decode::http::{host_port, parse_pattern, protocol_version};
use tracing::debug;

use crate::convert::{Convert, ConvertContext, status_code};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Request handled in `net/http.serverHandler.ServeHTTP`: the part of the
/// record shared by every layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRequest {
    pub base: BaseSpanProperties,
    pub status_code: u64,
    pub method: [u8; 8],
    pub path: [u8; 128],
    pub remote_addr: [u8; 256],
    pub host: [u8; 256],
    pub proto: [u8; 8],
}

impl Record for ServerRequest {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 8 + 8 + 128 + 256 + 256 + 8;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            status_code: r.u64(),
            method: r.bytes(),
            path: r.bytes(),
            remote_addr: r.bytes(),
            host: r.bytes(),
            proto: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.u64(self.status_code);
        w.bytes(&self.method);
        w.bytes(&self.path);
        w.bytes(&self.remote_addr);
        w.bytes(&self.host);
        w.bytes(&self.proto);
    }
}

/// Pattern layout: the shared request followed by the matched mux pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRequest {
    pub request: ServerRequest,
    pub pattern: [u8; 128],
}

impl Record for PatternRequest {
    const SIZE: usize = ServerRequest::SIZE + 128;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            request: ServerRequest::read_fields(r),
            pattern: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        self.request.write_fields(w);
        w.bytes(&self.pattern);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpServerEvent {
    Legacy(ServerRequest),
    Pattern(PatternRequest),
}

impl HttpServerEvent {
    pub fn request(&self) -> &ServerRequest {
        match self {
            Self::Legacy(request) => request,
            Self::Pattern(p) => &p.request,
        }
    }

    fn route(&self) -> Option<String> {
        let Self::Pattern(p) = self else {
            return None;
        };
        let pattern = captured_string(&p.pattern)?;
        match parse_pattern(&pattern) {
            Ok(route) => Some(route),
            Err(err) => {
                debug!(pattern = %pattern, error = %err, "ignoring unparsable mux pattern");
                None
            }
        }
    }
}

impl Convert for HttpServerEvent {
    fn probe(&self) -> ProbeId {
        probe::HTTP_SERVER
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let req = self.request();
        let method = c_string(&req.method);
        let route = self.route();

        let name = match &route {
            Some(route) => format!("{method} {route}"),
            None => method.clone(),
        };
        let mut span = ctx.span(self.probe(), name, &req.base);

        let attrs = &mut span.attributes;
        attrs.set_opt(semconv::HTTP_REQUEST_METHOD, Some(method).filter(|m| !m.is_empty()));
        attrs.set_opt(semconv::URL_PATH, captured_string(&req.path));
        attrs.set(semconv::HTTP_RESPONSE_STATUS_CODE, status_code(req.status_code));

        let peer = host_port(&c_string(&req.remote_addr));
        attrs.set_opt(semconv::NETWORK_PEER_ADDRESS, peer.host);
        attrs.set_opt(semconv::NETWORK_PEER_PORT, peer.port);

        let host = host_port(&c_string(&req.host));
        attrs.set_opt(semconv::SERVER_ADDRESS, host.host);
        attrs.set_opt(semconv::SERVER_PORT, host.port);

        attrs.set_opt(
            semconv::NETWORK_PROTOCOL_VERSION,
            protocol_version(&c_string(&req.proto)),
        );
        attrs.set_opt(semconv::HTTP_ROUTE, route);

        span.status = status_for(req.status_code >= 500, None);
        vec![span]
    }
}
