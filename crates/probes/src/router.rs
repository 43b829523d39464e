//! Third-party HTTP routers. These sit above `net/http` and capture the
//! request as the router sees it, which for chi includes the matched route.

use autotrace_core::model::event::{BASE_PROPERTIES_SIZE, BaseSpanProperties, captured_string};
use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::semconv;

use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

/// Request captured at `(*Engine).ServeHTTP` (gin) or `(*Router).ServeHTTP`
/// (gorilla/mux).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterRequest {
    pub base: BaseSpanProperties,
    pub method: [u8; 7],
    pub path: [u8; 100],
}

impl Record for RouterRequest {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 7 + 100;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            method: r.bytes(),
            path: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.method);
        w.bytes(&self.path);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Router {
    Gin,
    GorillaMux,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterEvent {
    pub router: Router,
    pub request: RouterRequest,
}

impl Convert for RouterEvent {
    fn probe(&self) -> ProbeId {
        match self.router {
            Router::Gin => probe::GIN,
            Router::GorillaMux => probe::GORILLA_MUX,
        }
    }

    /// Named by method only: neither router hands us a route template at this
    /// point and raw paths are unbounded in cardinality.
    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let req = &self.request;
        let method = captured_string(&req.method);
        let name = method.clone().unwrap_or_else(|| "HTTP".to_string());
        let mut span = ctx.span(self.probe(), name, &req.base);

        span.attributes.set_opt(semconv::HTTP_REQUEST_METHOD, method);
        span.attributes.set_opt(semconv::URL_PATH, captured_string(&req.path));
        vec![span]
    }
}

/// Request captured in chi's `(*Mux).routeHTTP`, after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChiEvent {
    pub base: BaseSpanProperties,
    pub method: [u8; 8],
    pub path: [u8; 128],
    pub path_pattern: [u8; 128],
}

impl Record for ChiEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 8 + 128 + 128;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            method: r.bytes(),
            path: r.bytes(),
            path_pattern: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.method);
        w.bytes(&self.path);
        w.bytes(&self.path_pattern);
    }
}

impl Convert for ChiEvent {
    fn probe(&self) -> ProbeId {
        probe::CHI
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let method = captured_string(&self.method);
        let route = captured_string(&self.path_pattern);

        let name = match (&method, &route) {
            (Some(method), Some(route)) => format!("{method} {route}"),
            (Some(method), None) => method.clone(),
            (None, Some(route)) => route.clone(),
            (None, None) => "HTTP".to_string(),
        };
        let mut span = ctx.span(self.probe(), name, &self.base);

        let attrs = &mut span.attributes;
        attrs.set_opt(semconv::HTTP_REQUEST_METHOD, method);
        attrs.set_opt(semconv::URL_PATH, captured_string(&self.path));
        attrs.set_opt(semconv::HTTP_ROUTE, route);
        vec![span]
    }
}
