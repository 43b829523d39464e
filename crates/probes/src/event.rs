use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::{AutotraceError, Result};

use crate::convert::{Convert, ConvertContext};
use crate::grpc::{GrpcClientEvent, GrpcServerEvent};
use crate::http::{HttpClientEvent, HttpServerEvent, PatternRequest, ServerRequest};
use crate::kafka::{KafkaConsumerEvent, KafkaProducerEvent};
use crate::layout::Layout;
use crate::manual::ManualSpanEvent;
use crate::probe::{self, ProbeId};
use crate::record::Record;
use crate::redis::{GoRedisEvent, RueidisEvent};
use crate::router::{ChiEvent, Router, RouterEvent, RouterRequest};
use crate::sql::SqlEvent;

/// A decoded record from any probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedEvent {
    HttpClient(HttpClientEvent),
    HttpServer(HttpServerEvent),
    GrpcClient(GrpcClientEvent),
    GrpcServer(GrpcServerEvent),
    Sql(SqlEvent),
    GoRedis(GoRedisEvent),
    Rueidis(RueidisEvent),
    KafkaProducer(Box<KafkaProducerEvent>),
    KafkaConsumer(KafkaConsumerEvent),
    Router(RouterEvent),
    Chi(ChiEvent),
    ManualSpan(Box<ManualSpanEvent>),
}

impl CapturedEvent {
    /// Reads one raw record captured by `probe` with `layout`.
    pub fn decode(probe: ProbeId, layout: Layout, raw: &[u8]) -> Result<Self> {
        let event = match (probe, layout) {
            (probe::HTTP_CLIENT, Layout::Standard) => Self::HttpClient(HttpClientEvent::read(raw)?),
            (probe::HTTP_SERVER, Layout::HttpServerLegacy) => {
                Self::HttpServer(HttpServerEvent::Legacy(ServerRequest::read(raw)?))
            }
            (probe::HTTP_SERVER, Layout::HttpServerPattern) => {
                Self::HttpServer(HttpServerEvent::Pattern(PatternRequest::read(raw)?))
            }
            (probe::GRPC_CLIENT, Layout::Standard) => Self::GrpcClient(GrpcClientEvent::read(raw)?),
            (probe::GRPC_SERVER, Layout::Standard) => Self::GrpcServer(GrpcServerEvent::read(raw)?),
            (probe::DATABASE_SQL, Layout::Standard) => Self::Sql(SqlEvent::read(raw)?),
            (probe::GO_REDIS, Layout::Standard) => Self::GoRedis(GoRedisEvent::read(raw)?),
            (probe::RUEIDIS, Layout::Standard) => Self::Rueidis(RueidisEvent::read(raw)?),
            (probe::KAFKA_PRODUCER, Layout::Standard) => {
                Self::KafkaProducer(Box::new(KafkaProducerEvent::read(raw)?))
            }
            (probe::KAFKA_CONSUMER, Layout::Standard) => {
                Self::KafkaConsumer(KafkaConsumerEvent::read(raw)?)
            }
            (probe::GIN, Layout::Standard) => Self::Router(RouterEvent {
                router: Router::Gin,
                request: RouterRequest::read(raw)?,
            }),
            (probe::GORILLA_MUX, Layout::Standard) => Self::Router(RouterEvent {
                router: Router::GorillaMux,
                request: RouterRequest::read(raw)?,
            }),
            (probe::CHI, Layout::Standard) => Self::Chi(ChiEvent::read(raw)?),
            (probe::OTEL_GLOBAL, Layout::Standard) => {
                Self::ManualSpan(Box::new(ManualSpanEvent::read(raw)?))
            }
            (probe, layout) => {
                return Err(AutotraceError::Probe(format!(
                    "{probe} has no {layout:?} layout"
                )));
            }
        };
        Ok(event)
    }

    fn as_convert(&self) -> &dyn Convert {
        match self {
            Self::HttpClient(e) => e,
            Self::HttpServer(e) => e,
            Self::GrpcClient(e) => e,
            Self::GrpcServer(e) => e,
            Self::Sql(e) => e,
            Self::GoRedis(e) => e,
            Self::Rueidis(e) => e,
            Self::KafkaProducer(e) => e.as_ref(),
            Self::KafkaConsumer(e) => e,
            Self::Router(e) => e,
            Self::Chi(e) => e,
            Self::ManualSpan(e) => e.as_ref(),
        }
    }

    pub fn probe(&self) -> ProbeId {
        self.as_convert().probe()
    }

    pub fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        self.as_convert().convert(ctx)
    }
}
