use std::fmt;

use opentelemetry::trace::SpanKind;

/// Role of the instrumented call site. Fixed per probe, never derived from
/// captured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Internal,
    Client,
    Server,
    Producer,
    Consumer,
}

impl ProbeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Client => "client",
            Self::Server => "server",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }

    pub fn span_kind(self) -> SpanKind {
        match self {
            Self::Internal => SpanKind::Internal,
            Self::Client => SpanKind::Client,
            Self::Server => SpanKind::Server,
            Self::Producer => SpanKind::Producer,
            Self::Consumer => SpanKind::Consumer,
        }
    }
}

/// One capture point: an instrumented package plus the side of the call it
/// observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId {
    pub package: &'static str,
    pub kind: ProbeKind,
}

impl ProbeId {
    pub const fn new(package: &'static str, kind: ProbeKind) -> Self {
        Self { package, kind }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.kind.as_str())
    }
}

pub const HTTP_CLIENT: ProbeId = ProbeId::new("net/http", ProbeKind::Client);
pub const HTTP_SERVER: ProbeId = ProbeId::new("net/http", ProbeKind::Server);
pub const GRPC_CLIENT: ProbeId = ProbeId::new("google.golang.org/grpc", ProbeKind::Client);
pub const GRPC_SERVER: ProbeId = ProbeId::new("google.golang.org/grpc", ProbeKind::Server);
pub const DATABASE_SQL: ProbeId = ProbeId::new("database/sql", ProbeKind::Client);
pub const GO_REDIS: ProbeId = ProbeId::new("github.com/redis/go-redis", ProbeKind::Client);
pub const RUEIDIS: ProbeId = ProbeId::new("github.com/redis/rueidis", ProbeKind::Client);
pub const KAFKA_PRODUCER: ProbeId =
    ProbeId::new("github.com/segmentio/kafka-go", ProbeKind::Producer);
pub const KAFKA_CONSUMER: ProbeId =
    ProbeId::new("github.com/segmentio/kafka-go", ProbeKind::Consumer);

pub const GIN: ProbeId = ProbeId::new("github.com/gin-gonic/gin", ProbeKind::Server);
pub const GORILLA_MUX: ProbeId = ProbeId::new("github.com/gorilla/mux", ProbeKind::Server);
pub const CHI: ProbeId = ProbeId::new("github.com/go-chi/chi/v5", ProbeKind::Server);
/// Spans the application starts itself through the global OpenTelemetry
/// tracer while no SDK is installed.
pub const OTEL_GLOBAL: ProbeId =
    ProbeId::new("go.opentelemetry.io/otel/internal/global", ProbeKind::Internal);

pub const ALL: [ProbeId; 13] = [
    HTTP_CLIENT,
    HTTP_SERVER,
    GRPC_CLIENT,
    GRPC_SERVER,
    DATABASE_SQL,
    GO_REDIS,
    RUEIDIS,
    KAFKA_PRODUCER,
    KAFKA_CONSUMER,
    GIN,
    GORILLA_MUX,
    CHI,
    OTEL_GLOBAL,
];
