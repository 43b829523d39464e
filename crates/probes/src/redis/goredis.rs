use autotrace_core::model::event::{BaseSpanProperties, BASE_PROPERTIES_SIZE};
use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::semconv;
use autotrace_decode::resp::parse_resp;
use tracing::debug;

use super::DB_SYSTEM;
use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

pub const SPAN_NAME: &str = "DB";

/// Attached in place of the statement when the captured bytes do not decode.
pub const UNSUPPORTED_STATEMENT: &str = "[DB STATEMENT NOT SUPPORTED]";

/// Bytes written by a go-redis connection, captured at the socket write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoRedisEvent {
    pub base: BaseSpanProperties,
    pub resp_msg: [u8; 256],
    /// Total bulk strings across the pipeline. Zero outside pipelining mode.
    pub segments: i32,
}

impl GoRedisEvent {
    fn statement(&self) -> String {
        match parse_resp(self.segments, &self.resp_msg) {
            Ok(commands) => commands.join(", "),
            Err(err) => {
                debug!(segments = self.segments, error = %err, "undecodable redis payload");
                UNSUPPORTED_STATEMENT.to_string()
            }
        }
    }
}

impl Record for GoRedisEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 256 + 4;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            resp_msg: r.bytes(),
            segments: r.i32(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.resp_msg);
        w.i32(self.segments);
    }
}

impl Convert for GoRedisEvent {
    fn probe(&self) -> ProbeId {
        probe::GO_REDIS
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let mut span = ctx.span(self.probe(), SPAN_NAME, &self.base);
        span.attributes.set(semconv::DB_SYSTEM, DB_SYSTEM);

        if ctx.include_db_statement {
            let statement = self.statement();
            if !statement.is_empty() {
                span.attributes.set(semconv::DB_QUERY_TEXT, statement);
            }
        }
        vec![span]
    }
}
