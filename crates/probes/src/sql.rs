//! database/sql probe.

use autotrace_core::model::event::{BaseSpanProperties, BASE_PROPERTIES_SIZE, captured_string};
use autotrace_core::model::span::SpanDescriptor;
use autotrace_core::semconv;

use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

pub const SPAN_NAME: &str = "DB";

/// Query observed in `(*sql.DB).queryDC` / `execDC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlEvent {
    pub base: BaseSpanProperties,
    pub query: [u8; 100],
}

impl Record for SqlEvent {
    const SIZE: usize = BASE_PROPERTIES_SIZE + 100;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        Self {
            base: r.base(),
            query: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.query);
    }
}

impl Convert for SqlEvent {
    fn probe(&self) -> ProbeId {
        probe::DATABASE_SQL
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let mut span = ctx.span(self.probe(), SPAN_NAME, &self.base);
        if ctx.include_db_statement {
            span.attributes
                .set_opt(semconv::DB_QUERY_TEXT, captured_string(&self.query));
        }
        vec![span]
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry::trace::SpanKind;

    use super::*;
    use crate::convert::fixtures::*;

    fn event(query: &str) -> SqlEvent {
        SqlEvent {
            base: base(true),
            query: field(query),
        }
    }

    #[test]
    fn statement_is_opt_in() {
        let e = event("SELECT * FROM contacts");

        let hidden = e.convert(&ctx()).remove(0);
        assert_eq!(hidden.name, "DB");
        assert_eq!(hidden.kind, SpanKind::Client);
        assert!(hidden.attributes.is_empty());

        let shown = e.convert(&ctx_with_statements()).remove(0);
        assert_eq!(
            shown.attributes.get(semconv::DB_QUERY_TEXT),
            Some(&Value::from("SELECT * FROM contacts"))
        );

        let mut without_text = shown.clone();
        without_text.attributes = hidden.attributes.clone();
        assert_eq!(without_text, hidden);
    }

    #[test]
    fn empty_query_is_not_attached() {
        let span = event("").convert(&ctx_with_statements()).remove(0);
        assert!(!span.attributes.contains(semconv::DB_QUERY_TEXT));
    }
}
