//! Spans the application creates itself through the global OpenTelemetry
//! tracer. With no SDK installed those calls go to a no-op delegate; the
//! capture side records what was passed in and we replay it under the
//! tracer identity the application asked for.

use autotrace_core::model::event::{
    BASE_PROPERTIES_SIZE, BaseSpanProperties, c_bytes, c_string, captured_string,
};
use autotrace_core::model::span::{Attributes, SpanDescriptor};
use autotrace_core::model::tracer::TracerIdentity;
use opentelemetry::trace::Status;
use opentelemetry::{Key, Value};
use tracing::debug;

use crate::convert::{Convert, ConvertContext};
use crate::probe::{self, ProbeId};
use crate::record::{Record, RecordReader, RecordWriter};

pub const MAX_ATTRIBUTES: usize = 16;

const KEY_SIZE: usize = 32;
const VALUE_SIZE: usize = 128;

/// `attribute.Type` values as the Go API numbers them. Slice types are not
/// captured.
pub mod value_type {
    pub const BOOL: u8 = 1;
    pub const INT64: u8 = 2;
    pub const FLOAT64: u8 = 3;
    pub const STRING: u8 = 4;
}

/// `codes.Code` values.
mod status_code {
    pub const ERROR: u32 = 1;
    pub const OK: u32 = 2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    /// Bytes used in `value` for strings; zero means NUL-terminated.
    pub value_len: u16,
    pub value_type: u8,
    pub key: [u8; KEY_SIZE],
    pub value: [u8; VALUE_SIZE],
}

impl AttributeSlot {
    const SIZE: usize = 2 + 1 + 1 + KEY_SIZE + VALUE_SIZE;

    pub fn string(key: &str, value: &str) -> Self {
        let mut slot = Self::with_key(key, value_type::STRING);
        let len = value.len().min(VALUE_SIZE);
        slot.value[..len].copy_from_slice(&value.as_bytes()[..len]);
        slot.value_len = len as u16;
        slot
    }

    pub fn int64(key: &str, value: i64) -> Self {
        let mut slot = Self::with_key(key, value_type::INT64);
        slot.value[..8].copy_from_slice(&value.to_le_bytes());
        slot
    }

    pub fn float64(key: &str, value: f64) -> Self {
        let mut slot = Self::with_key(key, value_type::FLOAT64);
        slot.value[..8].copy_from_slice(&value.to_bits().to_le_bytes());
        slot
    }

    pub fn bool(key: &str, value: bool) -> Self {
        let mut slot = Self::with_key(key, value_type::BOOL);
        slot.value[0] = u8::from(value);
        slot
    }

    fn with_key(key: &str, value_type: u8) -> Self {
        let mut slot = Self {
            value_type,
            ..Self::default()
        };
        let len = key.len().min(KEY_SIZE);
        slot.key[..len].copy_from_slice(&key.as_bytes()[..len]);
        slot
    }

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        let value_len = r.u16();
        let value_type = r.u8();
        r.skip(1);
        Self {
            value_len,
            value_type,
            key: r.bytes(),
            value: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.u16(self.value_len);
        w.u8(self.value_type);
        w.zeroes(1);
        w.bytes(&self.key);
        w.bytes(&self.value);
    }

    fn word(&self) -> [u8; 8] {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.value[..8]);
        word
    }

    /// `None` for unnamed slots and types that are not captured.
    fn decode(&self) -> Option<(Key, Value)> {
        let key = captured_string(&self.key)?;
        let value = match self.value_type {
            value_type::BOOL => Value::Bool(self.value[0] != 0),
            value_type::INT64 => Value::I64(i64::from_le_bytes(self.word())),
            value_type::FLOAT64 => Value::F64(f64::from_bits(u64::from_le_bytes(self.word()))),
            value_type::STRING => {
                let len = usize::from(self.value_len);
                if len > 0 && len <= VALUE_SIZE {
                    Value::from(String::from_utf8_lossy(&self.value[..len]).into_owned())
                } else {
                    Value::from(String::from_utf8_lossy(c_bytes(&self.value)).into_owned())
                }
            }
            other => {
                debug!(key = %key, value_type = other, "skipping unsupported attribute type");
                return None;
            }
        };
        Some((Key::from(key), value))
    }
}

impl Default for AttributeSlot {
    fn default() -> Self {
        Self {
            value_len: 0,
            value_type: 0,
            key: [0; KEY_SIZE],
            value: [0; VALUE_SIZE],
        }
    }
}

/// One span started with `tracer.Start` and finished with `span.End`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSpanEvent {
    pub base: BaseSpanProperties,
    pub span_name: [u8; 64],
    pub attributes: [AttributeSlot; MAX_ATTRIBUTES],
    pub valid_attributes: u8,
    pub status_code: u32,
    pub status_description: [u8; 64],
    pub tracer_name: [u8; 128],
    pub tracer_version: [u8; 32],
    pub schema_url: [u8; 128],
}

impl ManualSpanEvent {
    /// Scope the application named, or the probe's own scope when the tracer
    /// name was not captured.
    fn scope(&self, ctx: &ConvertContext) -> TracerIdentity {
        match captured_string(&self.tracer_name) {
            Some(name) => TracerIdentity::new(name)
                .with_version(c_string(&self.tracer_version))
                .with_schema_url(c_string(&self.schema_url)),
            None => ctx.scope(self.probe()),
        }
    }

    fn status(&self) -> Status {
        match self.status_code {
            status_code::ERROR => Status::error(c_string(&self.status_description)),
            status_code::OK => Status::Ok,
            _ => Status::Unset,
        }
    }
}

impl Record for ManualSpanEvent {
    // The attribute count is followed by padding up to the next 8-byte
    // boundary.
    const SIZE: usize = BASE_PROPERTIES_SIZE
        + 64
        + MAX_ATTRIBUTES * AttributeSlot::SIZE
        + 8
        + 4
        + 64
        + 128
        + 32
        + 128;

    fn read_fields(r: &mut RecordReader<'_>) -> Self {
        let base = r.base();
        let span_name = r.bytes();
        let attributes = std::array::from_fn(|_| AttributeSlot::read_fields(r));
        let valid_attributes = r.u8();
        r.skip(7);
        Self {
            base,
            span_name,
            attributes,
            valid_attributes,
            status_code: r.u32(),
            status_description: r.bytes(),
            tracer_name: r.bytes(),
            tracer_version: r.bytes(),
            schema_url: r.bytes(),
        }
    }

    fn write_fields(&self, w: &mut RecordWriter) {
        w.base(&self.base);
        w.bytes(&self.span_name);
        for slot in &self.attributes {
            slot.write_fields(w);
        }
        w.u8(self.valid_attributes);
        w.zeroes(7);
        w.u32(self.status_code);
        w.bytes(&self.status_description);
        w.bytes(&self.tracer_name);
        w.bytes(&self.tracer_version);
        w.bytes(&self.schema_url);
    }
}

impl Convert for ManualSpanEvent {
    fn probe(&self) -> ProbeId {
        probe::OTEL_GLOBAL
    }

    fn convert(&self, ctx: &ConvertContext) -> Vec<SpanDescriptor> {
        let mut span = ctx.span(self.probe(), c_string(&self.span_name), &self.base);

        let count = usize::from(self.valid_attributes).min(MAX_ATTRIBUTES);
        span.attributes = self.attributes[..count]
            .iter()
            .filter_map(AttributeSlot::decode)
            .fold(Attributes::new(), |mut attrs, (key, value)| {
                attrs.set(key, value);
                attrs
            });
        span.status = self.status();
        span.scope = self.scope(ctx);
        vec![span]
    }
}
