//! Readers for the fixed-layout little-endian records handed over by the
//! capture side.

use autotrace_core::model::event::{BaseSpanProperties, CapturedSpanContext, BASE_PROPERTIES_SIZE};
use autotrace_core::{AutotraceError, Result};
use bytes::Buf;

/// A captured event with a fixed binary layout.
pub trait Record: Sized {
    /// Bytes consumed by one record.
    const SIZE: usize;

    fn read_fields(reader: &mut RecordReader<'_>) -> Self;

    fn write_fields(&self, writer: &mut RecordWriter);

    fn read(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(AutotraceError::Record(format!(
                "{} record is {} bytes, expected {}",
                std::any::type_name::<Self>(),
                raw.len(),
                Self::SIZE
            )));
        }

        let mut reader = RecordReader::new(&raw[..Self::SIZE]);
        let record = Self::read_fields(&mut reader);
        if reader.overrun {
            return Err(AutotraceError::Record(format!(
                "{} layout reads past {} bytes",
                std::any::type_name::<Self>(),
                Self::SIZE
            )));
        }
        Ok(record)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = RecordWriter::with_capacity(Self::SIZE);
        self.write_fields(&mut writer);
        writer.finish()
    }
}

/// Sequential field reader. Reads past the end yield zeroes and mark the
/// reader as overrun instead of panicking.
pub struct RecordReader<'a> {
    buf: &'a [u8],
    overrun: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            overrun: false,
        }
    }

    fn has(&mut self, n: usize) -> bool {
        if self.buf.remaining() < n {
            self.overrun = true;
            return false;
        }
        true
    }

    pub fn u8(&mut self) -> u8 {
        if !self.has(1) {
            return 0;
        }
        self.buf.get_u8()
    }

    pub fn u16(&mut self) -> u16 {
        if !self.has(2) {
            return 0;
        }
        self.buf.get_u16_le()
    }

    pub fn u32(&mut self) -> u32 {
        if !self.has(4) {
            return 0;
        }
        self.buf.get_u32_le()
    }

    pub fn u64(&mut self) -> u64 {
        if !self.has(8) {
            return 0;
        }
        self.buf.get_u64_le()
    }

    pub fn i64(&mut self) -> i64 {
        if !self.has(8) {
            return 0;
        }
        self.buf.get_i64_le()
    }

    pub fn i32(&mut self) -> i32 {
        if !self.has(4) {
            return 0;
        }
        self.buf.get_i32_le()
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if self.has(N) {
            self.buf.copy_to_slice(&mut out);
        }
        out
    }

    pub fn skip(&mut self, n: usize) {
        if self.has(n) {
            self.buf.advance(n);
        }
    }

    pub fn span_context(&mut self) -> CapturedSpanContext {
        let trace_id = self.bytes::<16>();
        let span_id = self.bytes::<8>();
        let trace_flags = self.u8();
        self.skip(7);
        CapturedSpanContext {
            trace_id,
            span_id,
            trace_flags,
        }
    }

    pub fn base(&mut self) -> BaseSpanProperties {
        BaseSpanProperties {
            start_time: self.u64(),
            end_time: self.u64(),
            span_context: self.span_context(),
            parent_span_context: self.span_context(),
        }
    }
}

impl Record for BaseSpanProperties {
    const SIZE: usize = BASE_PROPERTIES_SIZE;

    fn read_fields(reader: &mut RecordReader<'_>) -> Self {
        reader.base()
    }

    fn write_fields(&self, writer: &mut RecordWriter) {
        writer.base(self);
    }
}

/// Mirror of [`RecordReader`], used to build raw records for fixtures.
#[derive(Debug, Default)]
pub struct RecordWriter {
    out: Vec<u8>,
}

impl RecordWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.out.extend_from_slice(v);
    }

    pub fn zeroes(&mut self, n: usize) {
        self.out.resize(self.out.len() + n, 0);
    }

    pub fn span_context(&mut self, sc: &CapturedSpanContext) {
        self.bytes(&sc.trace_id);
        self.bytes(&sc.span_id);
        self.u8(sc.trace_flags);
        self.zeroes(7);
    }

    pub fn base(&mut self, base: &BaseSpanProperties) {
        self.u64(base.start_time);
        self.u64(base.end_time);
        self.span_context(&base.span_context);
        self.span_context(&base.parent_span_context);
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_base() -> BaseSpanProperties {
        BaseSpanProperties {
            start_time: 1_000,
            end_time: 2_500,
            span_context: CapturedSpanContext::new([1; 16], [2; 8]),
            parent_span_context: CapturedSpanContext::new([1; 16], [3; 8]),
        }
    }

    #[test]
    fn reads_base_properties() {
        let raw = sample_base().to_bytes();
        assert_eq!(raw.len(), BASE_PROPERTIES_SIZE);

        let base = BaseSpanProperties::read(&raw).unwrap();
        assert_eq!(base, sample_base());
        assert!(base.parent().unwrap().is_remote());
    }

    #[test]
    fn short_record_is_rejected() {
        let raw = sample_base().to_bytes();
        let err = BaseSpanProperties::read(&raw[..40]).unwrap_err();
        assert!(matches!(err, AutotraceError::Record(_)));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut raw = sample_base().to_bytes();
        raw.extend_from_slice(&[0xff; 12]);
        assert_eq!(BaseSpanProperties::read(&raw).unwrap(), sample_base());
    }

    #[test]
    fn reader_marks_overrun() {
        let mut reader = RecordReader::new(&[1, 0, 0]);
        assert_eq!(reader.u8(), 1);
        assert_eq!(reader.i32(), 0);
        assert!(reader.overrun);
    }

    #[test]
    fn reads_little_endian_integers() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(-7i32).to_le_bytes());
        raw.extend_from_slice(&42i64.to_le_bytes());
        raw.extend_from_slice(&513u16.to_le_bytes());
        raw.extend_from_slice(&70_000u32.to_le_bytes());
        let mut reader = RecordReader::new(&raw);
        assert_eq!(reader.i32(), -7);
        assert_eq!(reader.i64(), 42);
        assert_eq!(reader.u16(), 513);
        assert_eq!(reader.u32(), 70_000);
        assert!(!reader.overrun);
    }
}
