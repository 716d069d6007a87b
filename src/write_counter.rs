//! Byte counting for size-limited replies.
//!
//! READDIR must stop adding entries once the reply would exceed the client's
//! `maxcount`, so every entry is measured by encoding it into a counting sink
//! before it is accepted.

use std::io::Write;

use crate::protocol::xdr::Serialize;

/// Writer adaptor that counts the bytes passing through it.
pub struct WriteCounter<W> {
    inner: W,
    count: usize,
}

impl<W: Write> WriteCounter<W> {
    pub fn new(inner: W) -> Self {
        WriteCounter { inner, count: 0 }
    }

    pub fn bytes_written(&self) -> usize {
        self.count
    }
}

impl<W: Write> Write for WriteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Encoded XDR size of `value`.
pub fn encoded_len<T: Serialize>(value: &T) -> std::io::Result<usize> {
    let mut counter = WriteCounter::new(std::io::sink());
    value.serialize(&mut counter)?;
    Ok(counter.bytes_written())
}
