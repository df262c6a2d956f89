use std::io;

/// Wraps a writer and diverts any write whose buffer contains `target` into
/// an internal buffer instead of passing it through.
///
/// Used by the driver loop to sniff the client's stderr for the locked-plugin
/// status line without the client ever seeing it.
pub struct TrapWriter<W> {
    inner: W,
    target: Vec<u8>,
    trapped: Vec<Vec<u8>>,
}

impl<W: io::Write> TrapWriter<W> {
    pub fn new(inner: W, target: impl Into<Vec<u8>>) -> Self {
        TrapWriter {
            inner,
            target: target.into(),
            trapped: Vec::new(),
        }
    }

    /// Messages trapped so far, in write order.
    pub fn trapped_messages(&self) -> impl Iterator<Item = &[u8]> {
        self.trapped.iter().map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.trapped.is_empty()
    }

    pub fn clear(&mut self) {
        self.trapped.clear();
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for TrapWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.target.is_empty() && contains(buf, &self.target) {
            self.trapped.push(buf.to_vec());
            return Ok(buf.len());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len().max(1)).any(|w| w == needle)
}
