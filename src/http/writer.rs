use std::io::{self, Write};

/// One I/O block. A write this large bypasses an empty buffer.
pub const BLOCK_SIZE: usize = 8192;

/// Output side of a connection: batches small writes, streams large ones.
pub(crate) struct ChannelWriter<'c> {
    channel: Box<dyn Write + 'c>,
    buffer: Vec<u8>,
}

impl<'c> ChannelWriter<'c> {
    pub(crate) fn new(channel: impl Write + 'c) -> Self {
        Self {
            channel: Box::new(channel),
            buffer: Vec::with_capacity(BLOCK_SIZE),
        }
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> io::Result<()> {
        loop {
            if self.buffer.is_empty() {
                if data.len() >= BLOCK_SIZE {
                    return self.channel.write_all(data);
                }
                self.buffer.extend_from_slice(data);
                return Ok(());
            }

            if self.buffer.len() + data.len() < BLOCK_SIZE {
                self.buffer.extend_from_slice(data);
                return Ok(());
            }

            self.flush_buffer()?;
        }
    }

    /// Sends whatever is buffered. The channel itself is not flushed.
    pub(crate) fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = self.channel.write_all(&self.buffer);
        self.buffer.clear();
        result
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.channel.flush()
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
