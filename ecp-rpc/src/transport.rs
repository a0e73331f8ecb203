//! A duplex stream made of two unidirectional streams.

use std::{
    io::{Read, StdinLock, StdoutLock, Write},
    process::{ChildStdin, ChildStdout},
};

use log::warn;

/// A stream end that can be closed explicitly.
pub trait Close {
    /// Closes the stream end, reporting the errors that dropping it would swallow.
    ///
    /// # Errors
    ///
    /// Returns an error if pending data can not be written out.
    fn close(self) -> std::io::Result<()>;
}

impl Close for ChildStdin {
    fn close(mut self) -> std::io::Result<()> {
        // the descriptor itself is closed on drop
        self.flush()
    }
}

impl Close for ChildStdout {
    fn close(self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Close for StdinLock<'static> {
    fn close(self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Close for StdoutLock<'static> {
    fn close(mut self) -> std::io::Result<()> {
        self.flush()
    }
}

/// Wraps a pair of unidirectional streams as one bidirectional stream.
///
/// Reads are served by the read end, writes go to the write end.
#[derive(Debug)]
pub struct Transport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Transport<R, W> {
    /// Creates a new [`Transport`] from a read end and a write end.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Splits the [`Transport`] into its read end and write end.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Close, W: Close> Transport<R, W> {
    /// Closes both ends of the [`Transport`].
    ///
    /// The write end is closed even if closing the read end fails.
    ///
    /// # Errors
    ///
    /// Returns the error of closing the read end if there is one, otherwise the error of closing
    /// the write end.
    pub fn close(self) -> std::io::Result<()> {
        let read = self.reader.close();
        if let Err(error) = read.as_ref() {
            warn!("Closing the read end of the transport failed: {error}");
        }
        let write = self.writer.close();
        if let Err(error) = write.as_ref() {
            warn!("Closing the write end of the transport failed: {error}");
        }
        read.and(write)
    }
}

impl<R: Read, W> Read for Transport<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for Transport<R, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
