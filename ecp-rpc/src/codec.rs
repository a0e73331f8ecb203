//! Framing of messages on a byte stream.
//!
//! Each frame consists of the length of the body as a big-endian `u32`, followed by the body: a
//! JSON document.

use std::io::{ErrorKind, Read, Write};

use serde::{Serialize, de::DeserializeOwned};

use crate::Error;

/// The maximum size of a frame body in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// The size of the frame header in bytes.
const HEADER_LEN: usize = 4;

/// Writes `message` as one frame to `writer` and flushes it.
///
/// # Errors
///
/// Returns an error if
///
/// - `message` can not be serialized,
/// - the serialized message exceeds [`MAX_FRAME_LEN`],
/// - or writing to `writer` fails.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), Error> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| Error::FrameTooLarge {
        len: body.len(),
        max: MAX_FRAME_LEN,
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);

    writer.write_all(&frame).map_err(|source| Error::Io {
        context: "writing a frame",
        source,
    })?;
    writer.flush().map_err(|source| Error::Io {
        context: "flushing a frame",
        source,
    })
}

/// Reads one frame from `reader` and deserializes its body.
///
/// Returns [`None`] if the stream ends cleanly before a new frame starts.
///
/// # Errors
///
/// Returns an error if
///
/// - reading from `reader` fails,
/// - the stream ends within a frame,
/// - the announced frame size exceeds [`MAX_FRAME_LEN`],
/// - or the body can not be deserialized.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>, Error> {
    let mut header = [0u8; HEADER_LEN];
    if !read_header(reader, &mut header)? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(|source| Error::Io {
        context: "reading a frame body",
        source,
    })?;

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Fills `header` from `reader`.
///
/// Returns `false` if the stream ends before the first byte of the header.
fn read_header<R: Read>(reader: &mut R, header: &mut [u8; HEADER_LEN]) -> Result<bool, Error> {
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(Error::Io {
                    context: "reading a frame header",
                    source: ErrorKind::UnexpectedEof.into(),
                });
            }
            Ok(read) => filled += read,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(source) => {
                return Err(Error::Io {
                    context: "reading a frame header",
                    source,
                });
            }
        }
    }
    Ok(true)
}
