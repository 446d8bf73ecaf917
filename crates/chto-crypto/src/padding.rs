//! Random length-obscuring trailer
//!
//! A trailer of `L` bytes (1..=255) is appended to the plaintext before
//! sealing: `L - 1` random bytes followed by the byte `L` itself. A drawn
//! length of zero cannot describe itself and is replaced by 13.
//!
//! This hides the exact size of small files only; it makes no claim about
//! large ones.

use std::io::{self, Read};

use chto_core::{ChtoError, ChtoResult};

use crate::random::fill_random;

/// Longest possible trailer.
pub const MAX_PADDING: usize = u8::MAX as usize;

/// Length used when the random draw is zero.
const ZERO_DRAW_PADDING: u8 = 13;

/// Draw a fresh trailer.
pub fn padding_trailer() -> ChtoResult<Vec<u8>> {
    let mut draw = [0u8; 1];
    fill_random(&mut draw)?;
    let len = match draw[0] {
        0 => ZERO_DRAW_PADDING,
        n => n,
    };

    let mut trailer = vec![0u8; len as usize];
    fill_random(&mut trailer[..len as usize - 1])?;
    trailer[len as usize - 1] = len;
    Ok(trailer)
}

/// Length of `data` once its trailer is stripped.
pub fn unpadded_len(data: &[u8]) -> ChtoResult<usize> {
    let Some(&last) = data.last() else {
        return Err(ChtoError::format("padding: empty plaintext"));
    };
    let len = last as usize;
    if len == 0 || len > data.len() {
        return Err(ChtoError::format(format!(
            "padding: invalid trailer length {len} for {} bytes",
            data.len()
        )));
    }
    Ok(data.len() - len)
}

pub fn add_padding(mut data: Vec<u8>) -> ChtoResult<Vec<u8>> {
    data.extend_from_slice(&padding_trailer()?);
    Ok(data)
}

pub fn remove_padding(data: &[u8]) -> ChtoResult<&[u8]> {
    Ok(&data[..unpadded_len(data)?])
}

/// Reader that yields its source followed by a random trailer.
pub struct Padded<R> {
    inner: R,
    trailer: Vec<u8>,
    pos: usize,
    inner_done: bool,
}

impl<R: Read> Padded<R> {
    pub fn new(inner: R) -> ChtoResult<Self> {
        Ok(Self {
            inner,
            trailer: padding_trailer()?,
            pos: 0,
            inner_done: false,
        })
    }
}

impl<R: Read> Read for Padded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.inner_done {
            let n = self.inner.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.inner_done = true;
        }
        let rest = &self.trailer[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reader that strips the trailer from its source.
///
/// The last [`MAX_PADDING`] bytes are held back until the source reaches EOF,
/// at which point the trailer is validated. An invalid trailer surfaces as a
/// `ChtoError::Format` carried inside the `io::Error`.
pub struct Unpadded<R> {
    inner: R,
    held: Vec<u8>,
    eof: bool,
}

impl<R: Read> Unpadded<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            held: Vec::new(),
            eof: false,
        }
    }
}

impl<R: Read> Read for Unpadded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut scratch = [0u8; 8192];
        while !self.eof && self.held.len() <= MAX_PADDING {
            let n = self.inner.read(&mut scratch)?;
            if n == 0 {
                self.eof = true;
                match unpadded_len(&self.held) {
                    Ok(keep) => self.held.truncate(keep),
                    Err(e) => {
                        // Nothing held back may be released after a bad trailer.
                        self.held.clear();
                        return Err(e.into_io());
                    }
                }
            } else {
                self.held.extend_from_slice(&scratch[..n]);
            }
        }

        let available = if self.eof {
            self.held.len()
        } else {
            self.held.len() - MAX_PADDING
        };
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.held[..n]);
        self.held.drain(..n);
        Ok(n)
    }
}
