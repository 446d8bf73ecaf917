//! Chunked AEAD stream
//!
//! Payload format (binary), repeated until EOF:
//! ```text
//! [2 bytes: sealed length, big-endian][ciphertext][16 bytes: tag]
//! ```
//!
//! Every chunk of one layer is sealed under the same key. The nonce starts at
//! the random value from the header and is incremented as a 96-bit big-endian
//! counter after each chunk, on both sides. A skipped or repeated increment
//! makes every following chunk fail authentication.
//!
//! Each chunk authenticates one byte of associated data: `1` on the last
//! chunk of the stream, `0` on every other. A stream always ends with a
//! marked chunk (empty input seals one empty chunk), so a stream cut at a
//! chunk boundary fails authentication instead of reading as complete.

use std::io::{self, Read, Write};

use tracing::debug;

use chto_core::{ChtoError, ChtoResult};

use crate::aead::AeadCipher;
use crate::format::MAX_CHUNK_SIZE;
use crate::NONCE_SIZE;

/// Associated data of the chunk that ends a stream, and of every other chunk.
const FINAL_CHUNK_AAD: [u8; 1] = [1];
const CHUNK_AAD: [u8; 1] = [0];

fn chunk_aad(last: bool) -> &'static [u8] {
    if last {
        &FINAL_CHUNK_AAD
    } else {
        &CHUNK_AAD
    }
}

/// Per-layer chunk nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceCounter {
    bytes: [u8; NONCE_SIZE],
}

impl NonceCounter {
    pub fn new(initial: [u8; NONCE_SIZE]) -> Self {
        Self { bytes: initial }
    }

    pub fn current(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }

    /// Increment by one, least-significant (last) byte first.
    pub fn advance(&mut self) {
        for byte in self.bytes.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }
}

/// Writer that seals everything written to it into length-prefixed chunks.
///
/// A full chunk is only sealed once more data arrives, since until then it
/// may be the last. Call [`ChunkSealer::finish`] to seal the final chunk;
/// dropping the sealer without it leaves an unterminated stream.
#[derive(Debug)]
pub struct ChunkSealer<W: Write> {
    inner: W,
    cipher: AeadCipher,
    nonce: NonceCounter,
    buf: Vec<u8>,
    chunk_size: usize,
    chunks: u64,
}

impl<W: Write> ChunkSealer<W> {
    pub fn new(inner: W, cipher: AeadCipher, nonce: [u8; NONCE_SIZE], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        Self {
            inner,
            cipher,
            nonce: NonceCounter::new(nonce),
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
            chunks: 0,
        }
    }

    fn seal_chunk(&mut self, last: bool) -> ChtoResult<()> {
        let sealed = self
            .cipher
            .seal_with_aad(self.nonce.current(), chunk_aad(last), &self.buf)?;
        let len = u16::try_from(sealed.len()).map_err(|_| {
            ChtoError::format(format!("sealed chunk of {} bytes exceeds frame limit", sealed.len()))
        })?;

        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(&sealed)?;
        self.nonce.advance();
        self.chunks += 1;
        self.buf.clear();
        Ok(())
    }

    /// Seal the buffered bytes as the final chunk and return the inner writer
    /// with the number of chunks written.
    pub fn finish(mut self) -> ChtoResult<(W, u64)> {
        self.seal_chunk(true)?;
        self.inner.flush()?;
        debug!(chunks = self.chunks, cipher = %self.cipher.cipher(), "layer sealed");
        Ok((self.inner, self.chunks))
    }
}

impl<W: Write> Write for ChunkSealer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.buf.len() == self.chunk_size {
            self.seal_chunk(false).map_err(ChtoError::into_io)?;
        }
        let room = self.chunk_size - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Buffered bytes are only sealed by a later write or `finish`.
        self.inner.flush()
    }
}

/// Reader that opens a length-prefixed chunk stream.
///
/// Reads one length prefix ahead so it knows whether the chunk being opened
/// is the last one.
#[derive(Debug)]
pub struct ChunkOpener<R: Read> {
    inner: R,
    cipher: AeadCipher,
    nonce: NonceCounter,
    plain: Vec<u8>,
    pos: usize,
    chunks: u64,
    next_prefix: Option<[u8; 2]>,
    finished: bool,
}

impl<R: Read> ChunkOpener<R> {
    pub fn new(inner: R, cipher: AeadCipher, nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            inner,
            cipher,
            nonce: NonceCounter::new(nonce),
            plain: Vec::new(),
            pos: 0,
            chunks: 0,
            next_prefix: None,
            finished: false,
        }
    }

    /// Chunks opened so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Open the next chunk, or `None` once the final chunk has been opened.
    pub fn next_chunk(&mut self) -> ChtoResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let prefix = match self.next_prefix.take() {
            Some(prefix) => prefix,
            None => self
                .read_prefix()?
                .ok_or_else(|| ChtoError::format("empty chunk stream: final chunk missing"))?,
        };

        let len = u16::from_be_bytes(prefix) as usize;
        let mut sealed = vec![0u8; len];
        if read_full(&mut self.inner, &mut sealed)? != len {
            return Err(ChtoError::format(format!(
                "truncated chunk {}: expected {len} bytes",
                self.chunks
            )));
        }

        // The chunk is the last one exactly when the stream ends after it.
        self.next_prefix = self.read_prefix()?;
        let last = self.next_prefix.is_none();

        let plain = self
            .cipher
            .open_with_aad(self.nonce.current(), chunk_aad(last), &sealed)
            .inspect_err(|_| {
                debug!(chunk = self.chunks, last, "chunk failed authentication");
            })?;
        self.nonce.advance();
        self.chunks += 1;
        self.finished = last;
        Ok(Some(plain))
    }

    /// Next length prefix, or `None` at a clean end of input.
    fn read_prefix(&mut self) -> ChtoResult<Option<[u8; 2]>> {
        let mut prefix = [0u8; 2];
        match read_full(&mut self.inner, &mut prefix)? {
            0 => Ok(None),
            2 => Ok(Some(prefix)),
            _ => Err(ChtoError::format("truncated chunk length prefix")),
        }
    }
}

impl<R: Read> Read for ChunkOpener<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.plain.len() {
            match self.next_chunk().map_err(ChtoError::into_io)? {
                Some(plain) => {
                    self.plain = plain;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }
        let rest = &self.plain[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Read until `buf` is full or EOF; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> ChtoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CipherKey;
    use crate::{KEY_SIZE, TAG_SIZE};
    use chto_core::Cipher;

    fn cipher() -> AeadCipher {
        AeadCipher::new(Cipher::ChaCha20Poly1305, &CipherKey::from_bytes([7u8; KEY_SIZE]))
    }

    fn seal_all(data: &[u8], nonce: [u8; NONCE_SIZE], chunk_size: usize) -> (Vec<u8>, u64) {
        let mut sealer = ChunkSealer::new(Vec::new(), cipher(), nonce, chunk_size);
        sealer.write_all(data).unwrap();
        sealer.finish().unwrap()
    }

    /// Split a payload into its sealed frames.
    fn frames(payload: &[u8]) -> Vec<&[u8]> {
        let mut out = Vec::new();
        let mut rest = payload;
        while !rest.is_empty() {
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            out.push(&rest[2..2 + len]);
            rest = &rest[2 + len..];
        }
        out
    }

    #[test]
    fn test_nonce_increment_big_endian() {
        let mut nonce = NonceCounter::new([0u8; NONCE_SIZE]);
        nonce.advance();
        assert_eq!(nonce.current()[NONCE_SIZE - 1], 1);

        let mut initial = [0u8; NONCE_SIZE];
        initial[NONCE_SIZE - 1] = 0xFF;
        let mut nonce = NonceCounter::new(initial);
        nonce.advance();
        assert_eq!(nonce.current()[NONCE_SIZE - 2..], [1, 0]);
    }

    #[test]
    fn test_nonce_wraps_around() {
        let mut nonce = NonceCounter::new([0xFF; NONCE_SIZE]);
        nonce.advance();
        assert_eq!(nonce.current(), &[0u8; NONCE_SIZE]);
    }

    #[test]
    fn test_multi_chunk_roundtrip() {
        let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();
        let (payload, chunks) = seal_all(&data, [9u8; NONCE_SIZE], MAX_CHUNK_SIZE);
        assert_eq!(chunks, data.len().div_ceil(MAX_CHUNK_SIZE) as u64);

        let mut opener = ChunkOpener::new(&payload[..], cipher(), [9u8; NONCE_SIZE]);
        let mut out = Vec::new();
        opener.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(opener.chunks(), chunks);
    }

    #[test]
    fn test_full_chunk_fits_prefix() {
        let data = vec![0xA5u8; MAX_CHUNK_SIZE];
        let (payload, chunks) = seal_all(&data, [0u8; NONCE_SIZE], MAX_CHUNK_SIZE);
        assert_eq!(chunks, 1);
        assert_eq!(&payload[..2], &u16::MAX.to_be_bytes());
        assert_eq!(payload.len(), 2 + MAX_CHUNK_SIZE + TAG_SIZE);
    }

    #[test]
    fn test_empty_input_seals_final_chunk() {
        let (payload, chunks) = seal_all(b"", [0u8; NONCE_SIZE], 16);
        assert_eq!(chunks, 1);
        assert_eq!(payload.len(), 2 + TAG_SIZE);

        let mut opener = ChunkOpener::new(&payload[..], cipher(), [0u8; NONCE_SIZE]);
        assert_eq!(opener.next_chunk().unwrap().unwrap(), b"");
        assert!(opener.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_empty_stream_rejected() {
        let mut opener = ChunkOpener::new(&b""[..], cipher(), [0u8; NONCE_SIZE]);
        assert!(matches!(opener.next_chunk(), Err(ChtoError::Format(_))));
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let (payload, chunks) = seal_all(&[3u8; 32], [0u8; NONCE_SIZE], 16);
        assert_eq!(chunks, 2);
        assert_eq!(frames(&payload).len(), 2);
    }

    #[test]
    fn test_dropped_trailing_chunks_fail() {
        let (payload, _) = seal_all(&[4u8; 40], [0u8; NONCE_SIZE], 16);
        let frames = frames(&payload);
        assert_eq!(frames.len(), 3);

        for keep in 1..frames.len() {
            let mut cut = Vec::new();
            for frame in &frames[..keep] {
                cut.extend_from_slice(&(frame.len() as u16).to_be_bytes());
                cut.extend_from_slice(frame);
            }

            let mut out = Vec::new();
            let err = ChunkOpener::new(&cut[..], cipher(), [0u8; NONCE_SIZE])
                .read_to_end(&mut out)
                .unwrap_err();
            assert!(
                matches!(ChtoError::from(err), ChtoError::Authentication),
                "stream cut after {keep} chunks must not read as complete"
            );
        }
    }

    #[test]
    fn test_data_after_final_chunk_fails() {
        let (mut payload, _) = seal_all(b"abc", [0u8; NONCE_SIZE], 16);
        let copy = payload.clone();
        payload.extend_from_slice(&copy);

        let mut opener = ChunkOpener::new(&payload[..], cipher(), [0u8; NONCE_SIZE]);
        assert!(matches!(opener.next_chunk(), Err(ChtoError::Authentication)));
    }

    #[test]
    fn test_desync_fails_at_next_chunk() {
        let start = [0u8; NONCE_SIZE];
        let (payload, _) = seal_all(&[1u8; 40], start, 16);
        let frames = frames(&payload);
        assert_eq!(frames.len(), 3);

        let engine = cipher();
        let mut nonce = NonceCounter::new(start);
        let open = |nonce: &NonceCounter, frame: &[u8], last: bool| {
            engine.open_with_aad(nonce.current(), chunk_aad(last), frame)
        };
        assert_eq!(open(&nonce, frames[0], false).unwrap(), [1u8; 16]);

        // Decode chunk 1 without advancing: chunk 0's nonce.
        let result = open(&nonce, frames[1], false);
        assert!(matches!(result, Err(ChtoError::Authentication)));

        nonce.advance();
        assert_eq!(open(&nonce, frames[1], false).unwrap(), [1u8; 16]);

        // Double advance skips chunk 2's nonce.
        nonce.advance();
        nonce.advance();
        let result = open(&nonce, frames[2], true);
        assert!(matches!(result, Err(ChtoError::Authentication)));
    }

    #[test]
    fn test_reordered_chunks_fail() {
        let (payload, _) = seal_all(&[2u8; 32], [0u8; NONCE_SIZE], 16);
        let frames = frames(&payload);

        let mut swapped = Vec::new();
        for frame in [frames[1], frames[0]] {
            swapped.extend_from_slice(&(frame.len() as u16).to_be_bytes());
            swapped.extend_from_slice(frame);
        }

        let mut opener = ChunkOpener::new(&swapped[..], cipher(), [0u8; NONCE_SIZE]);
        assert!(matches!(opener.next_chunk(), Err(ChtoError::Authentication)));
    }

    #[test]
    fn test_truncated_prefix() {
        let (mut payload, _) = seal_all(b"abc", [0u8; NONCE_SIZE], 16);
        payload.push(0x00);

        // The dangling byte is seen while peeking past the first chunk.
        let mut opener = ChunkOpener::new(&payload[..], cipher(), [0u8; NONCE_SIZE]);
        assert!(matches!(opener.next_chunk(), Err(ChtoError::Format(_))));
    }

    #[test]
    fn test_truncated_body() {
        let (payload, _) = seal_all(b"abcdef", [0u8; NONCE_SIZE], 16);
        let truncated = &payload[..payload.len() - 1];

        let mut opener = ChunkOpener::new(truncated, cipher(), [0u8; NONCE_SIZE]);
        assert!(matches!(opener.next_chunk(), Err(ChtoError::Format(_))));
    }

    #[test]
    fn test_reader_surfaces_typed_error() {
        let (mut payload, _) = seal_all(b"abcdef", [0u8; NONCE_SIZE], 16);
        let last = payload.len() - 1;
        payload[last] ^= 0x80;

        let mut out = Vec::new();
        let err = ChunkOpener::new(&payload[..], cipher(), [0u8; NONCE_SIZE])
            .read_to_end(&mut out)
            .unwrap_err();
        assert!(matches!(ChtoError::from(err), ChtoError::Authentication));
    }
}
