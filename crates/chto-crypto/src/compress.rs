//! zstd compression applied to plaintext before padding
//!
//! The streaming readers are what the engine uses; the buffer functions exist
//! for callers that already hold the whole plaintext.

use std::io::{self, BufReader, Read};

use chto_core::{ChtoError, ChtoResult};

/// Default zstd level
pub const DEFAULT_LEVEL: i32 = 3;

pub fn compress(data: &[u8], level: i32) -> ChtoResult<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| ChtoError::Compression(e.to_string()))
}

pub fn decompress(data: &[u8]) -> ChtoResult<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| ChtoError::Compression(e.to_string()))
}

/// Wrap `source` so that reading yields its zstd-compressed form.
pub fn compressing_reader<R: Read>(source: R, level: i32) -> ChtoResult<impl Read> {
    zstd::stream::read::Encoder::new(source, level)
        .map_err(|e| ChtoError::Compression(e.to_string()))
}

/// Reader yielding the decompressed form of a zstd stream.
///
/// Errors raised by the source pass through untouched; anything the decoder
/// itself raises becomes `ChtoError::Compression`.
pub struct Decompressor<R: Read> {
    decoder: zstd::stream::read::Decoder<'static, BufReader<R>>,
}

impl<R: Read> Decompressor<R> {
    pub fn new(source: R) -> ChtoResult<Self> {
        let decoder = zstd::stream::read::Decoder::new(source)
            .map_err(|e| ChtoError::Compression(e.to_string()))?;
        Ok(Self { decoder })
    }
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf).map_err(|e| {
            if e.get_ref().is_some_and(|inner| inner.is::<ChtoError>()) {
                e
            } else {
                ChtoError::Compression(e.to_string()).into_io()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_repetitive() {
        let data = b"Donnee repetitive pour bien compresser. ".repeat(100);
        let compressed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let compressed = compress(b"", DEFAULT_LEVEL).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn test_decompress_garbage() {
        let result = decompress(b"definitely not a zstd frame");
        assert!(matches!(result, Err(ChtoError::Compression(_))));
    }

    #[test]
    fn test_streaming_matches_buffer() {
        let data: Vec<u8> = (0u8..=255).cycle().take(300_000).collect();

        let mut compressed = Vec::new();
        compressing_reader(&data[..], DEFAULT_LEVEL)
            .unwrap()
            .read_to_end(&mut compressed)
            .unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);

        let mut restored = Vec::new();
        Decompressor::new(&compressed[..])
            .unwrap()
            .read_to_end(&mut restored)
            .unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_streaming_garbage_is_compression_error() {
        let mut out = Vec::new();
        let err = Decompressor::new(&b"definitely not a zstd frame"[..])
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert!(matches!(ChtoError::from(err), ChtoError::Compression(_)));
    }

    #[test]
    fn test_streaming_source_error_passes_through() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(ChtoError::Authentication.into_io())
            }
        }

        let mut out = Vec::new();
        let err = Decompressor::new(Failing)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert!(matches!(ChtoError::from(err), ChtoError::Authentication));
    }
}
