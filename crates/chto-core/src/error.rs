use std::io;

use thiserror::Error;

pub type ChtoResult<T> = Result<T, ChtoError>;

#[derive(Debug, Error)]
pub enum ChtoError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("invalid container: {0}")]
    Format(String),

    #[error("container version {found} is newer than the supported version {supported}")]
    Version { found: u8, supported: u8 },

    /// Tag verification failed. A wrong password and tampered data are
    /// reported identically; telling them apart would leak information.
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    #[error("unsupported algorithm id: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("random source failure: {0}")]
    Random(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ChtoError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Box this error into an `io::Error` so it can cross a `Read`/`Write`
    /// adapter. `From<io::Error>` unwraps it again on the other side.
    pub fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

impl From<io::Error> for ChtoError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Self>()) {
                Some(Ok(inner)) => *inner,
                _ => Self::Io(kind.into()),
            };
        }
        Self::Io(err)
    }
}
