use crypto_secretbox::aead::Error as CryptoError;
use std::io::Error as IoError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors arising inside the long-lived transport tasks.
///
/// None of these tear down a session on their own; policy lives with the
/// core loop.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Crypto(CryptoError),
    Io(IoError),
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}
