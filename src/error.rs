//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Kadnode crate error enum.
pub enum Error {
    /// Id was not 20 bytes, or its hex encoding was not 40 characters.
    #[error("Invalid Id size, expected 20 bytes, got {0}")]
    InvalidIdSize(usize),

    /// Id hex encoding contained a character that is not a hex digit.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}

/// Alias for `Result<T, Error>`
pub type Result<T, E = Error> = core::result::Result<T, E>;
