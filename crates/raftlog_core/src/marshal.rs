//! Content marshalling contract.
//!
//! The log never interprets entry content. A [`ContentMarshal`] turns the
//! caller's content type into bytes and back; the log frames those bytes
//! with a length prefix, so marshals only need to round-trip a complete
//! byte slice.

use crate::error::{LogError, LogResult};

/// Encodes and decodes entry content.
///
/// Implementations must be deterministic: `unmarshal(marshal(c)) == c`.
pub trait ContentMarshal: Send + Sync + 'static {
    /// The decoded content type.
    type Content: Send + 'static;

    /// Appends the encoding of `content` to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be encoded.
    fn marshal(&self, content: &Self::Content, buf: &mut Vec<u8>) -> LogResult<()>;

    /// Decodes content from a complete payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn unmarshal(&self, bytes: &[u8]) -> LogResult<Self::Content>;
}

/// Passes raw bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesMarshal;

impl ContentMarshal for BytesMarshal {
    type Content = Vec<u8>;

    fn marshal(&self, content: &Vec<u8>, buf: &mut Vec<u8>) -> LogResult<()> {
        buf.extend_from_slice(content);
        Ok(())
    }

    fn unmarshal(&self, bytes: &[u8]) -> LogResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Stores UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringMarshal;

impl ContentMarshal for StringMarshal {
    type Content = String;

    fn marshal(&self, content: &String, buf: &mut Vec<u8>) -> LogResult<()> {
        buf.extend_from_slice(content.as_bytes());
        Ok(())
    }

    fn unmarshal(&self, bytes: &[u8]) -> LogResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| LogError::codec(format!("invalid UTF-8 content: {e}")))
    }
}
