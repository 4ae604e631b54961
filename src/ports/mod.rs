// Ports - Interface definitions (contracts)

use crate::error::EncodeResult;
use crate::format::FormatTemplate;

/// Port for the catalog of encoder profiles
pub trait FormatCatalog: Send + Sync {
    /// Load the unresolved descriptor registered under `name`
    ///
    /// Names may carry a `video/` type prefix.
    fn load(&self, name: &str) -> EncodeResult<FormatTemplate>;

    /// Names of every format the catalog offers, `video/` prefixed
    fn list(&self) -> EncodeResult<Vec<String>>;
}

/// Port through which the host is asked to re-invoke with the next chunk
pub trait ContinuationSignal: Send + Sync {
    /// Request another invocation for `session_id`
    fn request_next_chunk(&self, session_id: &str);
}

/// Strip an optional `type/` prefix from a format name
pub fn bare_format_name(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, ext)) => ext,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_format_name() {
        assert_eq!(bare_format_name("video/h264-mp4"), "h264-mp4");
        assert_eq!(bare_format_name("gif"), "gif");
    }
}
