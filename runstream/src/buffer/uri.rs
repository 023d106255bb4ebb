//! Capability URIs and buffer access strings.

use std::fmt;
use std::path::Path;

use reqwest::Url;
use thiserror::Error;

/// Access strings read from disk must be smaller than this.
pub const MAX_ACCESS_FILE_SIZE: u64 = 2 * 1024;

/// Errors resolving a buffer access string.
///
/// Messages never include the access string itself, since it may carry a
/// credential.
#[derive(Debug, Error)]
pub enum AccessStringError {
    #[error(
        "the buffer access string is invalid. It must be a URI or the path of a file whose contents is a URI"
    )]
    Invalid,

    #[error("unable to read URI string from file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A time-limited absolute URI granting access to one buffer.
///
/// The query string is the credential. [`fmt::Display`] and [`fmt::Debug`]
/// omit it so the URI can appear in logs and errors.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityUri {
    url: Url,
}

impl CapabilityUri {
    /// Parse an absolute URI.
    pub fn parse(uri: &str) -> Result<Self, AccessStringError> {
        let url = Url::parse(uri).map_err(|_| AccessStringError::Invalid)?;
        if url.cannot_be_a_base() {
            return Err(AccessStringError::Invalid);
        }
        Ok(Self { url })
    }

    /// Address of block `index`: the capability path with `/{index}` appended,
    /// query string preserved.
    pub fn block_url(&self, index: u64) -> Url {
        let mut url = self.url.clone();
        let path = format!("{}/{}", self.url.path().trim_end_matches('/'), index);
        url.set_path(&path);
        url
    }

    /// The full URI including its credential.
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Scheme, host and path only.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        let _ = url.set_password(None);
        url.to_string()
    }
}

impl fmt::Display for CapabilityUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for CapabilityUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityUri").field(&self.redacted()).finish()
    }
}

/// Resolve an access string into a [`CapabilityUri`].
///
/// The string is either the URI itself or the path of an existing regular file
/// smaller than [`MAX_ACCESS_FILE_SIZE`] whose contents, with trailing spaces
/// and line endings removed, is the URI.
pub fn resolve_access_string(access: &str) -> Result<CapabilityUri, AccessStringError> {
    let path = Path::new(access);
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() && meta.len() < MAX_ACCESS_FILE_SIZE {
            let contents = std::fs::read_to_string(path).map_err(|source| AccessStringError::Read {
                path: access.to_string(),
                source,
            })?;
            return CapabilityUri::parse(contents.trim_end_matches([' ', '\r', '\n']));
        }
    }

    CapabilityUri::parse(access)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const URI: &str = "https://acct.blob.example.net/buf-1?sv=2020&sig=SECRET";

    #[test]
    fn test_block_url_appends_index_and_keeps_query() {
        let uri = CapabilityUri::parse(URI).unwrap();
        assert_eq!(
            uri.block_url(12).as_str(),
            "https://acct.blob.example.net/buf-1/12?sv=2020&sig=SECRET"
        );
    }

    #[test]
    fn test_block_url_with_trailing_slash() {
        let uri = CapabilityUri::parse("https://h.example/c/?sig=x").unwrap();
        assert_eq!(uri.block_url(0).as_str(), "https://h.example/c/0?sig=x");
    }

    #[test]
    fn test_display_and_debug_hide_query() {
        let uri = CapabilityUri::parse(URI).unwrap();
        assert_eq!(uri.to_string(), "https://acct.blob.example.net/buf-1");
        assert!(!format!("{:?}", uri).contains("SECRET"));
    }

    #[test]
    fn test_relative_uri_rejected() {
        assert!(matches!(
            CapabilityUri::parse("buf-1/0"),
            Err(AccessStringError::Invalid)
        ));
    }

    #[test]
    fn test_resolve_direct_uri() {
        let uri = resolve_access_string(URI).unwrap();
        assert_eq!(uri.as_url().as_str(), URI);
    }

    #[test]
    fn test_resolve_from_file_trims_line_endings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{} \r\n", URI).unwrap();

        let uri = resolve_access_string(file.path().to_str().unwrap()).unwrap();
        assert_eq!(uri.as_url().as_str(), URI);
    }

    #[test]
    fn test_large_file_is_not_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'a'; 4096]).unwrap();

        let result = resolve_access_string(file.path().to_str().unwrap());
        assert!(matches!(result, Err(AccessStringError::Invalid)));
    }

    #[test]
    fn test_invalid_error_does_not_echo_input() {
        let err = resolve_access_string("not a uri sig=SECRET").unwrap_err();
        assert!(!err.to_string().contains("SECRET"));
    }
}
