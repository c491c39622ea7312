//! Resource URL construction.
//!
//! Resources are addressed by slash-separated paths; every segment is
//! percent-encoded and the final segment carries the `.json` suffix.

use crate::error::{Result, StoreError};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Join path segments, encoding each one.
pub fn join_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| utf8_percent_encode(s.as_ref(), SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build `{base}/{path}.json` for a slash-separated, already-encoded path.
pub fn resource_url(base: &str, path: &str) -> Result<String> {
    let parsed = url::Url::parse(base).map_err(|e| StoreError::Config(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::Config(format!(
            "unsupported scheme in base url: {}",
            base
        )));
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        Ok(format!("{}/{}", base, super::JSON_SUFFIX))
    } else {
        Ok(format!("{}/{}{}", base, path, super::JSON_SUFFIX))
    }
}
