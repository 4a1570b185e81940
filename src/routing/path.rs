//! Request path canonicalization.
//!
//! Classification is only meaningful if the upstream resolves the same path
//! the gate classified. Every path is first reduced to a single spelling:
//! percent-encoded unreserved characters are decoded, repeated slashes
//! collapse, and `.` and `..` segments are resolved. Anything still
//! ambiguous after that is refused.

use std::borrow::Cow;

use thiserror::Error;

/// A path that has no safe canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// `%2F` or `%5C`: some servers split on these after decoding.
    #[error("encoded path separator")]
    EncodedSeparator,

    /// Raw `\`, treated as a separator by some servers.
    #[error("backslash in path")]
    Backslash,
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes of unreserved characters; other escapes stay as
/// they are.
fn decode_unreserved(path: &str) -> Result<String, PathError> {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'\\' {
            return Err(PathError::Backslash);
        }
        if byte == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi << 4 | lo;
                if decoded == b'/' || decoded == b'\\' {
                    return Err(PathError::EncodedSeparator);
                }
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                    i += 3;
                    continue;
                }
            }
        }
        // Paths reaching the gate are ASCII per the URI grammar; copy any
        // other byte sequence through untouched.
        let end = path[i..]
            .char_indices()
            .nth(1)
            .map(|(offset, _)| i + offset)
            .unwrap_or(bytes.len());
        out.push_str(&path[i..end]);
        i = end;
    }
    Ok(out)
}

/// The canonical spelling of `path`.
///
/// Returns the input unchanged (borrowed) when it is already canonical.
/// Paths that are not origin-form (`*`) are returned as they are.
pub fn canonicalize(path: &str) -> Result<Cow<'_, str>, PathError> {
    if !path.starts_with('/') {
        return Ok(Cow::Borrowed(path));
    }

    let decoded = decode_unreserved(path)?;

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in decoded.split('/') {
        trailing_slash = false;
        match segment {
            "" => trailing_slash = true,
            "." => trailing_slash = true,
            ".." => {
                segments.pop();
                trailing_slash = true;
            }
            other => segments.push(other),
        }
    }

    let mut canonical = String::with_capacity(decoded.len());
    canonical.push('/');
    canonical.push_str(&segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        canonical.push('/');
    }

    if canonical == path {
        Ok(Cow::Borrowed(path))
    } else {
        Ok(Cow::Owned(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(path: &str) -> String {
        canonicalize(path).unwrap().into_owned()
    }

    #[test]
    fn test_canonical_paths_are_borrowed() {
        for path in ["/", "/deeper/42", "/station/", "/_next/static/app.js", "/a%20b", "*"] {
            assert!(
                matches!(canonicalize(path), Ok(Cow::Borrowed(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn test_repeated_slashes_collapse() {
        assert_eq!(canon("//deeper/42"), "/deeper/42");
        assert_eq!(canon("/deeper///42"), "/deeper/42");
        assert_eq!(canon("/deeper//"), "/deeper/");
        assert_eq!(canon("//"), "/");
    }

    #[test]
    fn test_dot_segments_resolve() {
        assert_eq!(canon("/landing/../deeper/42"), "/deeper/42");
        assert_eq!(canon("/./deeper/./42"), "/deeper/42");
        assert_eq!(canon("/deeper/42/.."), "/deeper/");
        assert_eq!(canon("/../../deeper"), "/deeper");
        assert_eq!(canon("/.."), "/");
    }

    #[test]
    fn test_unreserved_escapes_decode() {
        assert_eq!(canon("/%64eeper/42"), "/deeper/42");
        assert_eq!(canon("/%44eeper"), "/Deeper");
        assert_eq!(canon("/landing/%2e%2e/deeper"), "/deeper");
        assert_eq!(canon("/landing/%2E./deeper"), "/deeper");
    }

    #[test]
    fn test_reserved_escapes_stay_encoded() {
        assert_eq!(canon("/a%20b"), "/a%20b");
        assert_eq!(canon("/a%3Fb"), "/a%3Fb");
        assert_eq!(canon("/a%252e"), "/a%252e");
        assert_eq!(canon("/bad%zz"), "/bad%zz");
        assert_eq!(canon("/trailing%"), "/trailing%");
        assert_eq!(canon("/trailing%6"), "/trailing%6");
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        for path in ["//deeper/./42/", "/%64eeper/%2e%2e/x", "/a%252e/../b"] {
            let once = canon(path);
            assert_eq!(canon(&once), once, "{path}");
        }
    }

    #[test]
    fn test_ambiguous_separators_rejected() {
        assert_eq!(canonicalize("/%2Fdeeper/42"), Err(PathError::EncodedSeparator));
        assert_eq!(canonicalize("/deeper%2f42"), Err(PathError::EncodedSeparator));
        assert_eq!(canonicalize("/deeper%5C42"), Err(PathError::EncodedSeparator));
        assert_eq!(canonicalize("/landing\\..\\deeper"), Err(PathError::Backslash));
    }
}
