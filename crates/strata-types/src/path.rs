//! Hierarchical paths and stream path-prefix compression.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while building or reconstructing paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A compressed record claims more shared segments than the previous path had.
    #[error("record shares {depth} segments but the previous path has only {available}")]
    DepthOutOfRange {
        /// Shared-prefix length carried by the record.
        depth: usize,
        /// Length of the previous path in the stream.
        available: usize,
    },

    /// A node ID string was not 64 hex characters.
    #[error("invalid node id: {0:?}")]
    InvalidNodeId(String),
}

/// An ordered sequence of path segments addressing one entry.
///
/// The empty path is the root of the tree and may hold a value like any
/// other entry.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from anything that yields segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments (the root has length 0).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Alias for [`Path::is_root`], for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Return a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The last segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Number of leading segments shared with `other`.
    pub fn common_prefix_len(&self, other: &Path) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Consume the path and return its segments.
    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self::from_segments(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Self::from_segments(segments)
    }
}

impl FromIterator<String> for Path {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

// ---------------------------------------------------------------------------
// Stream path compression
// ---------------------------------------------------------------------------

/// Producer side of stream path compression.
///
/// Each call returns how many leading segments the path shares with the
/// previously shortened path plus the remaining suffix. The state is only
/// meaningful within one stream.
#[derive(Debug, Default)]
pub struct PathShortener {
    prev: Path,
}

impl PathShortener {
    /// Create a shortener with no previous path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress `path` against the previous one and remember it.
    pub fn shorten(&mut self, path: &Path) -> (usize, Vec<String>) {
        let depth = self.prev.common_prefix_len(path);
        let suffix = path.segments()[depth..].to_vec();
        self.prev = path.clone();
        (depth, suffix)
    }
}

/// Consumer side of stream path compression.
#[derive(Debug, Default)]
pub struct PathLongener {
    prev: Vec<String>,
}

impl PathLongener {
    /// Create a longener with no previous path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the full path of a record from its shared depth and suffix.
    pub fn lengthen(&mut self, depth: usize, suffix: &[String]) -> Result<Path, PathError> {
        if depth > self.prev.len() {
            return Err(PathError::DepthOutOfRange {
                depth,
                available: self.prev.len(),
            });
        }

        self.prev.truncate(depth);
        self.prev.extend_from_slice(suffix);
        Ok(Path(self.prev.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_display() {
        assert_eq!(Path::root().to_string(), "/");
        assert_eq!(Path::from(["a", "b"]).to_string(), "/a/b");
    }

    #[test]
    fn test_parent_and_child() {
        let p = Path::from(["a", "b"]);
        assert_eq!(p.parent(), Some(Path::from(["a"])));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(Path::from(["a"]).child("b"), p);
        assert_eq!(p.last(), Some("b"));
    }

    #[test]
    fn test_starts_with() {
        let p = Path::from(["a", "b", "c"]);
        assert!(p.starts_with(&Path::root()));
        assert!(p.starts_with(&Path::from(["a", "b"])));
        assert!(!p.starts_with(&Path::from(["b"])));
    }

    #[test]
    fn test_shorten_then_lengthen_stream() {
        let paths = vec![
            Path::root(),
            Path::from(["foo"]),
            Path::from(["foo", "bar"]),
            Path::from(["foo", "baz", "x"]),
            Path::from(["qux"]),
        ];

        let mut shortener = PathShortener::new();
        let mut longener = PathLongener::new();
        let mut depths = Vec::new();

        for path in &paths {
            let (depth, suffix) = shortener.shorten(path);
            depths.push(depth);
            let rebuilt = longener.lengthen(depth, &suffix).unwrap();
            assert_eq!(&rebuilt, path);
        }

        assert_eq!(depths, vec![0, 0, 1, 1, 0]);
    }

    #[test]
    fn test_lengthen_rejects_depth_past_previous() {
        let mut longener = PathLongener::new();
        longener.lengthen(0, &["a".to_string()]).unwrap();
        let err = longener.lengthen(3, &[]).unwrap_err();
        assert_eq!(
            err,
            PathError::DepthOutOfRange {
                depth: 3,
                available: 1
            }
        );
    }
}
