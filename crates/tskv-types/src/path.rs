//! Hierarchical addressing.
//!
//! An [`AddressPath`] is the hierarchy under which an entity is versioned.
//! It always holds at least one segment; the "no hierarchy" case is modelled
//! as `Option::<AddressPath>::None`, which stores the entity at its bare key.

use std::fmt;

use crate::error::{TypeError, TypeResult};

/// Ordered, immutable chain of non-empty path segments.
///
/// ```
/// use tskv_types::AddressPath;
///
/// let path = AddressPath::new(["workspace", "staging"]).unwrap().unwrap();
/// assert_eq!(path.path(), "workspace/staging");
/// assert!(AddressPath::new(Vec::<String>::new()).unwrap().is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddressPath {
    segments: Vec<String>,
}

impl AddressPath {
    /// Build a path from its segments.
    ///
    /// Returns `Ok(None)` for zero segments. Segments must be non-empty and
    /// must not contain `/`.
    pub fn new<I, S>(segments: I) -> TypeResult<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Ok(None);
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Some(Self { segments }))
    }

    /// Parse a slash-separated path. Empty pieces are skipped, so `""` and
    /// `"/"` both parse to `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Render the chain as `segment[0]/segment[1]/.../segment[n-1]`.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (always at least one).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// First segment of the chain.
    pub fn name(&self) -> &str {
        &self.segments[0]
    }

    /// The chain below the first segment, if any.
    pub fn child(&self) -> Option<Self> {
        if self.segments.len() > 1 {
            Some(Self {
                segments: self.segments[1..].to_vec(),
            })
        } else {
            None
        }
    }

    /// Physical key of `leaf` directly under this path.
    pub fn join(&self, leaf: &str) -> String {
        join(&self.path(), leaf)
    }
}

impl fmt::Display for AddressPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Join two key fragments with a single `/`.
///
/// Redundant slashes at the seam are collapsed and an empty side yields the
/// other side unchanged.
pub fn join(parent: &str, leaf: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let leaf = leaf.trim_start_matches('/');
    match (parent.is_empty(), leaf.is_empty()) {
        (true, _) => leaf.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}/{leaf}"),
    }
}

fn validate_segment(segment: &str) -> TypeResult<()> {
    if segment.is_empty() {
        return Err(TypeError::InvalidSegment {
            segment: segment.to_string(),
            reason: "segment must not be empty",
        });
    }
    if segment.contains('/') {
        return Err(TypeError::InvalidSegment {
            segment: segment.to_string(),
            reason: "segment must not contain '/'",
        });
    }
    Ok(())
}
