//! Hierarchical path syntax
//!
//! Paths are absolute and made of elements `name[index]`, where the index is
//! the 1-based same-name-sibling position. An index of 1 is omitted when
//! formatting, so `/a/b[1]` and `/a/b` denote the same path.

use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A single path segment name
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    /// Create a name, rejecting empty names and reserved characters
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::MalformedPath("empty name".to_string()));
        }
        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '[' | ']')) {
            return Err(Error::MalformedPath(format!(
                "invalid character {:?} in name {:?}",
                c, name
            )));
        }
        Ok(Self(Arc::from(name)))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One path segment: a name plus its same-name-sibling index
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathElement {
    name: Name,
    index: u32,
}

impl PathElement {
    /// Create an element; an index of 0 is normalized to 1
    pub fn new(name: Name, index: u32) -> Self {
        Self {
            name,
            index: index.max(1),
        }
    }

    /// Element with the default index
    pub fn named(name: Name) -> Self {
        Self::new(name, 1)
    }

    /// Name of this element
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Normalized 1-based index
    pub fn index(&self) -> u32 {
        self.index
    }

    fn parse(segment: &str) -> Result<Self> {
        let (name, index) = match segment.find('[') {
            Some(open) => {
                let rest = &segment[open + 1..];
                let digits = rest.strip_suffix(']').ok_or_else(|| {
                    Error::MalformedPath(format!("unterminated index in {:?}", segment))
                })?;
                let index: u32 = digits.parse().map_err(|_| {
                    Error::MalformedPath(format!("invalid index in {:?}", segment))
                })?;
                if index == 0 {
                    return Err(Error::MalformedPath(format!(
                        "index must be 1-based in {:?}",
                        segment
                    )));
                }
                (&segment[..open], index)
            }
            None => (segment, 1),
        };
        Ok(Self::new(Name::new(name)?, index))
    }
}

impl fmt::Debug for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// An absolute path; the root path has no elements
///
/// Uses SmallVec so that typical repository depths stay on the stack
#[derive(Clone, Hash, PartialEq, Eq, Default)]
pub struct Path {
    elements: SmallVec<[PathElement; 8]>,
}

impl Path {
    /// The root path `/`
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its elements
    pub fn from_elements(elements: impl IntoIterator<Item = PathElement>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    /// Parse an absolute path such as `/a/b[2]/c`
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::MalformedPath(format!("path {:?} is not absolute", s)))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let elements = rest
            .split('/')
            .map(PathElement::parse)
            .collect::<Result<SmallVec<_>>>()?;
        Ok(Self { elements })
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of elements (root has depth 0)
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// All elements from the root down
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Last element, `None` for the root
    pub fn name_element(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].iter().cloned().collect(),
        })
    }

    /// Path of a child of this path
    pub fn child(&self, name: Name, index: u32) -> Path {
        let mut elements = self.elements.clone();
        elements.push(PathElement::new(name, index));
        Self { elements }
    }

    /// Check if `self` is a proper ancestor of `other`
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.depth() < other.depth() && other.elements.starts_with(&self.elements)
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for element in &self.elements {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}
