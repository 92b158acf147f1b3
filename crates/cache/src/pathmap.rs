//! Path-indexed trie with optional payloads
//!
//! Elements live in an arena and are addressed by `ElementId`. An element
//! without a payload is an intermediate position that only exists so a
//! cached descendant can be reached by prefix.

use ahash::AHashMap;
use pathcache_core::{Name, Path, PathElement};
use smallvec::SmallVec;
use std::fmt::Write as _;

/// Handle to an element of a `PathMap`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// One trie position
struct Element<T> {
    /// `None` only for the root
    name: Option<Name>,
    /// Normalized 1-based same-name-sibling index
    index: u32,
    parent: Option<ElementId>,
    /// Children grouped by name, each group sorted by index
    children: AHashMap<Name, SmallVec<[ElementId; 2]>>,
    children_count: usize,
    payload: Option<T>,
}

impl<T> Element<T> {
    fn new(name: Option<Name>, index: u32, parent: Option<ElementId>) -> Self {
        Self {
            name,
            index,
            parent,
            children: AHashMap::new(),
            children_count: 0,
            payload: None,
        }
    }
}

/// Generic path trie
pub struct PathMap<T> {
    slots: Vec<Option<Element<T>>>,
    free: Vec<u32>,
    root: ElementId,
    live: usize,
}

impl<T> PathMap<T> {
    /// Create a trie containing only the root element
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Element::new(None, 1, None))],
            free: Vec::new(),
            root: ElementId(0),
            live: 1,
        }
    }

    /// The root element, always present
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Number of live elements, including the root
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if only the root is present
    pub fn is_empty(&self) -> bool {
        self.live == 1
    }

    /// Check if a handle refers to a live element
    pub fn contains(&self, id: ElementId) -> bool {
        matches!(self.slots.get(id.slot()), Some(Some(_)))
    }

    fn el(&self, id: ElementId) -> &Element<T> {
        match self.slots.get(id.slot()) {
            Some(Some(element)) => element,
            _ => panic!("stale path map element {:?}", id),
        }
    }

    fn el_mut(&mut self, id: ElementId) -> &mut Element<T> {
        match self.slots.get_mut(id.slot()) {
            Some(Some(element)) => element,
            _ => panic!("stale path map element {:?}", id),
        }
    }

    fn alloc(&mut self, element: Element<T>) -> ElementId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(element);
                ElementId(slot)
            }
            None => {
                self.slots.push(Some(element));
                ElementId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Payload attached to an element
    pub fn get(&self, id: ElementId) -> Option<&T> {
        self.el(id).payload.as_ref()
    }

    /// Attach a payload, returning the previous one
    pub fn set(&mut self, id: ElementId, payload: T) -> Option<T> {
        self.el_mut(id).payload.replace(payload)
    }

    /// Detach and return the payload of an element
    pub fn take(&mut self, id: ElementId) -> Option<T> {
        self.el_mut(id).payload.take()
    }

    /// Parent element, `None` for the root and detached elements
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.el(id).parent
    }

    /// Path element of a position, `None` for the root
    pub fn path_element(&self, id: ElementId) -> Option<PathElement> {
        let element = self.el(id);
        element
            .name
            .as_ref()
            .map(|name| PathElement::new(name.clone(), element.index))
    }

    /// Number of direct children, cached or intermediate
    pub fn children_count(&self, id: ElementId) -> usize {
        self.el(id).children_count
    }

    /// Snapshot of the direct children, ordered by name then index
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        let element = self.el(id);
        let mut names: Vec<&Name> = element.children.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| element.children[name].iter().copied())
            .collect()
    }

    /// Direct child at `name[index]`
    pub fn child(&self, parent: ElementId, element: &PathElement) -> Option<ElementId> {
        self.el(parent)
            .children
            .get(element.name())?
            .iter()
            .copied()
            .find(|&c| self.el(c).index == element.index())
    }

    /// Walk `path` from the root
    ///
    /// With `exact`, only a full match is returned; otherwise the deepest
    /// element reached (at least the root).
    pub fn map(&self, path: &Path, exact: bool) -> Option<ElementId> {
        let mut current = self.root;
        for element in path.elements() {
            match self.child(current, element) {
                Some(next) => current = next,
                None if exact => return None,
                None => break,
            }
        }
        Some(current)
    }

    /// Create every missing element along `path` and return the last one
    pub fn put(&mut self, path: &Path) -> ElementId {
        let mut current = self.root;
        for element in path.elements() {
            current = match self.child(current, element) {
                Some(next) => next,
                None => {
                    let child = self.alloc(Element::new(
                        Some(element.name().clone()),
                        element.index(),
                        Some(current),
                    ));
                    self.link(current, child);
                    child
                }
            };
        }
        current
    }

    /// Hook a parentless element under `parent` at `element`
    ///
    /// Returns the element previously occupying that slot, now detached.
    pub fn graft(
        &mut self,
        parent: ElementId,
        element: &PathElement,
        child: ElementId,
    ) -> Option<ElementId> {
        debug_assert!(self.el(child).parent.is_none(), "graft of an attached element");
        let displaced = self.child(parent, element);
        if let Some(displaced) = displaced {
            self.unlink(displaced, false);
        }
        {
            let node = self.el_mut(child);
            node.name = Some(element.name().clone());
            node.index = element.index();
            node.parent = Some(parent);
        }
        self.link(parent, child);
        displaced
    }

    fn link(&mut self, parent: ElementId, child: ElementId) {
        let (name, index) = {
            let node = self.el(child);
            (node.name.clone(), node.index)
        };
        let Some(name) = name else {
            return;
        };
        let mut siblings = self.el_mut(parent).children.remove(&name).unwrap_or_default();
        let pos = siblings
            .iter()
            .position(|&s| self.el(s).index > index)
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        let node = self.el_mut(parent);
        node.children.insert(name, siblings);
        node.children_count += 1;
    }

    /// Unlink an element from its parent without freeing it
    ///
    /// With `shift`, later same-name siblings move down by one index.
    fn unlink(&mut self, id: ElementId, shift: bool) {
        let (parent, name, index) = {
            let node = self.el(id);
            match (node.parent, node.name.clone()) {
                (Some(parent), Some(name)) => (parent, name, node.index),
                _ => return,
            }
        };
        let mut siblings = self.el_mut(parent).children.remove(&name).unwrap_or_default();
        siblings.retain(|s| *s != id);
        if shift {
            for &s in &siblings {
                let sibling = self.el_mut(s);
                if sibling.index > index {
                    sibling.index -= 1;
                }
            }
        }
        let node = self.el_mut(parent);
        node.children_count -= 1;
        if !siblings.is_empty() {
            node.children.insert(name, siblings);
        }
        self.el_mut(id).parent = None;
    }

    /// Detach an element (and its subtree) from the trie without freeing it
    ///
    /// Intermediate ancestors left without children are pruned.
    pub fn detach(&mut self, id: ElementId, shift: bool) {
        let parent = self.el(id).parent;
        self.unlink(id, shift);
        if let Some(parent) = parent {
            self.prune(parent);
        }
    }

    /// Remove an element and its whole subtree
    ///
    /// Removing the root clears all children and the root payload instead.
    pub fn remove(&mut self, id: ElementId, shift: bool) {
        if id == self.root {
            for child in self.children(id) {
                self.free_subtree(child);
            }
            let root = self.el_mut(id);
            root.children.clear();
            root.children_count = 0;
            root.payload = None;
            return;
        }
        self.detach(id, shift);
        self.free_subtree(id);
    }

    /// Remove the child `element` of `parent`
    ///
    /// The index shift is applied to later siblings even when the child
    /// itself is not present.
    pub fn remove_child(&mut self, parent: ElementId, element: &PathElement, shift: bool) -> bool {
        if let Some(child) = self.child(parent, element) {
            self.remove(child, shift);
            return true;
        }
        if shift {
            let siblings = self
                .el(parent)
                .children
                .get(element.name())
                .cloned()
                .unwrap_or_default();
            for s in siblings {
                let sibling = self.el_mut(s);
                if sibling.index > element.index() {
                    sibling.index -= 1;
                }
            }
        }
        false
    }

    /// Make room for a new child at `element`: siblings at or after its
    /// index move up by one
    pub fn insert(&mut self, parent: ElementId, element: &PathElement) {
        let siblings = self
            .el(parent)
            .children
            .get(element.name())
            .cloned()
            .unwrap_or_default();
        for s in siblings {
            let sibling = self.el_mut(s);
            if sibling.index >= element.index() {
                sibling.index += 1;
            }
        }
    }

    /// Rename and reorder the children of `parent`
    ///
    /// Children not listed in `order` keep their current position.
    pub fn set_children(&mut self, parent: ElementId, order: Vec<(PathElement, ElementId)>) {
        let current = self.children(parent);
        {
            let node = self.el_mut(parent);
            node.children.clear();
            node.children_count = 0;
        }
        let listed: Vec<ElementId> = order.iter().map(|(_, id)| *id).collect();
        for (element, child) in order {
            let node = self.el_mut(child);
            node.name = Some(element.name().clone());
            node.index = element.index();
            self.link(parent, child);
        }
        for child in current.into_iter().filter(|c| !listed.contains(c)) {
            self.link(parent, child);
        }
    }

    /// Path of an attached element; `None` if it is detached from the root
    pub fn path(&self, id: ElementId) -> Option<Path> {
        let mut elements = Vec::new();
        let mut current = id;
        while current != self.root {
            let node = self.el(current);
            elements.push(PathElement::new(node.name.clone()?, node.index));
            current = node.parent?;
        }
        elements.reverse();
        Some(Path::from_elements(elements))
    }

    /// Check if the element denotes exactly `path`
    pub fn has_path(&self, id: ElementId, path: &Path) -> bool {
        let mut current = id;
        for element in path.elements().iter().rev() {
            let node = self.el(current);
            match (&node.name, node.parent) {
                (Some(name), Some(parent)) if name == element.name() && node.index == element.index() => {
                    current = parent;
                }
                _ => return false,
            }
        }
        current == self.root
    }

    /// Number of ancestors between the element and the root
    pub fn depth(&self, id: ElementId) -> usize {
        let mut depth = 0;
        let mut current = self.el(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.el(parent).parent;
        }
        depth
    }

    /// Check if `ancestor` is a proper ancestor of `id`
    pub fn is_ancestor_of(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut current = self.el(id).parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.el(parent).parent;
        }
        false
    }

    /// Pre-order traversal of the subtree rooted at `from`
    ///
    /// With `include_empty` false, only elements carrying a payload are
    /// yielded. The iterator borrows the trie, so it cannot outlive a
    /// mutation.
    pub fn traverse(&self, from: ElementId, include_empty: bool) -> Traverse<'_, T> {
        Traverse {
            map: self,
            stack: vec![from],
            include_empty,
        }
    }

    /// Render the trie, one element per line
    pub fn dump_with(&self, mut payload: impl FnMut(&T) -> String) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.el(id);
            let label = match self.path_element(id) {
                Some(element) => element.to_string(),
                None => "/".to_string(),
            };
            let _ = write!(out, "{:indent$}{}", "", label, indent = depth * 2);
            if let Some(value) = &node.payload {
                let _ = write!(out, " -> {}", payload(value));
            }
            out.push('\n');
            for child in self.children(id).into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Drop prunable intermediate ancestors starting at `id`
    fn prune(&mut self, id: ElementId) {
        let mut current = id;
        while current != self.root {
            let node = self.el(current);
            if node.payload.is_some() || node.children_count > 0 {
                return;
            }
            let Some(parent) = node.parent else {
                return;
            };
            // Pruning forgets a position, it does not remove a node
            self.unlink(current, false);
            self.free_subtree(current);
            current = parent;
        }
    }

    fn free_subtree(&mut self, id: ElementId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slots.get_mut(current.slot()).and_then(Option::take) {
                stack.extend(node.children.values().flatten().copied());
                self.free.push(current.0);
                self.live -= 1;
            }
        }
    }
}

impl<T> Default for PathMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`PathMap::traverse`]
pub struct Traverse<'a, T> {
    map: &'a PathMap<T>,
    stack: Vec<ElementId>,
    include_empty: bool,
}

impl<'a, T> Iterator for Traverse<'a, T> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        while let Some(id) = self.stack.pop() {
            let children = self.map.children(id);
            self.stack.extend(children.into_iter().rev());
            if self.include_empty || self.map.get(id).is_some() {
                return Some(id);
            }
        }
        None
    }
}
