//! Adaptive integer column stored as a B-tree of packed arrays.
//!
//! Each column has:
//! - A root node that is either a single leaf or an inner node
//! - A per-column node capacity taken from `StoreConfig`
//! - An optional secondary index kept in sync with every mutation

use crate::config::StoreConfig;
use crate::error::DbError;
use crate::packed::{bit_width, PackedArray};

use super::index::ColumnIndex;
use super::node::{
    self, absorb_change, corrupt, insert_into_leaf, locate, locate_for_insert, prepare_insert,
    Node, NodeChange, Spare,
};

/// Ordered sequence of `i64` values addressed by position.
#[derive(Debug, Clone)]
pub struct Column {
    /// Root of the tree
    root: Node,
    /// Maximum leaf size and inner node fanout
    max_leaf_size: usize,
    /// Secondary index, present only after `build_index`
    index: Option<Box<ColumnIndex>>,
}

impl Column {
    /// Creates an empty column using the default configuration.
    pub fn new() -> Self {
        Self::with_leaf_size(StoreConfig::default().max_leaf_size)
    }

    /// Creates an empty column sized by `config`.
    ///
    /// # Returns
    /// `Result<Column, DbError>`; `InvalidConfig` if the configuration is rejected.
    pub fn with_config(config: &StoreConfig) -> Result<Self, DbError> {
        config.validate()?;
        Ok(Self::with_leaf_size(config.max_leaf_size))
    }

    /// Creates a column holding `values` in order.
    pub fn from_values(values: &[i64], config: &StoreConfig) -> Result<Self, DbError> {
        let mut column = Self::with_config(config)?;
        for &value in values {
            column.push(value)?;
        }
        Ok(column)
    }

    pub(crate) fn with_leaf_size(max_leaf_size: usize) -> Self {
        Self {
            root: Node::empty_leaf(),
            max_leaf_size,
            index: None,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns `true` if the column holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum leaf size / inner node fanout.
    pub fn max_leaf_size(&self) -> usize {
        self.max_leaf_size
    }

    /// Returns the element at `pos`.
    ///
    /// # Returns
    /// `Result<i64, DbError>`; `OutOfRange` if `pos >= len()`.
    pub fn get(&self, pos: usize) -> Result<i64, DbError> {
        self.check_pos(pos, self.len())?;
        let (leaf, local) = self.leaf_for(pos);
        Ok(leaf.get(local))
    }

    /// Overwrites the element at `pos`.
    ///
    /// A value wider than the leaf's current width re-encodes that leaf only;
    /// size and tree shape never change.
    pub fn set(&mut self, pos: usize, value: i64) -> Result<(), DbError> {
        self.check_pos(pos, self.len())?;
        let old = self.get(pos)?;
        self.tree_set(pos, value)?;
        if let Err(e) = self.update_index(|index| index.on_set(pos, old, value)) {
            self.tree_set(pos, old)?;
            self.restore_index();
            return Err(e);
        }
        Ok(())
    }

    /// Inserts `value` at `pos`, shifting elements at `>= pos` up by one.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `OutOfRange` if `pos > len()`, `CapacityOverflow`
    /// if a node or index entry could not be allocated (the column is left
    /// unchanged).
    pub fn insert(&mut self, pos: usize, value: i64) -> Result<(), DbError> {
        self.check_pos(pos, self.len() + 1)?;
        self.tree_insert(pos, value)?;
        if let Err(e) = self.update_index(|index| index.on_insert(pos, value)) {
            self.tree_erase(pos)?;
            self.restore_index();
            return Err(e);
        }
        Ok(())
    }

    /// Appends `value`.
    pub fn push(&mut self, value: i64) -> Result<(), DbError> {
        self.insert(self.len(), value)
    }

    /// Removes the element at `pos`, shifting later elements down by one.
    ///
    /// # Returns
    /// `Result<i64, DbError>` containing the removed value.
    pub fn erase(&mut self, pos: usize) -> Result<i64, DbError> {
        self.check_pos(pos, self.len())?;
        let removed = self.tree_erase(pos)?;
        if let Err(e) = self.update_index(|index| index.on_erase(pos, removed)) {
            self.tree_insert(pos, removed)?;
            self.restore_index();
            return Err(e);
        }
        Ok(removed)
    }

    /// Removes every element. An existing index is kept, emptied.
    pub fn clear(&mut self) {
        self.root = Node::empty_leaf();
        if let Some(index) = self.index.as_mut() {
            index.clear();
        }
    }

    /// Adds `delta` to every element in `[start, end)`.
    ///
    /// Elements are updated in order; on failure the ones before the failing
    /// position keep their new values.
    pub fn increment(&mut self, delta: i64, start: usize, end: usize) -> Result<(), DbError> {
        self.check_range(start, end)?;
        for pos in start..end {
            let value = self
                .get(pos)?
                .checked_add(delta)
                .ok_or(DbError::CapacityOverflow {
                    operation: "column increment",
                })?;
            self.set(pos, value)?;
        }
        Ok(())
    }

    /// Returns the lowest position holding `value`.
    pub fn find(&self, value: i64) -> Result<Option<usize>, DbError> {
        self.find_in(value, 0, self.len())
    }

    /// Returns the lowest position in `[start, end)` holding `value`.
    ///
    /// Uses the secondary index when one is built, otherwise scans leaves.
    pub fn find_in(&self, value: i64, start: usize, end: usize) -> Result<Option<usize>, DbError> {
        self.check_range(start, end)?;
        if let Some(index) = &self.index {
            let found = index.find_first(value, start, end)?;
            if let Some(pos) = found {
                if self.get(pos)? != value {
                    return Err(corrupt("index entry does not match column value"));
                }
            }
            return Ok(found);
        }

        let mut base = 0;
        for leaf in self.leaves() {
            let leaf_end = base + leaf.len();
            if leaf_end > start && base < end {
                let from = start.saturating_sub(base);
                let to = end.min(leaf_end) - base;
                if let Some(local) = leaf.find(value, from, to) {
                    return Ok(Some(base + local));
                }
            }
            if leaf_end >= end {
                break;
            }
            base = leaf_end;
        }
        Ok(None)
    }

    /// Returns every position holding `value`, ascending.
    pub fn find_all(&self, value: i64) -> Result<Vec<usize>, DbError> {
        if let Some(index) = &self.index {
            return index.find_all_in(value, 0, self.len());
        }
        let mut found = Vec::new();
        let mut base = 0;
        for leaf in self.leaves() {
            let mut from = 0;
            while let Some(local) = leaf.find(value, from, leaf.len()) {
                found.push(base + local);
                from = local + 1;
            }
            base += leaf.len();
        }
        Ok(found)
    }

    /// Builds (or rebuilds) the secondary index from the current contents.
    pub fn build_index(&mut self) -> Result<(), DbError> {
        let index = ColumnIndex::build(self.iter(), self.max_leaf_size)?;
        tracing::debug!(entries = index.len(), "built column index");
        self.index = Some(Box::new(index));
        Ok(())
    }

    /// Discards the secondary index.
    pub fn clear_index(&mut self) {
        if self.index.take().is_some() {
            tracing::debug!("cleared column index");
        }
    }

    /// Returns `true` if a secondary index is present.
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Returns the secondary index, if built.
    pub fn index(&self) -> Option<&ColumnIndex> {
        self.index.as_deref()
    }

    /// Number of levels in the tree; a single leaf has height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while let Node::Inner { children, .. } = node {
            height += 1;
            match children.first() {
                Some(child) => node = child,
                None => break,
            }
        }
        height
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Bytes used by packed leaves and offset arrays.
    pub fn byte_size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(values) => total += values.byte_size(),
                Node::Inner { children, offsets } => {
                    total += offsets.byte_size();
                    stack.extend(children.iter());
                }
            }
        }
        total
    }

    /// Iterates over all elements in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.leaves().into_iter().flat_map(|leaf| leaf.iter())
    }

    /// Copies all elements into a vector.
    pub fn to_vec(&self) -> Vec<i64> {
        self.iter().collect()
    }

    /// Checks every structural invariant of the tree and its index.
    ///
    /// # Returns
    /// `Result<(), DbError>` with `DataCorruption` describing the first violation.
    pub fn verify(&self) -> Result<(), DbError> {
        if let Node::Inner { children, .. } = &self.root {
            if children.len() < 2 {
                return Err(corrupt("inner root with fewer than two children"));
            }
        }

        let mut leaf_depth = None;
        let mut stack = vec![(&self.root, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            match node {
                Node::Leaf(values) => {
                    if values.len() > self.max_leaf_size {
                        return Err(corrupt("leaf exceeds maximum size"));
                    }
                    if depth > 1 && values.is_empty() {
                        return Err(corrupt("empty non-root leaf"));
                    }
                    match leaf_depth {
                        None => leaf_depth = Some(depth),
                        Some(d) if d != depth => {
                            return Err(corrupt("leaves at different depths"));
                        }
                        Some(_) => {}
                    }
                }
                Node::Inner { children, offsets } => {
                    if children.is_empty() || children.len() > self.max_leaf_size {
                        return Err(corrupt("inner node fanout out of bounds"));
                    }
                    if children.len() != offsets.len() {
                        return Err(corrupt("offsets and children differ in length"));
                    }
                    let mut total = 0i64;
                    for (ndx, child) in children.iter().enumerate() {
                        if child.len() == 0 {
                            return Err(corrupt("empty child below inner node"));
                        }
                        total += child.len() as i64;
                        if offsets.get(ndx) != total {
                            return Err(corrupt("cumulative offset mismatch"));
                        }
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        if let Some(index) = &self.index {
            index.verify_against(self)?;
        }
        Ok(())
    }

    /// Replaces every element `v` by `map(v)`.
    ///
    /// Positions and tree shape are untouched and the index is not
    /// consulted; used on unindexed bookkeeping columns to renumber row
    /// references. Leaves are widened for the new values before any element
    /// is rewritten, so a failed allocation changes no value.
    pub(crate) fn remap_values<F>(&mut self, map: F) -> Result<(), DbError>
    where
        F: Fn(i64) -> i64,
    {
        for leaf in self.leaves_mut() {
            let width = leaf.iter().map(|v| bit_width(map(v))).max().unwrap_or(0);
            leaf.reserve(leaf.len(), width)?;
        }
        for leaf in self.leaves_mut() {
            for ndx in 0..leaf.len() {
                let value = leaf.get(ndx);
                let mapped = map(value);
                if mapped != value {
                    leaf.set(ndx, mapped)?;
                }
            }
        }
        Ok(())
    }

    /// Makes the next index update fail, for rollback tests.
    #[cfg(test)]
    pub(crate) fn fail_index_updates(&mut self) {
        if let Some(index) = self.index.as_mut() {
            index.fail_updates();
        }
    }

    fn check_pos(&self, pos: usize, bound: usize) -> Result<(), DbError> {
        if pos >= bound {
            return Err(DbError::OutOfRange {
                index: pos,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), DbError> {
        let len = self.len();
        if end > len {
            return Err(DbError::OutOfRange { index: end, len });
        }
        if start > end {
            return Err(DbError::OutOfRange { index: start, len });
        }
        Ok(())
    }

    fn update_index<F>(&mut self, update: F) -> Result<(), DbError>
    where
        F: FnOnce(&mut ColumnIndex) -> Result<(), DbError>,
    {
        match self.index.as_mut() {
            Some(index) => update(index),
            None => Ok(()),
        }
    }

    /// Rebuilds the index after a failed update was rolled back in the tree.
    ///
    /// An index that cannot be rebuilt is dropped.
    fn restore_index(&mut self) {
        if self.index.is_none() {
            return;
        }
        if let Err(e) = self.build_index() {
            tracing::warn!(error = %e, "dropping column index that could not be rebuilt");
            self.index = None;
        }
    }

    fn tree_set(&mut self, pos: usize, value: i64) -> Result<(), DbError> {
        let mut node = &mut self.root;
        let mut local = pos;
        loop {
            match node {
                Node::Inner { children, offsets } => {
                    let (child, child_pos) = locate(offsets, local);
                    local = child_pos;
                    node = &mut children[child];
                }
                Node::Leaf(values) => return values.set(local, value),
            }
        }
    }

    fn leaf_for(&self, pos: usize) -> (&PackedArray, usize) {
        let mut node = &self.root;
        let mut local = pos;
        loop {
            match node {
                Node::Leaf(values) => return (values, local),
                Node::Inner { children, offsets } => {
                    let (child, child_pos) = locate(offsets, local);
                    local = child_pos;
                    node = &children[child];
                }
            }
        }
    }

    fn leaves(&self) -> Vec<&PackedArray> {
        let mut leaves = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(values) => leaves.push(values),
                Node::Inner { children, .. } => stack.extend(children.iter().rev()),
            }
        }
        leaves
    }

    fn leaves_mut(&mut self) -> Vec<&mut PackedArray> {
        let mut leaves = Vec::new();
        let mut stack = vec![&mut self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(values) => leaves.push(values),
                Node::Inner { children, .. } => stack.extend(children.iter_mut().rev()),
            }
        }
        leaves
    }

    /// Root-to-leaf child positions for an insert at `pos`, and the position in the leaf.
    fn insert_path(&self, pos: usize) -> (Vec<usize>, usize) {
        let mut path = Vec::new();
        let mut node = &self.root;
        let mut local = pos;
        while let Node::Inner { children, offsets } = node {
            let (child, child_pos) = locate_for_insert(offsets, local);
            path.push(child);
            local = child_pos;
            node = &children[child];
        }
        (path, local)
    }

    fn tree_insert(&mut self, pos: usize, value: i64) -> Result<(), DbError> {
        let (path, local) = self.insert_path(pos);
        let max = self.max_leaf_size;

        // Allocate everything a cascade of splits could need before
        // the first node is modified.
        let root_spare = if self.root.fanout() >= max {
            let total = self.len() as i64 + 1;
            Some((
                node::reserve_nodes(2)?,
                PackedArray::with_capacity(2, bit_width(total))?,
            ))
        } else {
            None
        };
        let mut spares: Vec<Option<Spare>> = Vec::with_capacity(path.len() + 1);
        for depth in 0..path.len() {
            let inner = self.root.descendant_mut(&path[..depth])?;
            spares.push(prepare_insert(inner, 0, value, max)?);
        }
        let leaf = self.root.descendant_mut(&path)?;
        let leaf_spare = prepare_insert(leaf, local, value, max)?;

        let mut change = insert_into_leaf(leaf, local, value, max, leaf_spare)?;
        for depth in (0..path.len()).rev() {
            let parent = self.root.descendant_mut(&path[..depth])?;
            let spare = spares.pop().flatten();
            change = absorb_change(parent, path[depth], change, max, spare)?;
        }

        let (sibling, before) = match change {
            NodeChange::None => return Ok(()),
            NodeChange::InsertBefore(sibling) => (sibling, true),
            NodeChange::InsertAfter(sibling) | NodeChange::Split(sibling) => (sibling, false),
        };
        let Some((mut children, mut offsets)) = root_spare else {
            return Err(corrupt("root split without reserved root"));
        };
        let old_root = std::mem::replace(&mut self.root, Node::empty_leaf());
        if before {
            children.push(sibling);
            children.push(old_root);
        } else {
            children.push(old_root);
            children.push(sibling);
        }
        node::rebuild_offsets(&children, &mut offsets, 0)?;
        self.root = Node::Inner { children, offsets };
        tracing::trace!(height = self.height(), len = self.len(), "column root split");
        Ok(())
    }

    fn tree_erase(&mut self, pos: usize) -> Result<i64, DbError> {
        let mut path = Vec::new();
        let mut node = &self.root;
        let mut local = pos;
        while let Node::Inner { children, offsets } = node {
            let (child, child_pos) = locate(offsets, local);
            path.push(child);
            local = child_pos;
            node = &children[child];
        }

        let removed;
        let mut emptied = match self.root.descendant_mut(&path)? {
            Node::Leaf(values) => {
                removed = values.get(local);
                values.erase(local)?;
                values.is_empty()
            }
            Node::Inner { .. } => return Err(corrupt("erase path ends at an inner node")),
        };

        for depth in (0..path.len()).rev() {
            let child = path[depth];
            let Node::Inner { children, offsets } = self.root.descendant_mut(&path[..depth])?
            else {
                return Err(corrupt("parent on erase path is a leaf"));
            };
            if emptied && children.len() > 1 {
                children.remove(child);
                offsets.erase(child)?;
                offsets.adjust_from(child, -1)?;
                emptied = false;
            } else {
                offsets.adjust_from(child, -1)?;
            }
        }

        let before = self.height();
        while let Node::Inner { children, .. } = &mut self.root {
            if children.len() != 1 {
                break;
            }
            let only = children.pop().unwrap_or_else(Node::empty_leaf);
            self.root = only;
        }
        if self.root.len() == 0 {
            self.root = Node::empty_leaf();
        }
        if self.height() != before {
            tracing::trace!(height = self.height(), len = self.len(), "column root collapsed");
        }
        Ok(removed)
    }
}

impl Default for Column {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Column {}
