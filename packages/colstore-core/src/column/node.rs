//! B-tree nodes of an adaptive column.

use crate::error::DbError;
use crate::packed::{bit_width, PackedArray};

/// One node of a column tree.
///
/// Leaves hold values. Inner nodes hold their children together with a
/// parallel array of cumulative element counts: `offsets[i]` is the number
/// of elements in `children[..=i]`.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf(PackedArray),
    Inner {
        children: Vec<Node>,
        offsets: PackedArray,
    },
}

/// Outcome of inserting into a node, reported to its parent.
#[derive(Debug)]
pub(crate) enum NodeChange {
    /// The node absorbed the element
    None,
    /// A new sibling must be linked directly before the node
    InsertBefore(Node),
    /// A new sibling must be linked directly after the node
    InsertAfter(Node),
    /// The node kept its lower half; the upper half goes directly after it
    Split(Node),
}

/// Buffers allocated for a node before an insert mutates anything.
///
/// Each node on the insert path gets one if it may have to produce a new
/// sibling, so that no allocation can fail halfway through a split.
#[derive(Debug)]
pub(crate) enum Spare {
    Leaf(PackedArray),
    Inner {
        children: Vec<Node>,
        offsets: PackedArray,
    },
}

pub(crate) fn corrupt(what: &str) -> DbError {
    DbError::DataCorruption(format!("column tree: {what}"))
}

pub(crate) fn reserve_nodes(count: usize) -> Result<Vec<Node>, DbError> {
    let mut nodes = Vec::new();
    nodes
        .try_reserve_exact(count)
        .map_err(|_| DbError::CapacityOverflow {
            operation: "column node allocation",
        })?;
    Ok(nodes)
}

impl Node {
    pub(crate) fn empty_leaf() -> Self {
        Node::Leaf(PackedArray::new())
    }

    /// Number of elements stored below this node.
    pub(crate) fn len(&self) -> usize {
        match self {
            Node::Leaf(values) => values.len(),
            Node::Inner { offsets, .. } => offsets.last().unwrap_or(0) as usize,
        }
    }

    /// Number of values (leaf) or children (inner node).
    pub(crate) fn fanout(&self) -> usize {
        match self {
            Node::Leaf(values) => values.len(),
            Node::Inner { children, .. } => children.len(),
        }
    }

    /// Walks `path` (child positions from this node downwards).
    pub(crate) fn descendant_mut(&mut self, path: &[usize]) -> Result<&mut Node, DbError> {
        let mut node = self;
        for &ndx in path {
            node = match node {
                Node::Inner { children, .. } => children
                    .get_mut(ndx)
                    .ok_or_else(|| corrupt("path leads past last child"))?,
                Node::Leaf(_) => return Err(corrupt("path descends below a leaf")),
            };
        }
        Ok(node)
    }
}

/// Element count before child `ndx`.
pub(crate) fn child_base(offsets: &PackedArray, ndx: usize) -> usize {
    if ndx == 0 {
        0
    } else {
        offsets.get(ndx - 1) as usize
    }
}

/// Child holding element `pos` and the position inside that child.
pub(crate) fn locate(offsets: &PackedArray, pos: usize) -> (usize, usize) {
    let ndx = offsets.upper_bound(pos as i64);
    (ndx, pos - child_base(offsets, ndx))
}

/// Child receiving an insert at `pos`; `pos == len` lands at the end of the last child.
pub(crate) fn locate_for_insert(offsets: &PackedArray, pos: usize) -> (usize, usize) {
    let ndx = offsets.upper_bound(pos as i64).min(offsets.len() - 1);
    (ndx, pos - child_base(offsets, ndx))
}

/// Recomputes `offsets[from..]` from the children's sizes.
///
/// Capacity and width must already be reserved for the result.
pub(crate) fn rebuild_offsets(
    children: &[Node],
    offsets: &mut PackedArray,
    from: usize,
) -> Result<(), DbError> {
    let mut total = child_base(offsets, from);
    offsets.truncate(from);
    for child in &children[from..] {
        total += child.len();
        offsets.push(total as i64)?;
    }
    Ok(())
}

/// Allocates what an insert of `value` at `local` may need inside `node`.
///
/// Widens and reserves in place (no logical change) and returns the spare
/// buffers for a possible new sibling.
pub(crate) fn prepare_insert(
    node: &mut Node,
    local: usize,
    value: i64,
    max: usize,
) -> Result<Option<Spare>, DbError> {
    match node {
        Node::Leaf(values) => {
            let len = values.len();
            let width = bit_width(value);
            if len < max {
                values.reserve(len + 1, width)?;
                return Ok(None);
            }
            if local == 0 || local == len {
                return Ok(Some(Spare::Leaf(PackedArray::with_capacity(1, width)?)));
            }
            let mid = len / 2;
            values.reserve(len, width)?;
            let upper = PackedArray::with_capacity(len - mid + 1, values.width().max(width))?;
            Ok(Some(Spare::Leaf(upper)))
        }
        Node::Inner { children, offsets } => {
            let total = offsets.last().unwrap_or(0) + 1;
            children
                .try_reserve(1)
                .map_err(|_| DbError::CapacityOverflow {
                    operation: "column node allocation",
                })?;
            offsets.reserve(children.len() + 1, bit_width(total))?;
            if children.len() < max {
                return Ok(None);
            }
            let upper_count = children.len() + 1 - (children.len() + 1) / 2;
            Ok(Some(Spare::Inner {
                children: reserve_nodes(upper_count)?,
                offsets: PackedArray::with_capacity(upper_count, bit_width(total))?,
            }))
        }
    }
}

/// Inserts `value` at `local` into a leaf, using `spare` if the leaf is full.
pub(crate) fn insert_into_leaf(
    node: &mut Node,
    local: usize,
    value: i64,
    max: usize,
    spare: Option<Spare>,
) -> Result<NodeChange, DbError> {
    let Node::Leaf(values) = node else {
        return Err(corrupt("insert path ends at an inner node"));
    };
    let len = values.len();
    if len < max {
        values.insert(local, value)?;
        return Ok(NodeChange::None);
    }
    let Some(Spare::Leaf(mut fresh)) = spare else {
        return Err(corrupt("full leaf without reserved sibling"));
    };
    if local == len {
        fresh.push(value)?;
        return Ok(NodeChange::InsertAfter(Node::Leaf(fresh)));
    }
    if local == 0 {
        fresh.push(value)?;
        return Ok(NodeChange::InsertBefore(Node::Leaf(fresh)));
    }

    let mid = len / 2;
    for ndx in mid..len {
        fresh.push(values.get(ndx))?;
    }
    values.truncate(mid);
    if local <= mid {
        values.insert(local, value)?;
    } else {
        fresh.insert(local - mid, value)?;
    }
    Ok(NodeChange::Split(Node::Leaf(fresh)))
}

/// Links the change reported by child `child` into an inner node.
pub(crate) fn absorb_change(
    node: &mut Node,
    child: usize,
    change: NodeChange,
    max: usize,
    spare: Option<Spare>,
) -> Result<NodeChange, DbError> {
    let Node::Inner { children, offsets } = node else {
        return Err(corrupt("parent on insert path is a leaf"));
    };
    match change {
        NodeChange::None => {
            offsets.adjust_from(child, 1)?;
            return Ok(NodeChange::None);
        }
        NodeChange::InsertBefore(sibling) => children.insert(child, sibling),
        NodeChange::InsertAfter(sibling) | NodeChange::Split(sibling) => {
            children.insert(child + 1, sibling)
        }
    }
    rebuild_offsets(children, offsets, child)?;
    if children.len() <= max {
        return Ok(NodeChange::None);
    }

    let Some(Spare::Inner {
        children: mut upper_children,
        offsets: mut upper_offsets,
    }) = spare
    else {
        return Err(corrupt("full inner node without reserved sibling"));
    };
    let mid = children.len() / 2;
    upper_children.extend(children.drain(mid..));
    offsets.truncate(mid);
    rebuild_offsets(&upper_children, &mut upper_offsets, 0)?;
    Ok(NodeChange::Split(Node::Inner {
        children: upper_children,
        offsets: upper_offsets,
    }))
}
