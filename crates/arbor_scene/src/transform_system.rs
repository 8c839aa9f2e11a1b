//! Transform System
//!
//! World-matrix propagation over the node arena, decoupled from [`Scene`](crate::Scene)
//! so it only borrows the node `SlotMap` and a list of roots.
//!
//! # Update rule
//!
//! Pre-order from each root:
//! 1. if `matrix_auto_update`, rebuild the local matrix from TRS (a change marks
//!    the world matrix stale);
//! 2. if the world matrix is stale or the pass is forced, recompute it as
//!    `parent.world * local` (just `local` for roots), clear the flag and force
//!    the children;
//! 3. continue into the children.
//!
//! A second pass with no mutation in between recomputes nothing.

use arbor_core::errors::{ArborError, Result};
use glam::Mat4;
use slotmap::SlotMap;

use crate::NodeHandle;
use crate::node::Node;

/// Updates the world matrices of the whole hierarchy below `roots`.
///
/// Uses an explicit stack instead of recursion, so deep hierarchies cannot
/// overflow the call stack.
pub fn update_hierarchy_iterative(nodes: &mut SlotMap<NodeHandle, Node>, roots: &[NodeHandle]) {
    // Work stack: (node handle, parent world matrix, force)
    let mut stack: Vec<(NodeHandle, Option<Mat4>, bool)> = Vec::with_capacity(64);

    for &root_handle in roots.iter().rev() {
        stack.push((root_handle, None, false));
    }

    drain(nodes, &mut stack);
}

/// Updates the subtree rooted at `root_handle`, composing with the current
/// world matrix of its real parent. The root itself is always recomputed.
pub fn update_subtree(nodes: &mut SlotMap<NodeHandle, Node>, root_handle: NodeHandle) {
    let Some(node) = nodes.get(root_handle) else {
        return;
    };
    let parent_world = node
        .parent
        .and_then(|p| nodes.get(p))
        .map(|p| p.transform.world_matrix);

    let mut stack = vec![(root_handle, parent_world, true)];
    drain(nodes, &mut stack);
}

/// Recomputes the world matrix of a single node unconditionally.
///
/// With `update_parents`, every ancestor is refreshed first (root to leaf);
/// with `update_children`, the whole subtree below is forced afterwards.
pub fn update_world_matrix(
    nodes: &mut SlotMap<NodeHandle, Node>,
    handle: NodeHandle,
    update_parents: bool,
    update_children: bool,
) -> Result<()> {
    let Some(node) = nodes.get(handle) else {
        return Err(ArborError::NodeNotFound(format!("{handle:?}")));
    };

    if update_parents {
        let mut chain = Vec::new();
        let mut current = node.parent;
        while let Some(h) = current {
            chain.push(h);
            current = nodes.get(h).and_then(|n| n.parent);
        }
        for &ancestor in chain.iter().rev() {
            refresh_node(nodes, ancestor);
        }
    }

    let world = refresh_node(nodes, handle);

    if update_children {
        let children = nodes
            .get(handle)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        let mut stack: Vec<(NodeHandle, Option<Mat4>, bool)> = children
            .into_iter()
            .rev()
            .map(|child| (child, world, true))
            .collect();
        drain(nodes, &mut stack);
    }

    Ok(())
}

/// Rebuilds one node from its parent's current world matrix. Returns the new
/// world matrix.
fn refresh_node(nodes: &mut SlotMap<NodeHandle, Node>, handle: NodeHandle) -> Option<Mat4> {
    let parent_world = nodes
        .get(handle)?
        .parent
        .and_then(|p| nodes.get(p))
        .map(|p| p.transform.world_matrix);

    let node = nodes.get_mut(handle)?;
    if node.transform.matrix_auto_update {
        node.transform.update_local_matrix();
    }
    let world = compose_world(parent_world, node.transform.local_matrix);
    node.transform.set_world_matrix(world);
    Some(world)
}

#[inline]
fn compose_world(parent_world: Option<Mat4>, local: Mat4) -> Mat4 {
    match parent_world {
        Some(parent) => parent * local,
        None => local,
    }
}

fn drain(nodes: &mut SlotMap<NodeHandle, Node>, stack: &mut Vec<(NodeHandle, Option<Mat4>, bool)>) {
    while let Some((node_handle, parent_world, force)) = stack.pop() {
        let Some(node) = nodes.get_mut(node_handle) else {
            continue;
        };

        // 1. Local matrix
        if node.transform.matrix_auto_update {
            node.transform.update_local_matrix();
        }

        // 2. World matrix
        let mut force_children = force;
        if node.transform.world_matrix_needs_update || force {
            let world = compose_world(parent_world, node.transform.local_matrix);
            node.transform.set_world_matrix(world);
            force_children = true;
        }

        // 3. Children, pushed in reverse to keep pre-order
        let current_world = node.transform.world_matrix;
        for &child_handle in node.children.iter().rev() {
            stack.push((child_handle, Some(current_world), force_children));
        }
    }
}
