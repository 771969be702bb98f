//! Keyed children diff.
//!
//! Double-ended comparison of two sibling lists. Four pointers walk the old
//! and new lists from both ends; each step tries, in order:
//!
//! 1. old start vs new start: patch in place.
//! 2. old end vs new end: patch in place.
//! 3. old start vs new end: patch, then move after the current old end.
//! 4. old end vs new start: patch, then move before the current old start.
//! 5. otherwise look the new start up among the remaining old nodes. A hit
//!    is patched and moved before the old start, and its old slot is marked
//!    consumed. A miss mounts a new node there.
//!
//! Once either list is exhausted, leftover new nodes are mounted and
//! leftover old nodes unmounted. Nodes match by key; unkeyed siblings match
//! each other, which degrades to a positional patch.

use std::collections::HashSet;

use super::adapter::HostAdapter;
use super::renderer::{first_host, last_host, Renderer};
use super::vnode::{HostNode, VNode};
use crate::error::Warning;

impl<A: HostAdapter + 'static> Renderer<A> {
    pub(crate) fn patch_keyed_children(
        &self,
        old: &[VNode],
        new: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        if cfg!(debug_assertions) {
            self.check_duplicate_keys(new);
        }

        let mut slots: Vec<Option<&VNode>> = old.iter().map(Some).collect();
        let mut old_start = 0isize;
        let mut old_end = old.len() as isize - 1;
        let mut new_start = 0isize;
        let mut new_end = new.len() as isize - 1;

        while old_start <= old_end && new_start <= new_end {
            let Some(old_first) = slots[old_start as usize] else {
                old_start += 1;
                continue;
            };
            let Some(old_last) = slots[old_end as usize] else {
                old_end -= 1;
                continue;
            };
            let new_first = &new[new_start as usize];
            let new_last = &new[new_end as usize];

            if old_first.key == new_first.key {
                let rest = &slots[(old_start + 1) as usize..=old_end as usize];
                let placed = &new[(new_end + 1) as usize..];
                let next = following_host(rest, placed, anchor);
                self.patch(Some(old_first), new_first, container, next);
                old_start += 1;
                new_start += 1;
            } else if old_last.key == new_last.key {
                let next = following_host(&[], &new[(new_end + 1) as usize..], anchor);
                self.patch(Some(old_last), new_last, container, next);
                old_end -= 1;
                new_end -= 1;
            } else if old_first.key == new_last.key {
                let after = last_host(old_last).and_then(|last| self.host().next_sibling(last));
                self.patch(Some(old_first), new_last, container, after);
                self.move_vnode(new_last, container, after);
                old_start += 1;
                new_end -= 1;
            } else if old_last.key == new_first.key {
                let before = first_host(old_first);
                self.patch(Some(old_last), new_first, container, before);
                self.move_vnode(new_first, container, before);
                old_end -= 1;
                new_start += 1;
            } else {
                let before = first_host(old_first).or_else(|| self.host().first_child(container));
                let found = (old_start..=old_end)
                    .map(|i| i as usize)
                    .find(|&i| slots[i].is_some_and(|node| node.key == new_first.key));
                match found {
                    Some(i) => {
                        if let Some(matched) = slots[i].take() {
                            self.patch(Some(matched), new_first, container, before);
                            self.move_vnode(new_first, container, before);
                        }
                    }
                    None => self.mount(new_first, container, before),
                }
                new_start += 1;
            }
        }

        if old_end < old_start && new_start <= new_end {
            // Everything after `new_end` is already in its final place.
            let before = following_host(&[], &new[(new_end + 1) as usize..], anchor);
            for node in &new[new_start as usize..=new_end as usize] {
                self.mount(node, container, before);
            }
        } else if new_end < new_start && old_start <= old_end {
            for node in slots[old_start as usize..=old_end as usize].iter().flatten() {
                self.unmount(node, container);
            }
        }
    }

    fn check_duplicate_keys(&self, nodes: &[VNode]) {
        let mut seen = HashSet::new();
        for key in nodes.iter().filter_map(|node| node.key.as_ref()) {
            if !seen.insert(key) {
                self.runtime().warn(Warning::DuplicateKey {
                    key: key.to_string(),
                });
            }
        }
    }
}

/// Host node that follows a position: the first one among the old nodes
/// still in their original slots, then among the new nodes already placed
/// after it, then `fallback`.
fn following_host(
    rest: &[Option<&VNode>],
    placed: &[VNode],
    fallback: Option<HostNode>,
) -> Option<HostNode> {
    rest.iter()
        .flatten()
        .find_map(|node| first_host(node))
        .or_else(|| placed.iter().find_map(first_host))
        .or(fallback)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
