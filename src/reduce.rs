use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::Company;

/// Arena slot of the synthetic root every top-level company hangs from.
pub const VIRTUAL_ROOT: usize = 0;

/// Where a company attaches in the spanning tree.
///
/// The virtual root is its own variant rather than a reserved id, so no real
/// company id can ever be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ParentRef {
    VirtualRoot,
    Company(String),
}

impl ParentRef {
    pub fn company_id(&self) -> Option<&str> {
        match self {
            ParentRef::VirtualRoot => None,
            ParentRef::Company(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryEdge {
    pub id: String,
    pub primary_parent: ParentRef,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// `None` only for the virtual root.
    pub id: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Virtual root is depth 0, top-level companies depth 1.
    pub depth: usize,
}

/// Single-root spanning tree over a multi-parent graph, stored as an arena.
#[derive(Debug, Clone)]
pub struct PrimaryTree {
    nodes: Vec<TreeNode>,
    slots: HashMap<String, usize>,
    broken_cycles: Vec<String>,
}

/// Picks one primary parent per company and builds the spanning tree.
///
/// The primary parent is `parent_ids[0]` when it names another existing
/// company; a missing list, a dangling id or a self reference attaches the
/// company to the virtual root instead. When primary parents form a cycle the
/// member that comes first in `companies` is reattached to the root.
pub fn reduce_to_tree(companies: &[Company]) -> PrimaryTree {
    let mut nodes = Vec::with_capacity(companies.len() + 1);
    nodes.push(TreeNode {
        id: None,
        parent: None,
        children: Vec::new(),
        depth: 0,
    });

    let mut slots: HashMap<String, usize> = HashMap::with_capacity(companies.len());
    let mut members: Vec<&Company> = Vec::with_capacity(companies.len());
    for company in companies {
        if slots.contains_key(&company.id) {
            warn!(id = %company.id, "duplicate company id skipped during layout");
            continue;
        }
        slots.insert(company.id.clone(), nodes.len());
        nodes.push(TreeNode {
            id: Some(company.id.clone()),
            parent: None,
            children: Vec::new(),
            depth: 0,
        });
        members.push(company);
    }

    let mut primary: Vec<usize> = vec![VIRTUAL_ROOT; nodes.len()];
    for (offset, company) in members.iter().enumerate() {
        let slot = offset + 1;
        let Some(parent_id) = company.primary_parent() else {
            continue;
        };
        match slots.get(parent_id) {
            Some(&parent_slot) if parent_slot != slot => primary[slot] = parent_slot,
            Some(_) => {
                debug!(id = %company.id, "self-referencing primary parent attached to root");
            }
            None => {
                debug!(
                    id = %company.id,
                    parent = %parent_id,
                    "dangling primary parent attached to root"
                );
            }
        }
    }

    let broken_cycles = break_primary_cycles(&mut primary, &nodes);

    for slot in 1..nodes.len() {
        let parent = primary[slot];
        nodes[slot].parent = Some(parent);
        nodes[parent].children.push(slot);
    }

    let mut queue = VecDeque::from([VIRTUAL_ROOT]);
    while let Some(slot) = queue.pop_front() {
        let depth = nodes[slot].depth + 1;
        for index in 0..nodes[slot].children.len() {
            let child = nodes[slot].children[index];
            nodes[child].depth = depth;
            queue.push_back(child);
        }
    }

    PrimaryTree {
        nodes,
        slots,
        broken_cycles,
    }
}

/// Walks every primary chain; on a cycle, the lowest slot in it is sent to the root.
fn break_primary_cycles(primary: &mut [usize], nodes: &[TreeNode]) -> Vec<String> {
    const FRESH: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![FRESH; primary.len()];
    state[VIRTUAL_ROOT] = DONE;
    let mut broken = Vec::new();

    for start in 1..primary.len() {
        let mut path = Vec::new();
        let mut current = start;
        while state[current] == FRESH {
            state[current] = ON_PATH;
            path.push(current);
            current = primary[current];
        }

        if state[current] == ON_PATH {
            let cycle_start = path
                .iter()
                .position(|&slot| slot == current)
                .unwrap_or_default();
            let cycle = &path[cycle_start..];
            let victim = cycle.iter().copied().min().unwrap_or(current);
            primary[victim] = VIRTUAL_ROOT;

            let id = nodes[victim].id.clone().unwrap_or_default();
            let members: Vec<&str> = cycle
                .iter()
                .filter_map(|&slot| nodes[slot].id.as_deref())
                .collect();
            warn!(
                company = %id,
                cycle = ?members,
                "primary parent cycle broken; company attached to root"
            );
            broken.push(id);
        }

        for slot in path {
            state[slot] = DONE;
        }
    }

    broken
}

impl PrimaryTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, slot: usize) -> &TreeNode {
        &self.nodes[slot]
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Number of real companies in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Companies reattached to the root to break a primary parent cycle.
    pub fn broken_cycles(&self) -> &[String] {
        &self.broken_cycles
    }

    pub fn primary_parent(&self, id: &str) -> Option<ParentRef> {
        let slot = self.slot_of(id)?;
        Some(self.parent_ref(slot))
    }

    fn parent_ref(&self, slot: usize) -> ParentRef {
        match self.nodes[slot].parent.and_then(|p| self.nodes[p].id.clone()) {
            Some(id) => ParentRef::Company(id),
            None => ParentRef::VirtualRoot,
        }
    }

    /// One edge per real company, in input order.
    pub fn edges(&self) -> Vec<PrimaryEdge> {
        (1..self.nodes.len())
            .filter_map(|slot| {
                let id = self.nodes[slot].id.clone()?;
                Some(PrimaryEdge {
                    id,
                    primary_parent: self.parent_ref(slot),
                })
            })
            .collect()
    }

    /// Slots in depth-first pre-order starting at the virtual root.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![VIRTUAL_ROOT];
        while let Some(slot) = stack.pop() {
            order.push(slot);
            stack.extend(self.nodes[slot].children.iter().rev().copied());
        }
        order
    }
}
