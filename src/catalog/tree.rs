//! Category tree maintenance
//!
//! Nodes live in a flat arena and refer to each other by id only. The tree
//! keeps two invariants through every edit:
//! - `count == images.len()` on every node
//! - along any root-to-leaf chain, at most one node holds a given image id

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AssociationError;
use crate::state::CategoryNode;

/// Arena of category nodes addressed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    index: HashMap<String, usize>,
}

/// Nodes whose membership changed during an assign, plus skipped targets
#[derive(Debug, Default)]
pub struct AssignOutcome {
    pub touched: BTreeSet<String>,
    pub skipped: Vec<AssociationError>,
}

impl CategoryTree {
    pub fn from_nodes(nodes: Vec<CategoryNode>) -> Self {
        let mut tree = Self {
            nodes,
            index: HashMap::new(),
        };
        tree.reindex();
        tree
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
    }

    pub fn nodes(&self) -> &[CategoryNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<CategoryNode> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CategoryNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CategoryNode> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    /// Root nodes in sibling order
    pub fn roots(&self) -> Vec<&CategoryNode> {
        let mut roots: Vec<&CategoryNode> =
            self.nodes.iter().filter(|n| n.father.is_none()).collect();
        roots.sort_by_key(|n| n.order);
        roots
    }

    /// Direct children of a node in sibling order
    pub fn children(&self, id: &str) -> Vec<&CategoryNode> {
        let mut children: Vec<&CategoryNode> = self
            .get(id)
            .map(|node| node.children.iter().filter_map(|c| self.get(c)).collect())
            .unwrap_or_default();
        children.sort_by_key(|n| n.order);
        children
    }

    /// Ids from the father of `id` up to the root, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut current = self.get(id).and_then(|n| n.father.as_deref());

        while let Some(father) = current {
            // A cycle in father links ends the walk
            if !visited.insert(father) {
                warn!("Cycle in category ancestry at {}", father);
                break;
            }
            let Some(node) = self.get(father) else { break };
            chain.push(node.id.clone());
            current = node.father.as_deref();
        }
        chain
    }

    /// Every node below `id`, breadth first, without `id` itself
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.get(current) else { continue };
            for child in &node.children {
                if visited.insert(child.as_str()) && self.contains(child) {
                    found.push(child.clone());
                    queue.push_back(child.as_str());
                }
            }
        }
        found
    }

    fn is_ancestor_of(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).iter().any(|a| a == ancestor)
    }

    /// File `image_ids` under `category_ids`, retracting them from the
    /// ancestors and descendants of every target.
    ///
    /// Unknown categories are skipped. When a target is an ancestor of
    /// another target, the more specific one wins.
    pub fn assign(&mut self, image_ids: &[String], category_ids: &[String]) -> AssignOutcome {
        let mut outcome = AssignOutcome::default();

        let mut targets: Vec<String> = Vec::new();
        for id in category_ids {
            if !self.contains(id) {
                warn!("Skipping unknown category {}", id);
                outcome.skipped.push(AssociationError::UnknownCategory(id.clone()));
            } else if !targets.contains(id) {
                targets.push(id.clone());
            }
        }
        let all_targets = targets.clone();
        targets.retain(|t| {
            let covered = all_targets
                .iter()
                .any(|other| other != t && self.is_ancestor_of(t, other));
            if covered {
                debug!("Dropping target {}: a descendant is also a target", t);
            }
            !covered
        });

        let images: HashSet<String> = image_ids.iter().cloned().collect();

        // Add to every target
        for target in &targets {
            if let Some(node) = self.get_mut(target) {
                if node.add_images(image_ids) {
                    outcome.touched.insert(target.clone());
                }
            }
        }

        // Retract from ancestors, then from descendants
        let mut retract_from: Vec<String> = Vec::new();
        for target in &targets {
            retract_from.extend(self.ancestors(target));
        }
        for target in &targets {
            retract_from.extend(self.descendants(target));
        }

        for id in retract_from {
            if targets.contains(&id) {
                continue;
            }
            if let Some(node) = self.get_mut(&id) {
                if node.remove_images(&images) {
                    outcome.touched.insert(id);
                }
            }
        }

        outcome
    }

    /// Ids of every node currently holding `image_id`
    pub fn memberships_of(&self, image_id: &str) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter(|n| n.contains(image_id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Remove image ids from every node; returns the ids of nodes that changed
    pub fn remove_images(&mut self, image_ids: &HashSet<String>) -> Vec<String> {
        self.nodes
            .iter_mut()
            .filter_map(|node| node.remove_images(image_ids).then(|| node.id.clone()))
            .collect()
    }

    fn next_order(&self, father: Option<&str>) -> i64 {
        self.nodes
            .iter()
            .filter(|n| n.father.as_deref() == father)
            .map(|n| n.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Create an empty category, as a root or under `parent`
    pub fn add_category(
        &mut self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, AssociationError> {
        if let Some(parent_id) = parent {
            if !self.contains(parent_id) {
                return Err(AssociationError::UnknownCategory(parent_id.to_string()));
            }
        }

        let mut node = CategoryNode::new(format!("category-{}", Uuid::new_v4()), name);
        node.order = self.next_order(parent);
        node.father = parent.map(str::to_string);
        let id = node.id.clone();

        self.insert(node);
        Ok(id)
    }

    /// Add a prepared node, linking it into its father's children
    pub fn insert(&mut self, mut node: CategoryNode) {
        if let Some(father) = node.father.clone() {
            match self.get_mut(&father) {
                Some(parent) => {
                    if !parent.children.contains(&node.id) {
                        parent.children.push(node.id.clone());
                    }
                    node.level = parent.level + 1;
                }
                None => {
                    warn!("Father {} of {} not found, adding as root", father, node.id);
                    node.father = None;
                    node.level = 0;
                }
            }
        }
        node.count = node.images.len();
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), AssociationError> {
        let node = self
            .get_mut(id)
            .ok_or_else(|| AssociationError::UnknownCategory(id.to_string()))?;
        node.name = name.to_string();
        Ok(())
    }

    /// Give the listed nodes `order` values following their position.
    /// Unknown ids are skipped.
    pub fn reorder(&mut self, ids: &[String]) -> Vec<AssociationError> {
        let mut skipped = Vec::new();
        for (position, id) in ids.iter().enumerate() {
            match self.get_mut(id) {
                Some(node) => node.order = position as i64,
                None => skipped.push(AssociationError::UnknownCategory(id.clone())),
            }
        }
        skipped
    }

    /// Delete a node and its whole subtree, children before parents.
    ///
    /// Returns the removed nodes in deletion order.
    pub fn remove_subtree(&mut self, id: &str) -> Result<Vec<CategoryNode>, AssociationError> {
        let father = self
            .get(id)
            .ok_or_else(|| AssociationError::UnknownCategory(id.to_string()))?
            .father
            .clone();

        // Breadth-first list reversed gives every child before its parent
        let mut order = vec![id.to_string()];
        order.extend(self.descendants(id));
        order.reverse();

        if let Some(father) = father {
            if let Some(parent) = self.get_mut(&father) {
                parent.children.retain(|c| c != id);
            }
        }

        let doomed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut removed_by_id: HashMap<String, CategoryNode> = HashMap::new();
        let mut kept = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.drain(..) {
            if doomed.contains(node.id.as_str()) {
                removed_by_id.insert(node.id.clone(), node);
            } else {
                kept.push(node);
            }
        }
        self.nodes = kept;
        self.reindex();

        Ok(order
            .iter()
            .filter_map(|id| removed_by_id.remove(id))
            .collect())
    }

    /// Fix up a freshly loaded tree: drop dangling and duplicate image ids,
    /// recompute counts, drop broken child/father links, recompute levels.
    ///
    /// Returns true if anything changed.
    pub fn repair(&mut self, known_images: &HashSet<String>) -> bool {
        let before = self.nodes.clone();
        let ids: HashSet<String> = self.index.keys().cloned().collect();

        for node in &mut self.nodes {
            let mut seen = HashSet::new();
            let images: Vec<String> = node
                .images
                .iter()
                .filter(|i| known_images.contains(*i) && seen.insert((*i).clone()))
                .cloned()
                .collect();
            node.set_images(images);

            if node.father.as_ref().is_some_and(|f| !ids.contains(f) || f == &node.id) {
                node.father = None;
            }
        }

        // Children lists mirror father links
        let fathers: HashMap<String, Option<String>> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.father.clone()))
            .collect();
        for node in &mut self.nodes {
            node.children
                .retain(|c| fathers.get(c).is_some_and(|f| f.as_deref() == Some(node.id.as_str())));
        }
        let links: Vec<(String, String)> = self
            .nodes
            .iter()
            .filter_map(|n| n.father.clone().map(|f| (f, n.id.clone())))
            .collect();
        for (father, child) in links {
            if let Some(parent) = self.get_mut(&father) {
                if !parent.children.contains(&child) {
                    parent.children.push(child);
                }
            }
        }

        let levels: Vec<u32> = self
            .nodes
            .iter()
            .map(|n| self.ancestors(&n.id).len() as u32)
            .collect();
        for (node, level) in self.nodes.iter_mut().zip(levels) {
            node.level = level;
        }

        let changed = before != self.nodes;
        if changed {
            debug!("Repaired category tree on load");
        }
        changed
    }
}
