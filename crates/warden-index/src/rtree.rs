//! Copy-on-write R-tree over axis-aligned boxes.
//!
//! Nodes live behind `Arc`. Cloning a tree copies one pointer; a write
//! through `Arc::make_mut` copies only the nodes on the path it touches,
//! so an old clone keeps seeing the tree exactly as it was.
//!
//! All leaves sit at the same depth, every non-root node holds between
//! `min_entries` and `max_entries` children, and every node's box is the
//! minimal box enclosing its children. [`RTree::check_invariants`] verifies
//! all three.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_geom::Aabb;

use crate::IndexError;

/// How an overflowing node is divided in two.
///
/// Both strategies try to minimize the volume of the resulting boxes;
/// quadratic is slower to split but produces tighter trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    #[default]
    Quadratic,
    Linear,
}

/// Node capacity and split configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RTreeParams {
    /// Maximum children per node.
    pub max_entries: usize,
    /// Minimum children per non-root node.
    pub min_entries: usize,
    pub split: SplitStrategy,
}

impl Default for RTreeParams {
    fn default() -> Self {
        Self {
            max_entries: 16,
            min_entries: 6,
            split: SplitStrategy::Quadratic,
        }
    }
}

impl RTreeParams {
    /// Check the parameters can produce a valid tree.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_entries < 4 {
            return Err(IndexError::InvalidParams("max_entries must be at least 4"));
        }
        if self.min_entries < 2 {
            return Err(IndexError::InvalidParams("min_entries must be at least 2"));
        }
        if self.min_entries > self.max_entries / 2 {
            return Err(IndexError::InvalidParams(
                "min_entries must not exceed max_entries / 2",
            ));
        }
        Ok(())
    }
}

/// A key stored in the tree together with its box.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry<K> {
    pub key: K,
    pub bounds: Aabb,
}

#[derive(Clone, Debug)]
struct Node<K> {
    bounds: Aabb,
    kind: NodeKind<K>,
}

#[derive(Clone, Debug)]
enum NodeKind<K> {
    Leaf(Vec<Entry<K>>),
    Branch(Vec<Arc<Node<K>>>),
}

trait Bounded {
    fn bounds(&self) -> Aabb;
}

impl<K> Bounded for Entry<K> {
    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

impl<K> Bounded for Arc<Node<K>> {
    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

fn enclose<T: Bounded>(items: &[T]) -> Aabb {
    items
        .iter()
        .map(Bounded::bounds)
        .reduce(|a, b| a.union(&b))
        .unwrap_or(Aabb::point([0.0; 3]))
}

impl<K> Node<K> {
    fn leaf(entries: Vec<Entry<K>>) -> Self {
        Self {
            bounds: enclose(&entries),
            kind: NodeKind::Leaf(entries),
        }
    }

    fn branch(children: Vec<Arc<Self>>) -> Self {
        Self {
            bounds: enclose(&children),
            kind: NodeKind::Branch(children),
        }
    }

    fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Branch(children) => children.len(),
        }
    }

    fn refresh_bounds(&mut self) {
        self.bounds = match &self.kind {
            NodeKind::Leaf(entries) => enclose(entries),
            NodeKind::Branch(children) => enclose(children),
        };
    }
}

/// An R-tree mapping keys to boxes.
#[derive(Clone, Debug)]
pub struct RTree<K> {
    root: Option<Arc<Node<K>>>,
    len: usize,
    params: RTreeParams,
}

impl<K: Clone + PartialEq> Default for RTree<K> {
    fn default() -> Self {
        Self::new(RTreeParams::default())
    }
}

impl<K: Clone + PartialEq> RTree<K> {
    /// Create an empty tree.
    #[must_use]
    pub const fn new(params: RTreeParams) -> Self {
        Self {
            root: None,
            len: 0,
            params,
        }
    }

    /// Build a tree from many entries at once using Sort-Tile-Recursive
    /// packing. Much faster than repeated inserts and yields fuller nodes.
    #[must_use]
    pub fn bulk_load(entries: Vec<Entry<K>>, params: RTreeParams) -> Self {
        let len = entries.len();
        if len == 0 {
            return Self::new(params);
        }

        let mut level: Vec<Arc<Node<K>>> = str_groups(entries, &params)
            .into_iter()
            .map(|group| Arc::new(Node::leaf(group)))
            .collect();

        while level.len() > 1 {
            level = str_groups(level, &params)
                .into_iter()
                .map(|group| Arc::new(Node::branch(group)))
                .collect();
        }

        Self {
            root: level.pop(),
            len,
            params,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn params(&self) -> &RTreeParams {
        &self.params
    }

    /// Box enclosing every entry, or `None` if the tree is empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.as_ref().map(|root| root.bounds)
    }

    /// Number of levels (0 for an empty tree, 1 for a single leaf).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            depth += 1;
            node = match &current.kind {
                NodeKind::Leaf(_) => None,
                NodeKind::Branch(children) => children.first().map(AsRef::as_ref),
            };
        }
        depth
    }

    /// Insert a key with its box. Keys are not deduplicated here; the
    /// owning [`crate::SpatialIndex`] guarantees uniqueness.
    pub fn insert(&mut self, key: K, bounds: Aabb) {
        self.insert_entry(Entry { key, bounds });
        self.len += 1;
    }

    fn insert_entry(&mut self, entry: Entry<K>) {
        if self.root.is_none() {
            self.root = Some(Arc::new(Node::leaf(vec![entry])));
            return;
        }

        let params = self.params;
        let split = self
            .root
            .as_mut()
            .and_then(|root| insert_into(Arc::make_mut(root), entry, &params));

        if let Some(sibling) = split {
            if let Some(old_root) = self.root.take() {
                self.root = Some(Arc::new(Node::branch(vec![old_root, Arc::new(sibling)])));
            }
        }
    }

    /// Remove the entry with `key`, stored under exactly `bounds`.
    ///
    /// Returns `false` if no such entry exists.
    pub fn remove(&mut self, key: &K, bounds: &Aabb) -> bool {
        let mut path = Vec::new();
        let found = self
            .root
            .as_deref()
            .is_some_and(|root| find_path(root, key, bounds, &mut path));
        if !found {
            return false;
        }

        let min = self.params.min_entries;
        let mut orphans = Vec::new();
        if let Some(root) = self.root.as_mut() {
            remove_along(Arc::make_mut(root), &path, min, &mut orphans);
        }
        self.len -= 1;
        self.condense_root();

        for entry in orphans {
            self.insert_entry(entry);
        }
        true
    }

    /// Drop empty roots and promote single children until the root is a
    /// real fan-out node again.
    fn condense_root(&mut self) {
        loop {
            let next = match self.root.as_deref() {
                Some(Node {
                    kind: NodeKind::Branch(children),
                    ..
                }) if children.len() <= 1 => children.first().cloned(),
                Some(Node {
                    kind: NodeKind::Leaf(entries),
                    ..
                }) if entries.is_empty() => None,
                _ => break,
            };
            self.root = next;
        }
    }

    /// Call `f` for every key whose box contains `point`.
    pub fn for_each_containing(&self, point: [f64; 3], mut f: impl FnMut(&K)) {
        if let Some(root) = self.root.as_deref() {
            visit_point(root, point, &mut f);
        }
    }

    /// Call `f` for every key whose box intersects `area`.
    pub fn for_each_intersecting(&self, area: &Aabb, mut f: impl FnMut(&K)) {
        if let Some(root) = self.root.as_deref() {
            visit_box(root, area, &mut f);
        }
    }

    /// Keys whose box contains `point`.
    #[must_use]
    pub fn query_point(&self, point: [f64; 3]) -> Vec<K> {
        let mut out = Vec::new();
        self.for_each_containing(point, |k| out.push(k.clone()));
        out
    }

    /// Keys whose box intersects `area`.
    #[must_use]
    pub fn query_box(&self, area: &Aabb) -> Vec<K> {
        let mut out = Vec::new();
        self.for_each_intersecting(area, |k| out.push(k.clone()));
        out
    }

    /// All entries, in tree order.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry<K>> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = self.root.as_deref() {
            collect_entries(root, &mut out);
        }
        out
    }

    /// Verify the structural invariants. Intended for tests and debug
    /// assertions; walks the whole tree.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(root) = self.root.as_deref() else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(format!("empty tree reports {} entries", self.len))
            };
        };

        let mut leaf_depth = None;
        let count = check_node(root, &self.params, true, 0, &mut leaf_depth)?;
        if count != self.len {
            return Err(format!("tree holds {count} entries but len is {}", self.len));
        }
        Ok(())
    }
}

// ============================================================================
// Insertion
// ============================================================================

/// (volume growth, margin growth) of `base` when extended to cover `add`.
///
/// The margin term keeps the heuristic meaningful for flat or degenerate
/// boxes whose volume is zero.
fn growth(base: &Aabb, add: &Aabb) -> (f64, f64) {
    let merged = base.union(add);
    (
        merged.volume() - base.volume(),
        merged.margin() - base.margin(),
    )
}

fn cmp_cost(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Child needing the least enlargement; ties go to the smaller child.
fn choose_subtree<K>(children: &[Arc<Node<K>>], bounds: &Aabb) -> usize {
    children
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            cmp_cost(growth(&a.bounds, bounds), growth(&b.bounds, bounds))
                .then(a.bounds.volume().total_cmp(&b.bounds.volume()))
        })
        .map_or(0, |(i, _)| i)
}

/// Insert below `node`. Returns the new sibling if `node` had to split.
fn insert_into<K: Clone>(
    node: &mut Node<K>,
    entry: Entry<K>,
    params: &RTreeParams,
) -> Option<Node<K>> {
    node.bounds = node.bounds.union(&entry.bounds);

    match &mut node.kind {
        NodeKind::Leaf(entries) => {
            entries.push(entry);
            if entries.len() <= params.max_entries {
                return None;
            }
            let (left, right) = split(std::mem::take(entries), params);
            *entries = left;
            node.refresh_bounds();
            Some(Node::leaf(right))
        }
        NodeKind::Branch(children) => {
            let idx = choose_subtree(children, &entry.bounds);
            if let Some(sibling) = insert_into(Arc::make_mut(&mut children[idx]), entry, params) {
                children.push(Arc::new(sibling));
            }
            if children.len() <= params.max_entries {
                return None;
            }
            let (left, right) = split(std::mem::take(children), params);
            *children = left;
            node.refresh_bounds();
            Some(Node::branch(right))
        }
    }
}

fn split<T: Bounded>(items: Vec<T>, params: &RTreeParams) -> (Vec<T>, Vec<T>) {
    match params.split {
        SplitStrategy::Quadratic => {
            let seeds = quadratic_seeds(&items);
            distribute(items, seeds, params.min_entries, true)
        }
        SplitStrategy::Linear => {
            let seeds = linear_seeds(&items);
            distribute(items, seeds, params.min_entries, false)
        }
    }
}

/// The pair that would waste the most space if grouped together.
fn quadratic_seeds<T: Bounded>(items: &[T]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut worst = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let a = items[i].bounds();
            let b = items[j].bounds();
            let merged = a.union(&b);
            let waste = (
                merged.volume() - a.volume() - b.volume(),
                merged.margin() - a.margin() - b.margin(),
            );
            if cmp_cost(waste, worst).is_gt() {
                worst = waste;
                best = (i, j);
            }
        }
    }
    best
}

/// The pair with the greatest normalized separation along any axis.
fn linear_seeds<T: Bounded>(items: &[T]) -> (usize, usize) {
    let total = enclose(items);
    let mut best = (0, 1);
    let mut best_sep = f64::NEG_INFINITY;

    for axis in 0..3 {
        let highest_low = (0..items.len())
            .max_by(|&a, &b| items[a].bounds().min()[axis].total_cmp(&items[b].bounds().min()[axis]))
            .unwrap_or(0);
        let lowest_high = (0..items.len())
            .filter(|&i| i != highest_low)
            .min_by(|&a, &b| items[a].bounds().max()[axis].total_cmp(&items[b].bounds().max()[axis]))
            .unwrap_or(usize::from(highest_low == 0));

        let width = (total.max()[axis] - total.min()[axis]).max(f64::MIN_POSITIVE);
        let sep = (items[highest_low].bounds().min()[axis]
            - items[lowest_high].bounds().max()[axis])
            / width;
        if sep > best_sep {
            best_sep = sep;
            best = (highest_low, lowest_high);
        }
    }
    best
}

/// Grow two groups from the seeds, keeping both at or above `min`.
///
/// With `pick_next` the item with the strongest preference is placed first
/// (quadratic split); otherwise items are placed in arbitrary order.
fn distribute<T: Bounded>(
    mut items: Vec<T>,
    seeds: (usize, usize),
    min: usize,
    pick_next: bool,
) -> (Vec<T>, Vec<T>) {
    let (lo, hi) = if seeds.0 < seeds.1 {
        seeds
    } else {
        (seeds.1, seeds.0)
    };
    let seed_b = items.swap_remove(hi);
    let seed_a = items.swap_remove(lo);

    let mut box_a = seed_a.bounds();
    let mut box_b = seed_b.bounds();
    let mut group_a = vec![seed_a];
    let mut group_b = vec![seed_b];

    while !items.is_empty() {
        if group_a.len() + items.len() <= min {
            group_a.append(&mut items);
            break;
        }
        if group_b.len() + items.len() <= min {
            group_b.append(&mut items);
            break;
        }

        let idx = if pick_next {
            (0..items.len())
                .max_by(|&i, &j| {
                    let pref = |k: usize| {
                        let b = items[k].bounds();
                        let ga = growth(&box_a, &b);
                        let gb = growth(&box_b, &b);
                        ((ga.0 - gb.0).abs(), (ga.1 - gb.1).abs())
                    };
                    cmp_cost(pref(i), pref(j))
                })
                .unwrap_or(0)
        } else {
            items.len() - 1
        };

        let item = items.swap_remove(idx);
        let b = item.bounds();
        let to_a = match cmp_cost(growth(&box_a, &b), growth(&box_b, &b)) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => match box_a.volume().total_cmp(&box_b.volume()) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => group_a.len() <= group_b.len(),
            },
        };

        if to_a {
            box_a = box_a.union(&b);
            group_a.push(item);
        } else {
            box_b = box_b.union(&b);
            group_b.push(item);
        }
    }

    (group_a, group_b)
}

// ============================================================================
// Removal
// ============================================================================

/// Record the child indices leading to `key`, ending with its slot in the
/// leaf.
fn find_path<K: PartialEq>(node: &Node<K>, key: &K, bounds: &Aabb, path: &mut Vec<usize>) -> bool {
    if !node.bounds.contains_box(bounds) {
        return false;
    }
    match &node.kind {
        NodeKind::Leaf(entries) => match entries.iter().position(|e| e.key == *key) {
            Some(pos) => {
                path.push(pos);
                true
            }
            None => false,
        },
        NodeKind::Branch(children) => {
            for (i, child) in children.iter().enumerate() {
                path.push(i);
                if find_path(child, key, bounds, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
    }
}

/// Remove along `path`, detaching children that fall below `min` and
/// collecting their entries for reinsertion.
fn remove_along<K: Clone>(
    node: &mut Node<K>,
    path: &[usize],
    min: usize,
    orphans: &mut Vec<Entry<K>>,
) {
    match &mut node.kind {
        NodeKind::Leaf(entries) => {
            entries.swap_remove(path[0]);
        }
        NodeKind::Branch(children) => {
            let idx = path[0];
            let child = Arc::make_mut(&mut children[idx]);
            remove_along(child, &path[1..], min, orphans);
            if child.len() < min {
                let detached = children.swap_remove(idx);
                collect_entries(&detached, orphans);
            }
        }
    }
    if node.len() > 0 {
        node.refresh_bounds();
    }
}

fn collect_entries<K: Clone>(node: &Node<K>, out: &mut Vec<Entry<K>>) {
    match &node.kind {
        NodeKind::Leaf(entries) => out.extend(entries.iter().cloned()),
        NodeKind::Branch(children) => {
            for child in children {
                collect_entries(child, out);
            }
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

fn visit_point<K>(node: &Node<K>, point: [f64; 3], f: &mut impl FnMut(&K)) {
    match &node.kind {
        NodeKind::Leaf(entries) => {
            for entry in entries {
                if entry.bounds.contains_point(point) {
                    f(&entry.key);
                }
            }
        }
        NodeKind::Branch(children) => {
            for child in children {
                if child.bounds.contains_point(point) {
                    visit_point(child, point, f);
                }
            }
        }
    }
}

fn visit_box<K>(node: &Node<K>, area: &Aabb, f: &mut impl FnMut(&K)) {
    match &node.kind {
        NodeKind::Leaf(entries) => {
            for entry in entries {
                if entry.bounds.intersects(area) {
                    f(&entry.key);
                }
            }
        }
        NodeKind::Branch(children) => {
            for child in children {
                if child.bounds.intersects(area) {
                    visit_box(child, area, f);
                }
            }
        }
    }
}

// ============================================================================
// Bulk loading
// ============================================================================

fn sort_by_center<T: Bounded>(items: &mut [T], axis: usize) {
    items.sort_by(|a, b| a.bounds().center(axis).total_cmp(&b.bounds().center(axis)));
}

/// Split into chunks of `size`, topping up a short last chunk from its
/// neighbour so every chunk holds at least `min` items.
fn into_chunks<T>(items: Vec<T>, size: usize, min: usize) -> Vec<Vec<T>> {
    let mut chunks: Vec<Vec<T>> = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }

    let n = chunks.len();
    if n >= 2 && chunks[n - 1].len() < min {
        let need = min - chunks[n - 1].len();
        let keep = chunks[n - 2].len() - need;
        let moved = chunks[n - 2].split_off(keep);
        chunks[n - 1].extend(moved);
    }
    chunks
}

/// Sort-Tile-Recursive grouping: slice along x, then y, then z.
fn str_groups<T: Bounded>(mut items: Vec<T>, params: &RTreeParams) -> Vec<Vec<T>> {
    let cap = params.max_entries;
    let min = params.min_entries;
    if items.len() <= cap {
        return vec![items];
    }

    let pages = items.len().div_ceil(cap);
    let slabs = ((pages as f64).cbrt().ceil() as usize).max(1);

    let mut groups = Vec::with_capacity(pages);
    sort_by_center(&mut items, 0);
    for mut x_slab in into_chunks(items, slabs * slabs * cap, min) {
        sort_by_center(&mut x_slab, 1);
        for mut y_slab in into_chunks(x_slab, slabs * cap, min) {
            sort_by_center(&mut y_slab, 2);
            groups.extend(into_chunks(y_slab, cap, min));
        }
    }
    groups
}

// ============================================================================
// Invariant checking
// ============================================================================

fn check_node<K>(
    node: &Node<K>,
    params: &RTreeParams,
    is_root: bool,
    depth: usize,
    leaf_depth: &mut Option<usize>,
) -> Result<usize, String> {
    let len = node.len();
    if len > params.max_entries {
        return Err(format!("node at depth {depth} overflows with {len} children"));
    }
    if !is_root && len < params.min_entries {
        return Err(format!("node at depth {depth} underflows with {len} children"));
    }

    let expected = match &node.kind {
        NodeKind::Leaf(entries) => enclose(entries),
        NodeKind::Branch(children) => enclose(children),
    };
    if expected != node.bounds {
        return Err(format!(
            "node at depth {depth} has bounds {:?}, minimal is {expected:?}",
            node.bounds
        ));
    }

    match &node.kind {
        NodeKind::Leaf(entries) => {
            match *leaf_depth {
                Some(d) if d != depth => {
                    return Err(format!("leaves at depths {d} and {depth}"));
                }
                _ => *leaf_depth = Some(depth),
            }
            Ok(entries.len())
        }
        NodeKind::Branch(children) => {
            let mut count = 0;
            for child in children {
                count += check_node(child, params, false, depth + 1, leaf_depth)?;
            }
            Ok(count)
        }
    }
}
