//! # Scope tree: hierarchical namespace of service registries.
//!
//! The tree is an arena owned by the root. Every [`Scope`] handle is a pair
//! `(Arc<Tree>, ScopeId)`; nodes refer to their parent by id, so there is no
//! ownership cycle between parents and children.
//!
//! ## Architecture
//! ```text
//! Tree (shared by every handle of the same tree)
//!   ├─ opts: InjectorOpts            (fixed at root creation)
//!   ├─ pool: Option<HealthCheckPool> (iff health_check_parallelism > 0)
//!   ├─ next_seq                      (registration order, tree-wide)
//!   └─ nodes: RwLock<HashMap<ScopeId, ScopeNode>>
//!          ScopeId(0) "[root]" ── children{"api": 1, "jobs": 2}
//!          ScopeId(1) "api"    ── parent 0, children{"db": 3}
//!          ScopeId(2) "jobs"   ── parent 0
//!          ScopeId(3) "db"     ── parent 1
//! ```
//!
//! ## Rules
//! - Child names are unique among siblings; `scope(name)` returns the existing child.
//! - A scope's shutdown removes its descendants from the arena; handles to removed
//!   nodes report [`ScopeError::Destroyed`] on mutation and empty views on reads.
//! - The arena lock is never held while user code (hooks, providers, capabilities) runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::core::config::InjectorOpts;
use crate::core::pool::HealthCheckPool;
use crate::core::registry::Registry;
use crate::error::ScopeError;

/// Name of every root scope.
pub const ROOT_SCOPE_NAME: &str = "[root]";

/// Identifier of a scope, unique within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Id of the root scope of every tree.
    pub const ROOT: ScopeId = ScopeId(0);
}

struct ScopeNode {
    name: Arc<str>,
    parent: Option<ScopeId>,
    children: BTreeMap<Arc<str>, ScopeId>,
    registry: Arc<Registry>,
}

impl ScopeNode {
    fn new(name: Arc<str>, parent: Option<ScopeId>) -> Self {
        Self {
            name,
            parent,
            children: BTreeMap::new(),
            registry: Arc::new(Registry::new()),
        }
    }
}

/// State shared by every scope of one tree.
pub(crate) struct Tree {
    opts: InjectorOpts,
    pool: Option<HealthCheckPool>,
    nodes: RwLock<HashMap<ScopeId, ScopeNode>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

impl Tree {
    fn new(opts: InjectorOpts) -> Arc<Self> {
        let pool = opts.parallelism_limit().map(HealthCheckPool::new);
        let mut nodes = HashMap::new();
        nodes.insert(ScopeId::ROOT, ScopeNode::new(ROOT_SCOPE_NAME.into(), None));

        Arc::new(Self {
            opts,
            pool,
            nodes: RwLock::new(nodes),
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
        })
    }

    pub(crate) fn pool(&self) -> Option<&HealthCheckPool> {
        self.pool.as_ref()
    }

    /// Next registration sequence number.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Handle to one node of a scope tree.
///
/// Cheap to clone; clones refer to the same node.
#[derive(Clone)]
pub struct Scope {
    tree: Arc<Tree>,
    id: ScopeId,
    name: Arc<str>,
}

impl Scope {
    /// Scope id, unique within the tree.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Scope name (`"[root]"` for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the root scope.
    pub fn is_root(&self) -> bool {
        self.id == ScopeId::ROOT
    }

    /// True once an ancestor's shutdown removed this scope from the tree.
    pub fn is_destroyed(&self) -> bool {
        !self.tree.nodes.read().contains_key(&self.id)
    }

    /// Options of the tree (read-only, shared with the root).
    pub fn opts(&self) -> &InjectorOpts {
        &self.tree.opts
    }

    pub(crate) fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Creates the named child scope, or returns it if it already exists.
    ///
    /// Names must be non-empty and must not contain `/`.
    pub fn scope(&self, name: &str) -> Result<Scope, ScopeError> {
        if name.is_empty() || name.contains('/') {
            return Err(ScopeError::InvalidName {
                name: name.to_string(),
            });
        }

        let mut nodes = self.tree.nodes.write();
        let Some(node) = nodes.get(&self.id) else {
            return Err(self.destroyed());
        };
        if let Some((existing, id)) = node.children.get_key_value(name) {
            return Ok(self.handle(*id, existing.clone()));
        }

        let id = ScopeId(self.tree.next_id.fetch_add(1, Ordering::Relaxed));
        let name: Arc<str> = name.into();
        nodes.insert(id, ScopeNode::new(name.clone(), Some(self.id)));
        if let Some(node) = nodes.get_mut(&self.id) {
            node.children.insert(name.clone(), id);
        }
        drop(nodes);

        self.opts().log(format_args!("scope `{}` created under `{}`", name, self.name));
        Ok(self.handle(id, name))
    }

    /// Root of the tree, in O(1).
    pub fn root_scope(&self) -> RootScope {
        RootScope {
            scope: self.handle(ScopeId::ROOT, ROOT_SCOPE_NAME.into()),
        }
    }

    /// Direct parent (`None` for the root or a destroyed scope).
    pub fn parent(&self) -> Option<Scope> {
        let nodes = self.tree.nodes.read();
        let parent = nodes.get(&self.id)?.parent?;
        let node = nodes.get(&parent)?;
        Some(self.handle(parent, node.name.clone()))
    }

    /// Ancestors from the closest parent up to, excluding, the root.
    ///
    /// Empty for the root and for direct children of the root.
    pub fn ancestors(&self) -> Vec<Scope> {
        let nodes = self.tree.nodes.read();
        let mut out = Vec::new();
        let mut cursor = nodes.get(&self.id).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == ScopeId::ROOT {
                break;
            }
            let Some(node) = nodes.get(&id) else { break };
            out.push(self.handle(id, node.name.clone()));
            cursor = node.parent;
        }
        out
    }

    /// Direct children, ordered by name.
    pub fn children(&self) -> Vec<Scope> {
        let nodes = self.tree.nodes.read();
        nodes
            .get(&self.id)
            .map(|node| {
                node.children
                    .iter()
                    .map(|(name, id)| self.handle(*id, name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Slash-separated path from the root, e.g. `"[root]/api/db"`.
    pub fn path(&self) -> String {
        let mut path = String::from(ROOT_SCOPE_NAME);
        if self.is_root() {
            return path;
        }
        for scope in self.ancestors().iter().rev() {
            path.push('/');
            path.push_str(scope.name());
        }
        path.push('/');
        path.push_str(&self.name);
        path
    }

    /// Name of `service` qualified with this scope's path below the root.
    ///
    /// Root services keep their bare name; `svc` in `[root]/api/db` becomes `api/db/svc`.
    pub(crate) fn qualify(&self, service: &str) -> String {
        let mut key = String::new();
        if !self.is_root() {
            for scope in self.ancestors().iter().rev() {
                key.push_str(scope.name());
                key.push('/');
            }
            key.push_str(&self.name);
            key.push('/');
        }
        key.push_str(service);
        key
    }

    /// Registry of this scope.
    pub(crate) fn registry(&self) -> Result<Arc<Registry>, ScopeError> {
        self.tree
            .nodes
            .read()
            .get(&self.id)
            .map(|node| Arc::clone(&node.registry))
            .ok_or_else(|| self.destroyed())
    }

    /// This scope followed by its ancestors, root last.
    pub(crate) fn lineage(&self) -> Vec<(Scope, Arc<Registry>)> {
        let nodes = self.tree.nodes.read();
        let mut out = Vec::new();
        let mut cursor = Some(self.id);
        while let Some(id) = cursor {
            let Some(node) = nodes.get(&id) else { break };
            out.push((self.handle(id, node.name.clone()), Arc::clone(&node.registry)));
            cursor = node.parent;
        }
        out
    }

    /// This scope and all descendants, depth-first pre-order, children by name.
    pub(crate) fn subtree(&self) -> Vec<(Scope, Arc<Registry>)> {
        let nodes = self.tree.nodes.read();
        let mut out = Vec::new();
        let mut stack = vec![(self.id, self.name.clone())];
        while let Some((id, name)) = stack.pop() {
            let Some(node) = nodes.get(&id) else { continue };
            out.push((self.handle(id, name), Arc::clone(&node.registry)));
            for (child_name, child_id) in node.children.iter().rev() {
                stack.push((*child_id, child_name.clone()));
            }
        }
        out
    }

    /// Removes every descendant node from the arena.
    pub(crate) fn destroy_descendants(&self) -> usize {
        let mut nodes = self.tree.nodes.write();
        let Some(node) = nodes.get_mut(&self.id) else {
            return 0;
        };
        let mut stack: Vec<ScopeId> = std::mem::take(&mut node.children).into_values().collect();
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            if let Some(child) = nodes.remove(&id) {
                removed += 1;
                stack.extend(child.children.into_values());
            }
        }
        removed
    }

    fn handle(&self, id: ScopeId, name: Arc<str>) -> Scope {
        Scope {
            tree: Arc::clone(&self.tree),
            id,
            name,
        }
    }

    fn destroyed(&self) -> ScopeError {
        ScopeError::Destroyed {
            name: self.name.to_string(),
        }
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Root of a scope tree: owns the options and the health-check worker pool.
///
/// Dereferences to [`Scope`], so every scope operation is available on the root.
///
/// # Example
/// ```
/// use scopevisor::RootScope;
///
/// let root = RootScope::new();
/// let api = root.scope("api").unwrap();
/// let db = api.scope("db").unwrap();
///
/// assert_eq!(db.root_scope(), root);
/// assert_eq!(db.ancestors(), vec![api.clone()]);
/// assert_eq!(root.children(), vec![api]);
/// ```
#[derive(PartialEq, Eq)]
pub struct RootScope {
    scope: Scope,
}

impl RootScope {
    /// Creates a root with default options.
    pub fn new() -> Self {
        Self::with_opts(InjectorOpts::default())
    }

    /// Creates a root with the given options.
    ///
    /// A worker pool is allocated iff `opts.health_check_parallelism > 0`.
    pub fn with_opts(opts: InjectorOpts) -> Self {
        let tree = Tree::new(opts);
        Self {
            scope: Scope {
                tree,
                id: ScopeId::ROOT,
                name: ROOT_SCOPE_NAME.into(),
            },
        }
    }

    /// New independent root with a copy of these options and an empty tree.
    pub fn clone_root(&self) -> RootScope {
        Self::with_opts(self.opts().clone())
    }

    /// New independent root with `opts` and an empty tree.
    pub fn clone_with_opts(&self, opts: InjectorOpts) -> RootScope {
        Self::with_opts(opts)
    }

    /// True if this root owns a health-check worker pool.
    pub fn has_health_check_pool(&self) -> bool {
        self.tree().pool().is_some()
    }

    /// The root as a plain [`Scope`] handle.
    pub fn as_scope(&self) -> &Scope {
        &self.scope
    }
}

impl Default for RootScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for RootScope {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl PartialEq<Scope> for RootScope {
    fn eq(&self, other: &Scope) -> bool {
        self.scope == *other
    }
}

impl fmt::Debug for RootScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootScope")
            .field("opts", self.opts())
            .field("pool", &self.has_health_check_pool())
            .finish()
    }
}
