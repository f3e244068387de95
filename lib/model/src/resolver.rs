use crate::{NodeId, TuplesError, TuplesResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use oxrdf::{Term, TermRef};
use rustc_hash::FxHasher;
use std::fmt::Debug;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};

/// Translates between node ids and RDF terms.
///
/// Filter and bind expressions compute on RDF terms while tuples only contain node ids. A
/// resolver is therefore required for evaluating expressions that inspect the value of a node.
pub trait ValueResolver: Debug + Send + Sync {
    /// Returns the term of the given `node`, or [None] if the node is unknown.
    fn globalize(&self, node: NodeId) -> TuplesResult<Option<Term>>;

    /// Returns the node id of `term`, allocating a new (possibly temporary) id if the term is not
    /// yet known.
    fn localize(&self, term: TermRef<'_>) -> TuplesResult<NodeId>;
}

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Maintains a mapping between RDF terms and node ids in memory.
///
/// Ids are allocated by a counter starting at [NodeId::MIN]. The mapping never forgets terms.
#[derive(Debug)]
pub struct MemValueResolver {
    /// Contains the next free node id.
    next_id: AtomicU64,
    /// Maps node ids to their terms.
    id2term: DashMap<NodeId, Term, FxBuildHasher>,
    /// Maps terms to their node id.
    term2id: DashMap<Term, NodeId, FxBuildHasher>,
}

impl Default for MemValueResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemValueResolver {
    /// Creates a new empty [MemValueResolver].
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(NodeId::MIN.as_u64()),
            id2term: DashMap::with_hasher(BuildHasherDefault::default()),
            term2id: DashMap::with_hasher(BuildHasherDefault::default()),
        }
    }

    /// Returns the node id of `term` without allocating one.
    pub fn get(&self, term: TermRef<'_>) -> Option<NodeId> {
        self.term2id.get(&term.into_owned()).map(|id| *id)
    }

    /// Returns the number of known terms.
    pub fn len(&self) -> usize {
        self.term2id.len()
    }

    /// Returns true if no term is known.
    pub fn is_empty(&self) -> bool {
        self.term2id.is_empty()
    }

    fn allocate(&self) -> TuplesResult<NodeId> {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        NodeId::try_from(raw).map_err(|e| TuplesError::evaluation_with_cause("Out of ids.", e))
    }
}

impl ValueResolver for MemValueResolver {
    fn globalize(&self, node: NodeId) -> TuplesResult<Option<Term>> {
        Ok(self.id2term.get(&node).map(|term| term.clone()))
    }

    fn localize(&self, term: TermRef<'_>) -> TuplesResult<NodeId> {
        let term = term.into_owned();
        if let Some(id) = self.term2id.get(&term) {
            return Ok(*id);
        }

        let entry = self.term2id.entry(term.clone());
        let id = match entry {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.allocate()?;
                entry.insert(id);
                self.id2term.insert(id, term);
                id
            }
        };
        Ok(id)
    }
}
