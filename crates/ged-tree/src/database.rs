use std::{
    fmt::{self, Display},
    io,
};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{
    arena::Arena,
    builder::{DuplicatePointers, error::BuildError},
    record::{Record, RecordId, RecordRef},
    tokenizer::descriptor::RecordDescriptor,
};

/// The record forest plus the pointer index.
///
/// Roots are kept in source order. The pointer index stores arena ids only, so
/// it never resolves a record outside of the database that owns it.
#[derive(Debug, Default)]
pub struct Database {
    records: Arena<Record>,
    roots: Vec<RecordId>,
    pointers: FxHashMap<SmolStr, RecordId>,
    duplicate_pointers: DuplicatePointers,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_options(capacity: usize, duplicate_pointers: DuplicatePointers) -> Self {
        Self {
            records: Arena::new(capacity),
            roots: Vec::new(),
            pointers: FxHashMap::default(),
            duplicate_pointers,
        }
    }

    pub fn get(&self, id: RecordId) -> Option<RecordRef<'_>> {
        self.records
            .get(id)
            .map(|record| RecordRef::new(self, id, record))
    }

    /// Resolves a pointer such as `@I1@` to the record that declared it.
    pub fn lookup(&self, pointer: &str) -> Option<RecordRef<'_>> {
        self.pointers.get(pointer).and_then(|id| self.get(*id))
    }

    /// Root records in source order.
    pub fn roots(&self) -> impl Iterator<Item = RecordRef<'_>> {
        self.roots.iter().filter_map(|id| self.get(*id))
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of records reachable from the roots.
    pub fn record_count(&self) -> usize {
        self.roots().map(|root| root.node_count()).sum()
    }

    /// Number of allocated records, attached or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indexed pointers with the record each one resolves to, in no particular order.
    pub fn pointers(&self) -> impl Iterator<Item = (&str, RecordRef<'_>)> {
        self.pointers
            .iter()
            .filter_map(|(pointer, id)| self.get(*id).map(|record| (pointer.as_str(), record)))
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Every record tagged `tag`: per root, the root itself when it matches,
    /// then its breadth-first descendants.
    pub fn find_records(&self, tag: &str) -> Vec<RecordRef<'_>> {
        self.roots()
            .flat_map(|root| {
                let head = (root.tag() == tag).then_some(root);
                head.into_iter().chain(root.find_descendants(tag))
            })
            .collect()
    }

    /// Renders the whole forest back to the line format.
    pub fn as_string(&self) -> String {
        self.roots().map(|root| root.as_string()).collect()
    }

    /// Writes the whole forest, root by root, to `writer`.
    pub fn write<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        for root in self.roots() {
            writer.write_all(root.as_string().as_bytes())?;
        }
        writer.flush()
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.roots().map(|root| root.to_json()).collect())
    }

    /// Creates a record from `descriptor`.
    ///
    /// With a parent the record is attached as its last child and its level is
    /// forced to `parent.level + 1`; without one it becomes a new root.
    pub fn insert(
        &mut self,
        descriptor: RecordDescriptor,
        parent: Option<RecordId>,
    ) -> Result<RecordId, BuildError> {
        if parent.is_some_and(|parent| !self.records.owns(parent)) {
            return Err(BuildError::UnknownRecord);
        }

        let id = self.alloc(descriptor)?;
        match parent {
            Some(parent) => self.attach(parent, id),
            None => self.register_root(id),
        }

        Ok(id)
    }

    /// Re-parents `child` under `parent` and re-levels the moved subtree.
    ///
    /// The child is removed from its previous parent, or from the roots.
    pub fn add_child(&mut self, parent: RecordId, child: RecordId) -> Result<RecordId, BuildError> {
        if !self.records.owns(parent) || !self.records.owns(child) {
            return Err(BuildError::UnknownRecord);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(BuildError::InvalidAttachment);
        }

        match self.records[child].parent.take() {
            Some(previous) => self.records[previous].children.retain(|id| *id != child),
            None => self.roots.retain(|id| *id != child),
        }
        self.attach(parent, child);

        let mut pending = vec![child];
        while let Some(id) = pending.pop() {
            let level = self.records[id].level;
            let children = self.records[id].children.clone();
            for grandchild in &children {
                self.records[*grandchild].level = level + 1;
            }
            pending.extend(children);
        }

        Ok(child)
    }

    /// Fails when `pointer` is already indexed and duplicates are rejected.
    pub(crate) fn check_pointer(&self, pointer: Option<&str>) -> Result<(), BuildError> {
        match pointer {
            Some(pointer)
                if !pointer.is_empty()
                    && self.duplicate_pointers == DuplicatePointers::Reject
                    && self.pointers.contains_key(pointer) =>
            {
                Err(BuildError::DuplicatePointer(pointer.into()))
            }
            _ => Ok(()),
        }
    }

    /// Allocates a detached record and indexes its pointer.
    pub(crate) fn alloc(&mut self, descriptor: RecordDescriptor) -> Result<RecordId, BuildError> {
        self.check_pointer(descriptor.pointer.as_deref())?;
        let pointer = descriptor.pointer.clone().filter(|p| !p.is_empty());

        let id = self.records.alloc(Record::from(descriptor));
        if let Some(pointer) = pointer
            && self.pointers.insert(pointer.clone(), id).is_some()
        {
            tracing::warn!(%pointer, "duplicate pointer, the later record wins");
        }

        Ok(id)
    }

    /// Appends `child` to `parent` and forces `child.level = parent.level + 1`.
    pub(crate) fn attach(&mut self, parent: RecordId, child: RecordId) {
        let level = self.records[parent].level + 1;
        self.records[parent].children.push(child);

        let record = &mut self.records[child];
        record.parent = Some(parent);
        record.level = level;
    }

    pub(crate) fn register_root(&mut self, id: RecordId) {
        self.roots.push(id);
    }

    pub(crate) fn level_of(&self, id: RecordId) -> usize {
        self.records[id].level
    }

    pub(crate) fn parent_of(&self, id: RecordId) -> Option<RecordId> {
        self.records[id].parent
    }

    fn is_ancestor_or_self(&self, ancestor: RecordId, id: RecordId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.records[id].parent;
        }
        false
    }
}

impl Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in self.roots() {
            root.render(f)?;
        }
        Ok(())
    }
}
