use std::{
    collections::VecDeque,
    fmt::{self, Display, Write},
};

use smol_str::SmolStr;

use crate::{
    arena::ArenaId,
    database::Database,
    tokenizer::descriptor::{self, Level, RecordDescriptor},
};

pub type RecordId = ArenaId<Record>;

/// A node of the record forest.
///
/// Records live in the [`Database`] arena. The parent owns the ordered list of
/// children; `parent` is a plain id used for upward traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub(crate) level: Level,
    pointer: Option<SmolStr>,
    tag: SmolStr,
    data: String,
    reference: Option<SmolStr>,
    pub(crate) parent: Option<RecordId>,
    pub(crate) children: Vec<RecordId>,
}

impl From<RecordDescriptor> for Record {
    fn from(descriptor: RecordDescriptor) -> Self {
        Self {
            level: descriptor.level,
            pointer: descriptor.pointer.filter(|p| !p.is_empty()),
            tag: descriptor.tag,
            data: descriptor.data,
            reference: descriptor.reference.filter(|r| !r.is_empty()),
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Record {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn pointer(&self) -> Option<&str> {
        self.pointer.as_deref()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn children(&self) -> &[RecordId] {
        &self.children
    }

    /// Content of the line following the level.
    pub fn line_data(&self) -> String {
        descriptor::line_data(
            self.pointer(),
            &self.tag,
            &self.data,
            self.reference(),
        )
    }

    pub fn to_descriptor(&self) -> RecordDescriptor {
        RecordDescriptor {
            level: self.level,
            pointer: self.pointer.clone(),
            tag: self.tag.clone(),
            data: self.data.clone(),
            reference: self.reference.clone(),
        }
    }
}

/// A borrowed view of a record together with the database that owns it.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    database: &'a Database,
    id: RecordId,
    record: &'a Record,
}

impl PartialEq for RecordRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<'a> RecordRef<'a> {
    pub(crate) fn new(database: &'a Database, id: RecordId, record: &'a Record) -> Self {
        Self {
            database,
            id,
            record,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn level(&self) -> Level {
        self.record.level
    }

    pub fn pointer(&self) -> Option<&'a str> {
        self.record.pointer()
    }

    pub fn tag(&self) -> &'a str {
        self.record.tag()
    }

    pub fn data(&self) -> &'a str {
        self.record.data()
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.record.reference()
    }

    pub fn line_data(&self) -> String {
        self.record.line_data()
    }

    pub fn is_root(&self) -> bool {
        self.record.parent.is_none()
    }

    pub fn parent(&self) -> Option<RecordRef<'a>> {
        self.record.parent.and_then(|id| self.database.get(id))
    }

    /// Immediate children in source order.
    pub fn children(&self) -> impl Iterator<Item = RecordRef<'a>> + use<'a> {
        let database = self.database;
        self.record
            .children
            .iter()
            .filter_map(move |id| database.get(*id))
    }

    /// Lazily yields the immediate children whose tag equals `tag`.
    pub fn children_by_tag<'t>(
        &self,
        tag: &'t str,
    ) -> impl Iterator<Item = RecordRef<'a>> + use<'a, 't> {
        self.children().filter(move |child| child.tag() == tag)
    }

    pub fn find_first_child(&self, tag: &str) -> Option<RecordRef<'a>> {
        self.children().find(|child| child.tag() == tag)
    }

    /// Descendants matching `tag` in breadth-first order, excluding `self`.
    pub fn find_descendants(&self, tag: &str) -> Vec<RecordRef<'a>> {
        let mut found = Vec::new();
        let mut queue = self.children().collect::<VecDeque<_>>();

        while let Some(record) = queue.pop_front() {
            if record.tag() == tag {
                found.push(record);
            }
            queue.extend(record.children());
        }

        found
    }

    /// Number of records in the subtree rooted here, `self` included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![*self];

        while let Some(record) = pending.pop() {
            count += 1;
            pending.extend(record.children());
        }

        count
    }

    /// The subtree rendered back to the line format, one `\n`-terminated line per record.
    pub fn as_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render(&mut out);
        out
    }

    /// Pre-order walk over an explicit stack; nesting depth is bounded only by the input.
    pub(crate) fn render(&self, out: &mut impl Write) -> fmt::Result {
        let mut pending = vec![*self];

        while let Some(record) = pending.pop() {
            descriptor::write_line(
                out,
                record.level(),
                record.pointer(),
                record.tag(),
                record.data(),
                record.reference(),
            )?;
            out.write_char('\n')?;
            pending.extend(record.children_rev());
        }

        Ok(())
    }

    fn children_rev(&self) -> impl Iterator<Item = RecordRef<'a>> + use<'a> {
        let database = self.database;
        self.record
            .children
            .iter()
            .rev()
            .filter_map(move |id| database.get(*id))
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Value {
        // Pre-order with the slot of each parent, then objects are assembled bottom-up.
        let mut order: Vec<(RecordRef<'a>, Option<usize>)> = Vec::new();
        let mut pending = vec![(*self, None)];
        while let Some((record, parent)) = pending.pop() {
            let slot = order.len();
            order.push((record, parent));
            pending.extend(record.children_rev().map(|child| (child, Some(slot))));
        }

        let mut children: Vec<Vec<serde_json::Value>> = vec![Vec::new(); order.len()];
        let mut value = serde_json::Value::Null;
        for (slot, (record, parent)) in order.into_iter().enumerate().rev() {
            let mut record_children = std::mem::take(&mut children[slot]);
            record_children.reverse();
            value = serde_json::json!({
                "level": record.level(),
                "pointer": record.pointer(),
                "tag": record.tag(),
                "data": record.data(),
                "reference": record.reference(),
                "children": record_children,
            });
            if let Some(parent) = parent {
                children[parent].push(std::mem::take(&mut value));
            }
        }

        value
    }
}

impl Display for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f)
    }
}
