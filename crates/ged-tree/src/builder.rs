//! Level-stack reconstruction of the record forest.
//!
//! The builder keeps the chain of open ancestors on an explicit stack. Incoming
//! levels are compared with the stored level of the stack top, which is always
//! `parent.level + 1` once attached, so a line that skips levels is attached one
//! level below its parent and later lines are measured against that.
pub mod error;

use error::BuildError;

use crate::{
    database::Database,
    error::{Error, InnerError},
    record::RecordId,
    tokenizer::{descriptor::RecordDescriptor, tokenize},
};

/// What to do when a pointer is declared twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePointers {
    /// The later declaration replaces the earlier one in the index.
    #[default]
    LastWins,
    /// Abort the parse.
    Reject,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub duplicate_pointers: DuplicatePointers,
    /// Ignore empty lines instead of failing with a malformed level.
    pub skip_blank_lines: bool,
    /// Initial record capacity of the arena.
    pub capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            duplicate_pointers: DuplicatePointers::default(),
            skip_blank_lines: false,
            capacity: 1024,
        }
    }
}

/// Incremental forest builder. Feeding descriptors one at a time gives the
/// same database as building from the whole sequence at once.
///
/// A rejected line leaves the builder as it was, so pushing may continue.
#[derive(Debug)]
pub struct TreeBuilder {
    database: Database,
    stack: Vec<RecordId>,
    options: Options,
    line_index: usize,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl TreeBuilder {
    pub fn new(options: Options) -> Self {
        Self {
            database: Database::with_options(options.capacity, options.duplicate_pointers),
            stack: Vec::new(),
            options,
            line_index: 0,
        }
    }

    /// Number of lines consumed so far, skipped blank lines included.
    pub fn lines_consumed(&self) -> usize {
        self.line_index
    }

    /// Tokenizes `raw_line` and adds the resulting record.
    #[allow(clippy::result_large_err)]
    pub fn push_line(&mut self, raw_line: &str) -> Result<(), Error> {
        let line_index = self.next_line_index();

        if self.options.skip_blank_lines && raw_line.trim().is_empty() {
            tracing::trace!(line_index, "skipping blank line");
            return Ok(());
        }

        let descriptor = tokenize(raw_line)
            .map_err(|e| Error::from_error(line_index, raw_line, InnerError::Tokenize(e)))?;
        self.step(descriptor)
            .map_err(|e| Error::from_error(line_index, raw_line, InnerError::Build(e)))
    }

    /// Adds an already tokenized record.
    #[allow(clippy::result_large_err)]
    pub fn push(&mut self, descriptor: RecordDescriptor) -> Result<(), Error> {
        let line_index = self.next_line_index();
        let line = descriptor.to_string();

        self.step(descriptor)
            .map_err(|e| Error::from_error(line_index, line, InnerError::Build(e)))
    }

    /// Closes the open chain and returns the finished database.
    pub fn finish(mut self) -> Database {
        self.close_root();
        tracing::debug!(
            lines = self.line_index,
            roots = self.database.root_count(),
            records = self.database.len(),
            pointers = self.database.pointer_count(),
            "finished building record forest"
        );
        self.database
    }

    fn next_line_index(&mut self) -> usize {
        let line_index = self.line_index;
        self.line_index += 1;
        line_index
    }

    fn step(&mut self, descriptor: RecordDescriptor) -> Result<(), BuildError> {
        let level = descriptor.level;
        tracing::trace!(level, tag = %descriptor.tag, depth = self.stack.len(), "step");

        self.database.check_pointer(descriptor.pointer.as_deref())?;

        if level == 0 {
            self.close_root();
            let id = self.database.alloc(descriptor)?;
            self.stack.push(id);
            return Ok(());
        }

        let parent = self.parent_for(level)?;
        let id = self.database.alloc(descriptor)?;
        self.database.attach(parent, id);
        self.stack.push(id);

        Ok(())
    }

    /// Picks the parent for a record at `level > 0`, popping closed ancestors.
    /// The stack is left untouched when no parent exists.
    fn parent_for(&mut self, level: usize) -> Result<RecordId, BuildError> {
        let underflow = BuildError::StructuralUnderflow { level };
        let Some(&top) = self.stack.last() else {
            return Err(underflow);
        };
        let top_level = self.database.level_of(top);

        if level > top_level {
            Ok(top)
        } else if level == top_level {
            self.database.parent_of(top).ok_or(underflow)
        } else {
            let keep = self
                .stack
                .iter()
                .rposition(|id| self.database.level_of(*id) < level)
                .ok_or(underflow)?;
            self.stack.truncate(keep + 1);
            Ok(self.stack[keep])
        }
    }

    /// Registers the bottom of the stack as a finished root and clears the stack.
    fn close_root(&mut self) {
        if let Some(&root) = self.stack.first() {
            tracing::debug!(
                root = ?self.database.get(root).map(|r| r.tag().to_string()),
                "closing root"
            );
            self.database.register_root(root);
        }
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn build_lines(lines: &[&str]) -> Result<Database, Error> {
        let mut builder = TreeBuilder::default();
        for line in lines {
            builder.push_line(line)?;
        }
        Ok(builder.finish())
    }

    fn tags(db: &Database) -> Vec<String> {
        db.roots()
            .map(|root| {
                root.children()
                    .map(|c| c.tag().to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect()
    }

    #[test]
    fn test_single_root() {
        let db = build_lines(&["0 HEAD", "1 SOUR X", "2 NAME Y", "1 CHAR UTF-8"]).unwrap();
        let head = db.roots().next().unwrap();

        assert_eq!(db.root_count(), 1);
        assert_eq!(db.record_count(), 4);
        assert_eq!(tags(&db), vec!["SOUR,CHAR"]);
        let sour = head.find_first_child("SOUR").unwrap();
        assert_eq!(
            sour.children().map(|c| c.tag()).collect::<Vec<_>>(),
            vec!["NAME"]
        );
    }

    #[test]
    fn test_multiple_roots_and_pointers() {
        let db = build_lines(&["0 @A@ INDI", "1 NAME Bob", "0 @B@ SOUR", "1 TITL Doc"]).unwrap();
        let roots = db.roots().collect::<Vec<_>>();

        assert_eq!(roots.len(), 2);
        assert_eq!(db.record_count(), 4);
        assert_eq!(db.lookup("@A@"), Some(roots[0]));
        assert_eq!(db.lookup("@B@"), Some(roots[1]));
    }

    #[test]
    fn test_child_level_is_forced_to_parent_plus_one() {
        let db = build_lines(&["0 PARENT", "3 CHILD", "7 GRANDCHILD"]).unwrap();

        assert_eq!(db.as_string(), "0 PARENT\n1 CHILD\n2 GRANDCHILD\n");
    }

    #[test]
    fn test_skipped_level_compares_against_stored_level() {
        // CHILD is stored at level 1, so the second level-2 line nests under it.
        let db = build_lines(&["0 PARENT", "2 CHILD", "2 NESTED"]).unwrap();
        let root = db.roots().next().unwrap();

        assert_eq!(root.children().count(), 1);
        assert_eq!(db.as_string(), "0 PARENT\n1 CHILD\n2 NESTED\n");
    }

    #[test]
    fn test_pop_to_shallower_ancestor() {
        let db = build_lines(&[
            "0 ROOT", "1 A", "2 B", "3 C", "2 D", "1 E", "2 F",
        ])
        .unwrap();

        assert_eq!(
            db.as_string(),
            "0 ROOT\n1 A\n2 B\n3 C\n2 D\n1 E\n2 F\n"
        );
        let root = db.roots().next().unwrap();
        let a = root.find_first_child("A").unwrap();
        assert_eq!(
            a.children().map(|c| c.tag()).collect::<Vec<_>>(),
            vec!["B", "D"]
        );
    }

    #[test]
    fn test_level_zero_restart_closes_deep_chain() {
        let db = build_lines(&["0 A", "1 B", "2 C", "3 D", "0 E", "1 F"]).unwrap();

        assert_eq!(db.root_count(), 2);
        assert_eq!(
            db.roots().map(|r| r.node_count()).collect::<Vec<_>>(),
            vec![4, 2]
        );
    }

    #[rstest]
    #[case::first_line_not_root(&["1 ORPHAN"], 0, 1)]
    #[case::deeper_first_line(&["2 ORPHAN", "0 HEAD"], 0, 2)]
    fn test_structural_underflow(
        #[case] lines: &[&str],
        #[case] line_index: usize,
        #[case] level: usize,
    ) {
        let err = build_lines(lines).unwrap_err();

        assert_eq!(err.line_index, line_index);
        assert_eq!(
            err.cause,
            InnerError::Build(BuildError::StructuralUnderflow { level })
        );
    }

    #[test]
    fn test_malformed_level_reports_line() {
        let err = build_lines(&["0 HEAD", "1 SOUR X", "X BAD"]).unwrap_err();

        assert_eq!(err.line_index, 2);
        assert_eq!(err.line, "X BAD");
    }

    #[test]
    fn test_blank_lines() {
        assert!(build_lines(&["0 HEAD", "", "1 CHAR UTF-8"]).is_err());

        let mut builder = TreeBuilder::new(Options {
            skip_blank_lines: true,
            ..Default::default()
        });
        for line in ["0 HEAD", "", "1 CHAR UTF-8", "   "] {
            builder.push_line(line).unwrap();
        }
        assert_eq!(builder.lines_consumed(), 4);
        assert_eq!(builder.finish().record_count(), 2);
    }

    #[test]
    fn test_duplicate_pointer_policies() {
        let lines = ["0 @X@ INDI", "0 @X@ FAM"];

        let db = build_lines(&lines).unwrap();
        assert_eq!(db.lookup("@X@").unwrap().tag(), "FAM");

        let mut builder = TreeBuilder::new(Options {
            duplicate_pointers: DuplicatePointers::Reject,
            ..Default::default()
        });
        builder.push_line(lines[0]).unwrap();
        let err = builder.push_line(lines[1]).unwrap_err();
        assert_eq!(err.line_index, 1);
        assert_eq!(
            err.cause,
            InnerError::Build(BuildError::DuplicatePointer("@X@".into()))
        );
    }

    #[rstest]
    #[case::duplicate_pointer("1 @X@ DUP")]
    #[case::duplicate_root_pointer("0 @X@ DUP")]
    #[case::malformed_level("X BAD")]
    fn test_rejected_line_keeps_open_chain(#[case] rejected: &str) {
        let mut builder = TreeBuilder::new(Options {
            duplicate_pointers: DuplicatePointers::Reject,
            ..Default::default()
        });
        for line in ["0 @X@ INDI", "1 A", "2 B"] {
            builder.push_line(line).unwrap();
        }

        assert!(builder.push_line(rejected).is_err());
        builder.push_line("3 C").unwrap();

        let db = builder.finish();
        assert_eq!(db.root_count(), 1);
        assert_eq!(db.as_string(), "0 @X@ INDI\n1 A\n2 B\n3 C\n");
    }

    #[test]
    fn test_push_descriptors_matches_push_lines() {
        let lines = ["0 @I1@ INDI", "1 NAME Andrew /Bear/", "2 GIVN Andrew", "1 FAMS @F1@", "0 TRLR"];

        let mut builder = TreeBuilder::default();
        for line in lines {
            builder.push(tokenize(line).unwrap()).unwrap();
        }
        let from_descriptors = builder.finish();
        let from_lines = build_lines(&lines).unwrap();

        assert_eq!(from_descriptors.as_string(), from_lines.as_string());
        assert_eq!(from_descriptors.root_count(), from_lines.root_count());
    }

    #[test]
    fn test_empty_input() {
        let db = TreeBuilder::default().finish();
        assert_eq!(db.record_count(), 0);
        assert_eq!(db.root_count(), 0);
    }
}
