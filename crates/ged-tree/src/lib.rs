//! `ged-tree` rebuilds the record forest of a GEDCOM-style genealogy file.
//!
//! Every input line carries a level number. Lines are tokenized into a
//! [`RecordDescriptor`] and fed to a [`TreeBuilder`], which uses a stack of open
//! ancestors to attach each record to its parent and collects the finished
//! roots into a [`Database`] together with a pointer index.
//!
//! ## Examples
//!
//! ```rs
//! let db = ged_tree::parse("0 @I1@ INDI\n1 NAME Andrew /Bear/\n1 FAMS @F1@\n0 TRLR").unwrap();
//!
//! assert_eq!(db.root_count(), 2);
//! assert_eq!(db.record_count(), 4);
//!
//! let indi = db.lookup("@I1@").unwrap();
//! assert_eq!(indi.find_first_child("NAME").unwrap().data(), "Andrew /Bear/");
//! assert_eq!(db.as_string(), "0 @I1@ INDI\n1 NAME Andrew /Bear/\n1 FAMS @F1@\n0 TRLR\n");
//! ```
mod arena;
mod builder;
mod database;
mod error;
mod record;
mod tokenizer;

pub use arena::{Arena, ArenaId};
pub use builder::error::BuildError;
pub use builder::{DuplicatePointers, Options, TreeBuilder};
pub use database::Database;
pub use error::{Error, InnerError};
pub use record::{Record, RecordId, RecordRef};
pub use tokenizer::descriptor::{Level, RecordDescriptor};
pub use tokenizer::error::TokenizeError;
pub use tokenizer::{is_reference, tokenize};

/// Parses a whole document with the default [`Options`].
#[allow(clippy::result_large_err)]
pub fn parse(input: &str) -> Result<Database, Error> {
    parse_with_options(input, Options::default())
}

#[allow(clippy::result_large_err)]
pub fn parse_with_options(input: &str, options: Options) -> Result<Database, Error> {
    parse_lines_with_options(input.lines(), options)
}

/// Parses an already split line sequence with the default [`Options`].
#[allow(clippy::result_large_err)]
pub fn parse_lines<I, S>(lines: I) -> Result<Database, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_lines_with_options(lines, Options::default())
}

#[allow(clippy::result_large_err)]
pub fn parse_lines_with_options<I, S>(lines: I, options: Options) -> Result<Database, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = TreeBuilder::new(options);
    for line in lines {
        builder.push_line(line.as_ref())?;
    }
    Ok(builder.finish())
}

/// Builds a database from descriptors produced elsewhere, e.g. by [`tokenize`].
#[allow(clippy::result_large_err)]
pub fn build<I>(descriptors: I) -> Result<Database, Error>
where
    I: IntoIterator<Item = RecordDescriptor>,
{
    let mut builder = TreeBuilder::default();
    for descriptor in descriptors {
        builder.push(descriptor)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("", 0, 0)]
    #[case::head(
        "0 HEAD
1 SOUR SyniumFamilyTree
2 NAME MacFamilyTree
2 VERS 8.3.5
1 CHAR UTF-8
1 GEDC
2 VERS 5.5.1
2 FORM LINEAGE-LINKED
1 PLAC
2 FORM Place,County,State,Country",
        1,
        10
    )]
    #[case::crlf("0 HEAD\r\n1 CHAR UTF-8\r\n0 TRLR\r\n", 2, 3)]
    fn test_parse(#[case] input: &str, #[case] roots: usize, #[case] records: usize) {
        let db = parse(input).unwrap();

        assert_eq!(db.root_count(), roots);
        assert_eq!(db.record_count(), records);
    }

    #[test]
    fn test_parse_lines_accepts_owned_strings() {
        let lines = vec!["0 @A@ INDI".to_string(), "1 NAME Bob".to_string()];
        let db = parse_lines(lines).unwrap();

        assert_eq!(db.lookup("@A@").unwrap().node_count(), 2);
    }

    #[test]
    fn test_build_from_descriptors() {
        let db = build([
            RecordDescriptor::new(0, "INDI").with_pointer("@I1@"),
            RecordDescriptor::new(1, "FAMC").with_reference("@F1@"),
        ])
        .unwrap();

        assert_eq!(db.as_string(), "0 @I1@ INDI\n1 FAMC @F1@\n");
    }

    #[test]
    fn test_parse_aborts_without_partial_database() {
        let err = parse("0 HEAD\n1 CHAR UTF-8\nbroken").unwrap_err();

        assert_eq!(err.line_index, 2);
        assert_eq!(
            err.cause,
            InnerError::Tokenize(TokenizeError::MalformedLevel("broken".to_string()))
        );
    }

    #[test]
    fn test_parse_with_options_skips_blank_lines() {
        let options = Options {
            skip_blank_lines: true,
            ..Default::default()
        };
        let db = parse_with_options("0 HEAD\n\n1 CHAR UTF-8\n\n", options).unwrap();

        assert_eq!(db.record_count(), 2);
    }
}
