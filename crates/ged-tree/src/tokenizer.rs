//! Splits one raw line into a [`RecordDescriptor`].
//!
//! A line reads `<level> [@pointer@] <tag> [data...] [@reference@]`. Only the
//! level is validated; everything after it degrades to a best-effort split.
//! A single `@…@` token right after the tag is always read as a reference, so
//! one-word data shaped like a reference cannot be represented.
pub mod descriptor;
pub mod error;

use descriptor::{Level, RecordDescriptor};
use error::TokenizeError;
use nom::{
    IResult, Parser,
    bytes::complete::take_till,
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    sequence::{preceded, terminated},
};

fn word(input: &str) -> IResult<&str, &str> {
    take_till(char::is_whitespace).parse(input)
}

fn pointer(input: &str) -> IResult<&str, &str> {
    recognize(preceded(char('@'), word)).parse(input)
}

/// `(level, pointer, tag)` followed by the untouched tail.
fn head(input: &str) -> IResult<&str, (&str, Option<&str>, &str)> {
    (
        terminated(word, multispace0),
        opt(terminated(pointer, multispace0)),
        terminated(word, multispace0),
    )
        .parse(input)
}

/// Tokenizes a single line. Surrounding whitespace and the line terminator are ignored.
pub fn tokenize(raw_line: &str) -> Result<RecordDescriptor, TokenizeError> {
    let line = raw_line.trim();
    let (tail, (level_token, pointer, tag)) =
        head(line).map_err(|_| TokenizeError::MalformedLevel(line.to_string()))?;
    let level = parse_level(level_token)?;

    let (body, maybe_ref) = split_last_word(tail.trim_end());
    let (data, reference) = if is_reference(maybe_ref) && Some(maybe_ref) != pointer {
        (body.to_string(), Some(maybe_ref.into()))
    } else if body.is_empty() {
        (maybe_ref.to_string(), None)
    } else if maybe_ref.is_empty() {
        (body.to_string(), None)
    } else {
        (format!("{body} {maybe_ref}"), None)
    };

    Ok(RecordDescriptor {
        level,
        pointer: pointer.map(Into::into),
        tag: tag.into(),
        data,
        reference,
    })
}

/// Returns `true` for an `@…@` token with at least one character between the delimiters.
///
/// A lone `@` or the escaped `@@` is data, not an empty reference.
pub fn is_reference(token: &str) -> bool {
    token.len() >= 3 && token.starts_with('@') && token.ends_with('@')
}

fn parse_level(token: &str) -> Result<Level, TokenizeError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenizeError::MalformedLevel(token.to_string()));
    }

    token
        .parse::<Level>()
        .map_err(|_| TokenizeError::MalformedLevel(token.to_string()))
}

/// Splits on the last whitespace run.
fn split_last_word(text: &str) -> (&str, &str) {
    match text.rfind(char::is_whitespace) {
        Some(pos) => {
            let (body, last) = text.split_at(pos);
            (body.trim_end(), last.trim_start())
        }
        None => ("", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::tag_only("0 HEAD", RecordDescriptor::new(0, "HEAD"))]
    #[case::tag_and_data("1 SOUR SyniumFamilyTree", RecordDescriptor::new(1, "SOUR").with_data("SyniumFamilyTree"))]
    #[case::multi_word_data(
        "1 NAME Andrew /Bear/",
        RecordDescriptor::new(1, "NAME").with_data("Andrew /Bear/")
    )]
    #[case::pointer("0 @I14938282@ INDI", RecordDescriptor::new(0, "INDI").with_pointer("@I14938282@"))]
    #[case::lone_reference("1 SOUR @S68885317@", RecordDescriptor::new(1, "SOUR").with_reference("@S68885317@"))]
    #[case::data_and_reference(
        "2 NOTE see also @N1@",
        RecordDescriptor::new(2, "NOTE").with_data("see also").with_reference("@N1@")
    )]
    #[case::pointer_data_reference(
        "0 @N2@ NOTE copy of @N1@",
        RecordDescriptor::new(0, "NOTE").with_pointer("@N2@").with_data("copy of").with_reference("@N1@")
    )]
    #[case::email_is_data("1 ADDR daveshawley@gmail.com", RecordDescriptor::new(1, "ADDR").with_data("daveshawley@gmail.com"))]
    #[case::level_only("3", RecordDescriptor::new(3, ""))]
    #[case::pointer_only("0 @I1@", RecordDescriptor::new(0, "").with_pointer("@I1@"))]
    #[case::surrounding_whitespace("  1 CHAR UTF-8 \r\n", RecordDescriptor::new(1, "CHAR").with_data("UTF-8"))]
    #[case::whitespace_runs(
        "1   TITL   Three   Bears",
        RecordDescriptor::new(1, "TITL").with_data("Three Bears")
    )]
    #[case::inner_runs_kept(
        "1 TITL a  b c",
        RecordDescriptor::new(1, "TITL").with_data("a  b c")
    )]
    #[case::tabs("1\tDATE\tOct 1981", RecordDescriptor::new(1, "DATE").with_data("Oct 1981"))]
    #[case::escaped_at_is_data("1 NOTE @@", RecordDescriptor::new(1, "NOTE").with_data("@@"))]
    #[case::lone_at_is_data("1 NOTE a @", RecordDescriptor::new(1, "NOTE").with_data("a @"))]
    #[case::reference_equal_to_pointer_is_data(
        "0 @X@ NOTE @X@",
        RecordDescriptor::new(0, "NOTE").with_pointer("@X@").with_data("@X@")
    )]
    #[case::leading_at_in_data("1 NOTE @home now", RecordDescriptor::new(1, "NOTE").with_data("@home now"))]
    #[case::large_level("42 DEEP", RecordDescriptor::new(42, "DEEP"))]
    fn test_tokenize(#[case] line: &str, #[case] expected: RecordDescriptor) {
        assert_eq!(tokenize(line), Ok(expected));
    }

    #[rstest]
    #[case::empty("", "")]
    #[case::blank("   ", "")]
    #[case::non_numeric("X HEAD", "X")]
    #[case::negative("-1 HEAD", "-1")]
    #[case::plus_sign("+1 HEAD", "+1")]
    #[case::mixed("1a HEAD", "1a")]
    #[case::overflow("99999999999999999999999 HEAD", "99999999999999999999999")]
    fn test_tokenize_malformed_level(#[case] line: &str, #[case] token: &str) {
        assert_eq!(
            tokenize(line),
            Err(TokenizeError::MalformedLevel(token.to_string()))
        );
    }

    #[rstest]
    #[case("@I1@", true)]
    #[case("@x@", true)]
    #[case("@@", false)]
    #[case("@", false)]
    #[case("@I1", false)]
    #[case("I1@", false)]
    #[case("", false)]
    fn test_is_reference(#[case] token: &str, #[case] expected: bool) {
        assert_eq!(is_reference(token), expected);
    }

    #[rstest]
    #[case::lone_reference("1 SOUR @S1@")]
    #[case::pointer_tag_data("0 @F1@ FAM married")]
    #[case::everything("2 @N1@ NOTE see @S1@")]
    #[case::level_only("4")]
    fn test_render_then_tokenize(#[case] line: &str) {
        let descriptor = tokenize(line).unwrap();
        assert_eq!(descriptor.to_string(), line);
        assert_eq!(tokenize(&descriptor.to_string()), Ok(descriptor));
    }
}
