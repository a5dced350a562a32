use smol_str::SmolStr;
use thiserror::Error;

use crate::tokenizer::descriptor::Level;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Level {level} has no open ancestor to attach to")]
    StructuralUnderflow { level: Level },
    #[error("Duplicate pointer `{0}`")]
    DuplicatePointer(SmolStr),
    #[error("Cannot attach a record under itself or one of its descendants")]
    InvalidAttachment,
    #[error("Record does not belong to this database")]
    UnknownRecord,
}
