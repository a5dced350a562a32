use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizeError {
    #[error("Malformed level `{0}`")]
    MalformedLevel(String),
}
