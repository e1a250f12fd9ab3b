use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmitError>;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("Execution context name is empty")]
    EmptyContext,

    /// Entries built outside the loaders may skip name assignment
    #[error("Cannot emit {kind} without a name")]
    UnnamedEntry { kind: &'static str },
}
