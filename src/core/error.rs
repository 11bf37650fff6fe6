use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtnError {
    #[error("Context is not initialized")]
    ContextUninitialized,

    #[error("Invalid context state: {0}")]
    InvalidContextState(&'static str),

    #[error("Invalid domain structure: {0}")]
    InvalidStructure(String),

    #[error("Builder error: {0}")]
    Builder(String),

    #[error("Slot {0} is already declared in this domain")]
    DuplicateSlot(i32),

    #[error("A primitive task can only carry a single operator")]
    OperatorAlreadySet,
}

pub type Result<T> = std::result::Result<T, HtnError>;
