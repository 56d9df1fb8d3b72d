#[derive(thiserror::Error, Debug)]
pub enum NdrError {
    #[error(
        "Unexpected end of stub data at offset {offset}: needed {needed} bytes, {available} available"
    )]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Binary read/write error: {0}")]
    BinRWError(#[from] binrw::Error),

    #[error("Null reference pointer")]
    NullRefPointer,

    #[error("Invalid count: {0}")]
    InvalidCount(String),

    #[error("Invalid discriminant: {0:#x}")]
    InvalidDiscriminant(u64),

    #[error("Invalid string: {0}")]
    InvalidString(&'static str),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, NdrError>;
