use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown animation index: {index}")]
    UnknownAnimationIndex { index: usize },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{attachment}' for slot '{slot}'")]
    UnknownAttachment { slot: String, attachment: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("invalid skeleton data: {message}")]
    InvalidData { message: String },
}
