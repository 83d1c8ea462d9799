#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod rotation;
pub mod shuffle;

pub use error::Error;
pub use rotation::StyleRotation;
pub use shuffle::{ShuffledQuestion, shuffle_question};
