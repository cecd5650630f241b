pub mod error;
pub mod reviewer;

pub use error::*;
pub use reviewer::*;
