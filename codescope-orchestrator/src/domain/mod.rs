pub mod acquisition;
pub mod progress;

pub use acquisition::*;
pub use progress::*;
