pub mod error;
pub mod shutdown;

pub use error::*;
pub use shutdown::*;
