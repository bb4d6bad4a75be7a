pub mod payload;
pub mod types;
pub mod wire;


pub use payload::*;
pub use types::*;
