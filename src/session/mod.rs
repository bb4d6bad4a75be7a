pub mod cache;
pub mod manager;
pub mod persistence;
pub mod publisher;

#[cfg(test)]
mod tests;

pub use cache::*;
pub use manager::*;
pub use persistence::*;
pub use publisher::*;
