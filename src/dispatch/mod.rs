//! Outbound HTTP calls and response normalization.
//!
//! Every call the application makes goes through [`Dispatcher`], which
//! injects the session credential when asked to and folds the backend's
//! inconsistent response shapes into `Result<Value, SessionError>`.

pub mod dispatcher;
pub mod normalize;
pub mod transport;
pub mod types;


pub use dispatcher::*;
pub use normalize::*;
pub use transport::*;
pub use types::*;
