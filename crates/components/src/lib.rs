//! `components` crate — the `Component` trait and the envelope types every
//! managed service speaks.
//!
//! Every service that wants an engine-managed lifecycle or to be the target
//! of a workflow step must implement [`Component`]. The engine crate only
//! ever talks to services through this trait object.

pub mod error;
pub mod response;
pub mod traits;
pub mod mock;

pub use error::ComponentError;
pub use response::ServiceResponse;
pub use traits::{Component, ComponentRequest, ComponentStatus};
