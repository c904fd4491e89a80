pub mod github;
pub mod host;
pub mod mock;
pub mod types;

pub use host::{HostError, HostErrorKind, VcsHost};
pub use mock::{HostOp, MockHost};
