//! Auth-domain identifiers, credentials, and session records.

pub mod credential;
pub mod id;
pub mod secret;
pub mod session;

pub use credential::*;
pub use id::*;
pub use secret::*;
pub use session::*;
