//! `stockroom-auth`: pure authorization boundary for the stock core.
//!
//! Identity is issued by an external authentication collaborator; this crate
//! only models the resulting actor (role + optional home facility) and the
//! role-to-permission policy used before any mutation is attempted.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, authorize_in_facility, AuthzError};
pub use permissions::{role_permissions, Permission};
pub use principal::Actor;
pub use roles::Role;
