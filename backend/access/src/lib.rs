//! Role-based access control for the coaching CRM.
//!
//! ```text
//! Session ──resolve_principal──► Principal { id, role }
//!                                      │
//!                               CapabilityMatrix
//!                                      │
//!                                      ▼
//!                     CapabilityStatement ──can(resource, verb)──► bool
//! ```
//!
//! Everything here is pure. Sessions come from the auth provider and are
//! looked up by the server; this crate only interprets them.

pub mod capability;
pub mod matrix;
pub mod role;
pub mod session;

pub use capability::{CapabilityStatement, Resource, Verb, Verbs, can};
pub use matrix::{CapabilityMatrix, statement_for, statement_for_name};
pub use role::Role;
pub use session::{NoSession, Principal, Session, SessionUser, resolve_principal, statement_for_session};
