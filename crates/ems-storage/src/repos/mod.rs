//! Entity repositories.
//!
//! Each repository owns the SQL for one relational entity and applies the
//! caller's [`ems_core::RoleScope`] through [`crate::scope::ScopePredicate`].
//! Update statements use `COALESCE($n, column)` so absent body fields leave
//! columns untouched.

pub mod attendance;
pub mod departments;
pub mod employees;
pub mod hardware;
pub mod integrations;
pub mod licenses;
pub mod software;
pub mod tickets;
pub mod user_role_maps;
