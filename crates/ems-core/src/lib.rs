//! Shared types for the EMS server: error taxonomy, the JSON response
//! envelope, pagination, and the caller role model.

pub mod error;
pub mod response;
pub mod role;

pub use error::{CoreError, ErrorCategory, Result};
pub use response::{ApiResponse, Pagination, PaginationQuery};
pub use role::{Role, RoleScope};
