//! List query building: filters, sorting and pagination.

mod filter;
mod pagination;
pub use filter::*;
pub use pagination::*;
