pub mod client;
pub mod source;

pub use client::{ApiError, LocationSearch, WarehouseClient};
pub use source::{load_overlay, LocationSource};
