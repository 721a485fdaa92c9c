//! Rack layout engine.
//!
//! Turns flat "article stored at location X" records into a complete,
//! gap-filled model of a storage rack ([`builder`]), layers independently
//! fetched attribute datasets onto it ([`overlay`]) and tracks which of those
//! datasets are loaded for the model on screen ([`view`]).

pub mod builder;
pub mod location;
pub mod overlay;
pub mod types;
pub mod view;

pub use builder::RackBuilder;
pub use location::{LocationCode, ParseError};
pub use overlay::{Dimension, InventoryStatus, OverlayData};
pub use types::{
    ArticleClass, ArticleLocationRecord, Bin, Level, Line, RackModel, RejectedLocation,
    RejectionReason, StockStatus,
};
pub use view::{Activation, DimensionStatus, FetchTicket, ViewState};
