//! Backend-agnostic query model
//!
//! Pure data describing what to fetch: filter conditions ([`Filter`],
//! [`FilterOperator`]), sort keys ([`Order`], [`Orders`]) and the bundle
//! that carries them ([`FindOptions`]). Translation into native store
//! operations lives with the store adapter, not here.

mod filter;
mod order;
mod options;

pub use filter::{Filter, FilterOperator};
pub use options::FindOptions;
pub use order::{Order, Orders};
