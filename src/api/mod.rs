//! Typed wrappers over the authenticated request client.
//!
//! Each module covers one backend resource. All of them delegate to
//! [`ApiClient`](crate::client::ApiClient); none carry their own fetch or
//! retry logic.

pub mod brands;
pub mod inventory;

pub use brands::BrandsApi;
pub use inventory::InventoryApi;
