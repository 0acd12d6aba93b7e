//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod batch;
pub mod health;
pub mod loans;
pub mod model;
pub mod profile;
pub mod reports;
pub mod score;
pub mod sentiment;
pub mod users;

// Re-export all handlers for use in router
pub use audit::*;
pub use batch::*;
pub use health::*;
pub use loans::*;
pub use model::*;
pub use profile::*;
pub use reports::*;
pub use score::*;
pub use sentiment::*;
pub use users::*;
