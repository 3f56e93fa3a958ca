//! Database models split into domain-specific modules.

pub mod common;
pub mod fast;
pub mod goal;
pub mod user;

pub use common::*;
pub use fast::*;
pub use goal::*;
pub use user::*;
