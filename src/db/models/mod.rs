//! Database models split into domain-specific modules.

pub mod analytics;
pub mod common;
pub mod favorite;
pub mod offer;
pub mod reference;
pub mod upload;
pub mod user;
pub mod work;

pub use analytics::*;
pub use common::*;
pub use favorite::*;
pub use offer::*;
pub use reference::*;
pub use upload::*;
pub use user::*;
pub use work::*;
