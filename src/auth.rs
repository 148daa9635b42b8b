//! Credential state, marketplace sites, and token models.

pub mod credentials;
pub mod site;
pub mod token;

pub use credentials::*;
pub use site::*;
pub use token::{response::*, secret::*};
