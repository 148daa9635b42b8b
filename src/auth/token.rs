//! Token secrets and token endpoint payloads.

pub mod response;
pub mod secret;
