//! Wire and domain types shared between the portal client and its hosts.

pub mod domain;
pub mod error;
pub mod protocol;
