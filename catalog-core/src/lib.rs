pub mod backend;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod endpoints;
pub mod error;
pub mod gateway_util;
pub mod invalidation;
pub mod observability;
pub mod router;
pub mod version;

#[cfg(test)]
mod testing;
