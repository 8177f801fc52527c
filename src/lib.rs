#![forbid(unsafe_code)]

//! VidTube: the storage, domain services and asset handling behind the
//! `backend` HTTP server.

pub mod assets;
pub mod config;
pub mod error;
pub mod identity;
pub mod ids;
pub mod models;
pub mod pagination;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
