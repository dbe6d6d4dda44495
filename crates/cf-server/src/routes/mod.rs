//! Route handlers for the HTTP API.

pub mod archive;
pub mod clips;
pub mod health;
pub mod history;
pub mod info;
pub mod openapi;
pub mod proxy;
pub mod tools;
