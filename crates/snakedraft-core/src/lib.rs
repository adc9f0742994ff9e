// Library root: re-exports all modules so integration tests and the binary
// crate can access the public API.

pub mod app;
pub mod client;
pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod gods;
pub mod protocol;
pub mod store;
pub mod sync;
