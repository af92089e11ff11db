#[macro_use]
extern crate async_trait;

mod config;
mod fetch;
mod key;
mod service;

pub use config::BatcherConfig;
pub use fetch::{AbstractDirectory, FetchOptions, ReferenceDirectory};
pub use key::CanonicalKey;
pub use service::DirectoryBatcher;
