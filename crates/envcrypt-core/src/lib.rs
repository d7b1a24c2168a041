pub mod config;
pub mod encoding;
pub mod error;
pub mod types;

pub use error::{EnvcryptError, EnvcryptResult};
