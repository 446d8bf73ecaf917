pub mod config;
pub mod error;
pub mod types;

pub use config::ChtoConfig;
pub use error::{ChtoError, ChtoResult};
pub use types::{Algorithm, Cipher};
