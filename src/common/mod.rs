pub mod activations;
pub mod config;
pub mod error;
pub mod resources;

pub use activations::Activation;
pub use config::Config;
