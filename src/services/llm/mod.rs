pub mod client;
pub mod client_config;
pub mod models;
pub mod providers;

pub use client::{ChatModel, ChatStream, InferenceClient, Provider};
pub use client_config::{ClientBuilder, ClientConfig};
pub use models::*;
