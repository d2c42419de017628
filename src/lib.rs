pub mod cart;
pub mod catalog;
pub mod config;
pub mod detection;
pub mod server;

pub use config::Config;
pub use detection::{Detection, Detector, ObjectModel};
pub use server::{create_app, AppState};
