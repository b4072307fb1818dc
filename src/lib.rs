//! Kitchen order-fulfillment engine: workers contend for shared stations to
//! turn a stream of recipe orders into served plates.

pub mod assembly;
pub mod config;
pub mod cooking;
pub mod cutting;
pub mod demand;
pub mod error;
pub mod kitchen;
pub mod logging;
pub mod order_book;
pub mod recipe;
pub mod resource;
pub mod serve;
pub mod sim;
pub mod staging;
pub mod stats;
pub mod supply;
pub mod types;
pub mod watchdog;
pub mod worker;

pub use config::KitchenConfig;
pub use error::KitchenError;
pub use kitchen::{Kitchen, StopMode};
