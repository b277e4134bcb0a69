//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod accountant;
mod deadline;
pub mod payment_sync;
pub mod service;

pub use accountant::Accountant;
pub use payment_sync::PaymentStateSync;
pub use service::{DisperserClient, DisperserClientBuilder};
