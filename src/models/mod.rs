pub mod admin;
pub mod network;
pub mod node;
pub mod reminder;
pub mod service;
pub mod system;
pub mod usage;
pub mod user;
