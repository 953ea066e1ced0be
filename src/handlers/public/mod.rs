// handlers/public/mod.rs - endpoints served without the gateway
mod index;

pub use index::{health, root};
