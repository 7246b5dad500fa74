pub mod store_ports;

pub use store_ports::*;
