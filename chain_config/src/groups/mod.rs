pub mod client;
pub mod enumeration;
pub mod log;
pub mod reconstruction;
