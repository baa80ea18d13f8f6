pub mod ac;
pub mod equations;
pub mod error;
pub mod network;
