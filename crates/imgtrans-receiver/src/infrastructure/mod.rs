//! Infrastructure layer: sockets, configuration files, and frame output.

pub mod network;
pub mod storage;
