//! Infrastructure layer: sockets, configuration files, and frame sources.

pub mod network;
pub mod source;
pub mod storage;
