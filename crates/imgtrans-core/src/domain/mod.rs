//! Domain types shared by the sender and receiver.
//!
//! # Sub-modules
//!
//! - **`endpoint`** – Where a sender binds or a receiver connects: an IPv4
//!   address plus a port, given either as a dotted quad or as a network
//!   interface name resolved at construction time.
//!
//! - **`registry`** – The UDP sender's set of receivers that frames are
//!   fanned out to.
//!
//! - **`state`** – The TCP sender's connection state machine.

pub mod endpoint;
pub mod registry;
pub mod state;
