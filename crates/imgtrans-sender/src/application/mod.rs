//! Application layer use cases for the sender.
//!
//! - **`stream_frames`** – pulls frames from a source and pushes them
//!   through an [`ImageSender`](imgtrans_core::ImageSender), recovering from
//!   lost TCP peers and discovering new UDP receivers as it goes.

pub mod stream_frames;
