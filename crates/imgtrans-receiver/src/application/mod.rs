//! Application layer use cases for the receiver.
//!
//! - **`receive_frames`** – polls an [`ImageReceiver`](imgtrans_core::ImageReceiver),
//!   counts what arrives, and passes decoded frames to a `FrameSink`.

pub mod receive_frames;
