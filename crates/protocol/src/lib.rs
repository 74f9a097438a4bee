//! Network protocol for Vaultline.
//!
//! Defines the messages exchanged between a predicting client and the
//! authority, the quantization applied to inputs before they are simulated
//! or sent, and a versioned binary codec.

pub mod codec;
pub mod messages;
pub mod quantize;

pub use codec::*;
pub use messages::*;
pub use quantize::*;
