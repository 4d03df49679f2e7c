//! # RF Link Frames
//!
//! The fixed 8-byte over-the-air frame exchanged with the transmitter.
//!
//! This module handles:
//! - Header addressing and frame typing
//! - Checksum validation with the per-device offset
//! - RC, switch, sync and telemetry payload layouts

pub mod codec;
pub mod frame;

pub use codec::FrameCodec;
pub use frame::{
    ChannelResolution, DecodeError, FrameType, ParsedFrame, RawFrame, RcData, SwitchData,
    SyncData, TelemetryReply, FRAME_LEN,
};
