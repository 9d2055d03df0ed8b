pub mod decoder;
pub mod receiver;

pub use decoder::{decode_frame, DecodeError};
pub use receiver::HexFrameRadio;

/// Frame length as configured on the receiver: sync byte plus 26 payload bytes.
pub const FRAME_LEN: usize = 27;

/// Last byte of the `2D D4` sync word, received as the first frame byte.
pub const SYNC_BYTE: u8 = 0xD4;

pub type RawFrame = [u8; FRAME_LEN];

/// Outcome of a single receive attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    Received,
    Timeout,
    Failed(i32),
}

/// Fixed-length frame receiver. No CRC filtering is done at this level.
///
/// `receive` only reports frames that arrive after it is called, so the
/// capture time of a reading is the time `receive` returned.
#[allow(async_fn_in_trait)]
pub trait Radio {
    async fn receive(&mut self, frame: &mut RawFrame) -> Reception;
}
