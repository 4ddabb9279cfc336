use thiserror::Error;

use crate::image_processing::ImageRegionMut;

#[derive(Debug, Error)]
pub enum NsCodecError {
    #[error("NSCodec tiles are not supported by this decoder")]
    Unsupported,

    #[error("NSCodec decoding failed")]
    Decode(#[source] Box<dyn core::error::Error + Send + Sync>),
}

/// Nested NSCodec decoder used for subcodec tiles.
///
/// Tiles carry a complete NSCodec bitmap stream for a `width` x `height`
/// rectangle. Implementations decode it (NSCodec output is 24-bit RGB) and
/// write the result converted to `dst.pixel_format` at `(x_dst, y_dst)`,
/// clipped against the destination's logical bounds.
pub trait NsCodec {
    fn decode_tile(
        &mut self,
        data: &[u8],
        width: u16,
        height: u16,
        dst: &mut ImageRegionMut<'_>,
        x_dst: usize,
        y_dst: usize,
    ) -> Result<(), NsCodecError>;
}

/// Placeholder used when no NSCodec implementation is plugged in; every tile
/// is rejected.
#[derive(Debug, Default)]
pub struct UnsupportedNsCodec;

impl NsCodec for UnsupportedNsCodec {
    fn decode_tile(
        &mut self,
        _data: &[u8],
        _width: u16,
        _height: u16,
        _dst: &mut ImageRegionMut<'_>,
        _x_dst: usize,
        _y_dst: usize,
    ) -> Result<(), NsCodecError> {
        Err(NsCodecError::Unsupported)
    }
}
