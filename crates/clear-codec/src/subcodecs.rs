use ironrdp_core::ReadCursor;

use crate::image_processing::{ImageRegion, ImageRegionMut, Palette256, PixelFormat};
use crate::nscodec::NsCodec;
use crate::rlex::decode_rlex;
use crate::ClearError;

const SUBCODEC_UNCOMPRESSED: u8 = 0;
const SUBCODEC_NSCODEC: u8 = 1;
const SUBCODEC_RLEX: u8 = 2;

/// Decodes the subcodec layer: a sequence of tile records, each dispatched to
/// the raw, NSCodec or RLEX scheme.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_subcodecs(
    mut src: ReadCursor<'_>,
    n_width: usize,
    n_height: usize,
    format: PixelFormat,
    temp: &mut Vec<u8>,
    nsc: &mut dyn NsCodec,
    dst: &mut ImageRegionMut<'_>,
    x_dst: usize,
    y_dst: usize,
    palette: Option<&Palette256>,
) -> Result<(), ClearError> {
    while !src.eof() {
        ensure_size!(in: src, size: 13, field: "subcodec tile header");
        let x_start = src.read_u16();
        let y_start = src.read_u16();
        let width = src.read_u16();
        let height = src.read_u16();
        let byte_count = src.read_u32() as usize;
        let subcodec_id = src.read_u8();

        ensure_size!(in: src, size: byte_count, field: "subcodec tile payload");

        if usize::from(width) > n_width || usize::from(height) > n_height {
            return Err(ClearError::TileTooLarge {
                width,
                height,
                max_width: n_width,
                max_height: n_height,
            });
        }

        let tile_width = usize::from(width);
        let tile_height = usize::from(height);
        let tile_x = x_dst + usize::from(x_start);
        let tile_y = y_dst + usize::from(y_start);

        let tile_size = tile_width * tile_height * usize::from(format.bytes_per_pixel());
        if tile_size > temp.len() {
            temp.resize(tile_size, 0);
        }

        let payload = src.read_slice(byte_count);

        match subcodec_id {
            SUBCODEC_UNCOMPRESSED => {
                let src_step = tile_width * usize::from(PixelFormat::Bgr24.bytes_per_pixel());
                let expected = src_step * tile_height;

                if byte_count != expected {
                    return Err(ClearError::UncompressedSizeMismatch {
                        actual: byte_count,
                        expected,
                    });
                }

                let region = ImageRegion {
                    width: tile_width,
                    height: tile_height,
                    step: src_step,
                    pixel_format: PixelFormat::Bgr24,
                    data: payload,
                };

                region.copy_to(dst, tile_x, tile_y, palette)?;
            }
            SUBCODEC_NSCODEC => {
                nsc.decode_tile(payload, width, height, dst, tile_x, tile_y)?;
            }
            SUBCODEC_RLEX => {
                decode_rlex(ReadCursor::new(payload), tile_width, tile_height, tile_x, tile_y, dst)?;
            }
            id => return Err(ClearError::UnknownSubcodec { id }),
        }
    }

    Ok(())
}
