use ironrdp_core::ReadCursor;

use crate::image_processing::{ImageRegion, ImageRegionMut, Palette256, PixelFormat, Rgba};
use crate::utils::read_run_length_factor;
use crate::ClearError;

/// Decodes the residual layer: a BGR24 run-length stream covering the whole
/// `width` x `height` rectangle.
///
/// Runs are expanded into `temp` in the decoder's working format and the
/// finished rectangle is blitted to `(x_dst, y_dst)` in `dst`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_residual(
    mut src: ReadCursor<'_>,
    width: usize,
    height: usize,
    format: PixelFormat,
    temp: &mut Vec<u8>,
    dst: &mut ImageRegionMut<'_>,
    x_dst: usize,
    y_dst: usize,
    palette: Option<&Palette256>,
) -> Result<(), ClearError> {
    let bpp = usize::from(format.bytes_per_pixel());
    let pixel_count = width * height;

    if temp.len() < pixel_count * bpp {
        temp.resize(pixel_count * bpp, 0);
    }

    let mut pixel_index: usize = 0;

    while !src.eof() {
        ensure_size!(in: src, size: 4, field: "residual run");
        let b = src.read_u8();
        let g = src.read_u8();
        let r = src.read_u8();
        let first = src.read_u8();

        let run_length = read_run_length_factor(&mut src, first)?;

        match pixel_index.checked_add(run_length) {
            Some(next) if next <= pixel_count => {}
            _ => {
                return Err(ClearError::RunOverflowsPixelCount {
                    index: pixel_index,
                    run: run_length,
                    total: pixel_count,
                })
            }
        }

        let color = Rgba { r, g, b, a: 0xFF };
        let mut offset = pixel_index * bpp;

        for _ in 0..run_length {
            format.write_color(color, &mut temp[offset..])?;
            offset += bpp;
        }

        pixel_index += run_length;
    }

    if pixel_index != pixel_count {
        return Err(ClearError::PixelCountMismatch {
            actual: pixel_index,
            expected: pixel_count,
        });
    }

    let region = ImageRegion {
        width,
        height,
        step: width * bpp,
        pixel_format: format,
        data: &temp[..pixel_count * bpp],
    };

    region.copy_to(dst, x_dst, y_dst, palette)?;

    Ok(())
}
