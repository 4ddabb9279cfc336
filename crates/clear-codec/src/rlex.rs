use ironrdp_core::ReadCursor;

use crate::image_processing::{ImageRegionMut, Rgba};
use crate::utils::read_run_length_factor;
use crate::ClearError;

const MASKS: [u8; 9] = [0x00, 0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3F, 0x7F, 0xFF];

/// Decodes an RLEX subcodec tile straight into the destination surface.
///
/// The tile is a palette of up to 127 BGR entries followed by run+suite
/// records: `runLengthFactor` repetitions of `palette[startIndex]`, then the
/// `palette[startIndex..=stopIndex]` slice written once. Both phases advance
/// a scanline cursor over the `width` x `height` tile; pixels falling outside
/// the destination bounds are dropped.
pub(crate) fn decode_rlex(
    mut src: ReadCursor<'_>,
    width: usize,
    height: usize,
    x_origin: usize,
    y_origin: usize,
    dst: &mut ImageRegionMut<'_>,
) -> Result<(), ClearError> {
    ensure_size!(in: src, size: 1, field: "paletteCount");
    let palette_count = src.read_u8();

    if palette_count > 127 {
        return Err(ClearError::PaletteTooLarge { count: palette_count });
    }

    ensure_size!(in: src, size: usize::from(palette_count) * 3, field: "palette entries");
    let mut palette = [Rgba { r: 0, g: 0, b: 0, a: 0 }; 128];

    for entry in palette.iter_mut().take(usize::from(palette_count)) {
        let b = src.read_u8();
        let g = src.read_u8();
        let r = src.read_u8();
        *entry = Rgba { r, g, b, a: 0xFF };
    }

    let num_bits = if palette_count <= 1 {
        1
    } else {
        (palette_count - 1).ilog2() as usize + 1
    };

    let pixel_count = width * height;
    let mut pixel_index: usize = 0;
    let (mut x, mut y) = (0, 0);

    let put_pixel = |x: usize, y: usize, color: Rgba, dst: &mut ImageRegionMut<'_>| {
        if x_origin + x < dst.width && y_origin + y < dst.height {
            dst.write_pixel(x_origin + x, y_origin + y, color)
        } else {
            Ok(())
        }
    };

    while !src.eof() {
        ensure_size!(in: src, size: 2, field: "RLEX run header");
        let tmp = src.read_u8();
        let first = src.read_u8();

        let suite_depth = (tmp >> num_bits) & MASKS[8 - num_bits];
        let stop_index = tmp & MASKS[num_bits];

        let run_length = read_run_length_factor(&mut src, first)?;

        if stop_index >= palette_count {
            return Err(ClearError::PaletteIndexOutOfRange {
                index: stop_index,
                palette_count,
            });
        }

        if suite_depth > stop_index {
            return Err(ClearError::InvalidSuiteDepth { suite_depth, stop_index });
        }

        let start_index = stop_index - suite_depth;

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

        let color = palette[usize::from(start_index)];

        for _ in 0..run_length {
            put_pixel(x, y, color, dst)?;

            x += 1;
            if x >= width {
                x = 0;
                y += 1;
            }
        }

        pixel_index += run_length;

        let suite_length = usize::from(suite_depth) + 1;

        match pixel_index.checked_add(suite_length) {
            Some(next) if next <= pixel_count => {}
            _ => {
                return Err(ClearError::RunOverflowsPixelCount {
                    index: pixel_index,
                    run: suite_length,
                    total: pixel_count,
                })
            }
        }

        for index in start_index..=stop_index {
            put_pixel(x, y, palette[usize::from(index)], dst)?;

            x += 1;
            if x >= width {
                x = 0;
                y += 1;
            }
        }

        pixel_index += suite_length;
    }

    if pixel_index != pixel_count {
        return Err(ClearError::PixelCountMismatch {
            actual: pixel_index,
            expected: pixel_count,
        });
    }

    Ok(())
}
