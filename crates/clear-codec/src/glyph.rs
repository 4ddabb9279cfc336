use ironrdp_core::ReadCursor;

use crate::image_processing::{ImageRegion, ImageRegionMut, Palette256, PixelFormat};
use crate::{ClearError, GlyphFlags};

pub(crate) const GLYPH_CACHE_SIZE: usize = 4000;

const MAX_GLYPH_AREA: usize = 1024 * 1024;

/// One cached glyph: `count` valid pixels in the decoder's working format
/// within a monotonically growing buffer of `size` pixels.
#[derive(Clone, Debug, Default)]
struct GlyphEntry {
    pixels: Vec<u8>,
    count: usize,
    size: usize,
}

pub(crate) struct GlyphCache {
    entries: Box<[GlyphEntry]>,
}

impl GlyphCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: vec![GlyphEntry::default(); GLYPH_CACHE_SIZE].into_boxed_slice(),
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self, index: usize) -> usize {
        self.entries[index].count
    }
}

/// Decodes the glyph payload of a frame.
///
/// A frame flagged GLYPH_HIT redraws a previously cached glyph; a frame
/// flagged GLYPH_INDEX alone claims a cache slot for the update rectangle and
/// converts the slot content to the destination.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_glyph(
    src: &mut ReadCursor<'_>,
    glyph_flags: GlyphFlags,
    n_width: usize,
    n_height: usize,
    format: PixelFormat,
    cache: &mut GlyphCache,
    dst: &mut ImageRegionMut<'_>,
    x_dst: usize,
    y_dst: usize,
    palette: Option<&Palette256>,
) -> Result<(), ClearError> {
    if glyph_flags.contains(GlyphFlags::GLYPH_HIT) && !glyph_flags.contains(GlyphFlags::GLYPH_INDEX) {
        return Err(ClearError::InvalidGlyphFlags {
            flags: glyph_flags.bits(),
        });
    }

    if !glyph_flags.contains(GlyphFlags::GLYPH_INDEX) {
        return Ok(());
    }

    if n_width * n_height > MAX_GLYPH_AREA {
        return Err(ClearError::GlyphAreaTooLarge {
            width: n_width,
            height: n_height,
        });
    }

    ensure_size!(in: src, size: 2, field: "glyphIndex");
    let glyph_index = src.read_u16();

    if usize::from(glyph_index) >= GLYPH_CACHE_SIZE {
        return Err(ClearError::InvalidGlyphIndex { index: glyph_index });
    }

    let bpp = usize::from(format.bytes_per_pixel());
    let entry = &mut cache.entries[usize::from(glyph_index)];
    let area = n_width * n_height;

    if glyph_flags.contains(GlyphFlags::GLYPH_HIT) {
        if entry.count == 0 || entry.pixels.is_empty() {
            return Err(ClearError::EmptyGlyphSlot { index: glyph_index });
        }

        if area > entry.count {
            return Err(ClearError::GlyphSlotTooSmall {
                index: glyph_index,
                count: entry.count,
                required: area,
            });
        }
    } else {
        entry.count = area;

        if entry.count > entry.size {
            entry.size = entry.count;
            entry.pixels.resize(entry.size * bpp, 0);
        }
    }

    let region = ImageRegion {
        width: n_width,
        height: n_height,
        step: n_width * bpp,
        pixel_format: format,
        data: &entry.pixels[..area * bpp],
    };

    region.copy_to(dst, x_dst, y_dst, palette)?;

    Ok(())
}
