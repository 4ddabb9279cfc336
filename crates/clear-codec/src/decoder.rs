use core::fmt;
use std::io;

use bitflags::bitflags;
use ironrdp_core::ReadCursor;
use thiserror::Error;

use crate::bands::{decode_bands, VBarCache, SHORT_VBAR_CACHE_SIZE, VBAR_CACHE_SIZE};
use crate::glyph::{decode_glyph, GlyphCache};
use crate::image_processing::{ImageRegionMut, Palette256, PixelFormat};
use crate::nscodec::{NsCodec, NsCodecError, UnsupportedNsCodec};
use crate::residual::decode_residual;
use crate::subcodecs::decode_subcodecs;

const LOG_TARGET: &str = "codec.clear";

const MAX_DIMENSION: u32 = 0xFFFF;

/// Initial scratch capacity, enough for one 512x512 tile in the working
/// format.
const TEMP_BUFFER_SIZE: usize = 512 * 512 * 4;

bitflags! {
    /// Frame header flags of a ClearCodec bitmap stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlyphFlags: u8 {
        const GLYPH_INDEX = 0x01;
        const GLYPH_HIT = 0x02;
        const CACHE_RESET = 0x20;
    }
}

#[derive(Debug, Error)]
pub enum ClearError {
    #[error("stream too short reading {field}: {received} bytes remaining, {expected} expected")]
    NotEnoughBytes {
        field: &'static str,
        received: usize,
        expected: usize,
    },

    #[error("destination buffer is empty")]
    EmptyDestination,

    #[error("invalid destination size {width}x{height}")]
    InvalidDestinationSize { width: usize, height: usize },

    #[error("update rectangle {width}x{height} exceeds the protocol limit")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("failed to allocate the frame stream")]
    StreamAllocation,

    #[error("unexpected sequence number {actual}, expected {expected}")]
    SequenceMismatch { actual: u8, expected: u8 },

    #[error("invalid glyph flags {flags:#04X}")]
    InvalidGlyphFlags { flags: u8 },

    #[error("glyph {width}x{height} exceeds the maximum area")]
    GlyphAreaTooLarge { width: usize, height: usize },

    #[error("glyph index {index} outside the cache")]
    InvalidGlyphIndex { index: u16 },

    #[error("glyph cache slot {index} has no pixels")]
    EmptyGlyphSlot { index: u16 },

    #[error("glyph cache slot {index} holds {count} pixels, {required} required")]
    GlyphSlotTooSmall { index: u16, count: usize, required: usize },

    #[error("run of {run} pixels at {index} overflows the {total} pixel rectangle")]
    RunOverflowsPixelCount { index: usize, run: usize, total: usize },

    #[error("decoded {actual} pixels, rectangle holds {expected}")]
    PixelCountMismatch { actual: usize, expected: usize },

    #[error("paletteCount {count} exceeds 127")]
    PaletteTooLarge { count: u8 },

    #[error("palette index {index} outside the {palette_count} entry palette")]
    PaletteIndexOutOfRange { index: u8, palette_count: u8 },

    #[error("suiteDepth {suite_depth} exceeds stopIndex {stop_index}")]
    InvalidSuiteDepth { suite_depth: u8, stop_index: u8 },

    #[error("band {field} {end} precedes start {start}")]
    InvalidBandRange {
        field: &'static str,
        start: u16,
        end: u16,
    },

    #[error("vBar height {height} exceeds 52")]
    VBarHeightTooLarge { height: usize },

    #[error("short vBar yOff {y_off} precedes yOn {y_on}")]
    InvalidShortVBarRange { y_on: usize, y_off: usize },

    #[error("vBar index {index} outside the {size} entry storage")]
    VBarIndexOutOfRange { index: usize, size: usize },

    #[error("vBar cursor {cursor} outside the {size} entry storage")]
    VBarCursorOutOfRange { cursor: usize, size: usize },

    #[error("cached vBar holds {count} pixels, band height is {height}")]
    VBarSizeMismatch { count: usize, height: usize },

    #[error("subcodec tile {width}x{height} exceeds the {max_width}x{max_height} update")]
    TileTooLarge {
        width: u16,
        height: u16,
        max_width: usize,
        max_height: usize,
    },

    #[error("uncompressed tile holds {actual} bytes, {expected} expected")]
    UncompressedSizeMismatch { actual: usize, expected: usize },

    #[error("unknown subcodec ID {id}")]
    UnknownSubcodec { id: u8 },

    #[error("NSCodec tile failed")]
    NsCodec(#[from] NsCodecError),

    #[error("pixel conversion failed")]
    Io(#[from] io::Error),

    #[error("compression is not implemented")]
    CompressNotImplemented,
}

impl ClearError {
    /// Numeric code of this error as returned by the reference API.
    ///
    /// Every malformed-frame condition maps to `-1`; the preflight codes are
    /// preserved. `StreamAllocation` (`-2005`) is kept for completeness but
    /// is not reachable from safe usage.
    pub fn code(&self) -> i32 {
        match self {
            ClearError::EmptyDestination => -1002,
            ClearError::DimensionsTooLarge { .. } => -1004,
            ClearError::InvalidDestinationSize { .. } => -1022,
            ClearError::StreamAllocation => -2005,
            _ => -1,
        }
    }
}

/// ClearCodec decompression context.
///
/// Holds the per-connection caches the bitstream references across frames:
/// the glyph cache and the two vertical-bar rings. One context per RDP
/// session direction; frames must be submitted in sequence order.
pub struct ClearDecoder {
    seq_number: u8,
    format: PixelFormat,
    nsc: Box<dyn NsCodec>,
    temp_buffer: Vec<u8>,
    glyph_cache: GlyphCache,
    vbar_cache: VBarCache,
    short_vbar_cache: VBarCache,
}

impl ClearDecoder {
    pub fn new() -> Self {
        Self::with_nscodec(Box::new(UnsupportedNsCodec))
    }

    /// Creates a decoder that hands NSCodec subcodec tiles to `nsc`.
    pub fn with_nscodec(nsc: Box<dyn NsCodec>) -> Self {
        Self {
            seq_number: 0,
            format: PixelFormat::BgrX32,
            nsc,
            temp_buffer: vec![0; TEMP_BUFFER_SIZE],
            glyph_cache: GlyphCache::new(),
            vbar_cache: VBarCache::new(VBAR_CACHE_SIZE),
            short_vbar_cache: VBarCache::new(SHORT_VBAR_CACHE_SIZE),
        }
    }

    /// Resets the sequence number and the cache insertion cursors.
    ///
    /// Cached pixel buffers are kept and reused in place.
    pub fn reset(&mut self) {
        self.seq_number = 0;
        self.vbar_cache.reset_cursor();
        self.short_vbar_cache.reset_cursor();
    }

    /// Decompresses one ClearCodec frame into the `width` x `height`
    /// rectangle at `(x_dst, y_dst)` of `dst`.
    ///
    /// On error the destination may have been partially written and must be
    /// treated as undefined; cache updates made before the failure are kept
    /// and recovered by a later CACHE_RESET frame or a [`reset`].
    ///
    /// [`reset`]: Self::reset
    #[allow(clippy::too_many_arguments)]
    pub fn decompress(
        &mut self,
        src: &[u8],
        width: u32,
        height: u32,
        x_dst: usize,
        y_dst: usize,
        dst: &mut ImageRegionMut<'_>,
        palette: Option<&Palette256>,
    ) -> Result<(), ClearError> {
        if dst.data.is_empty() {
            return Err(ClearError::EmptyDestination);
        }

        if dst.width == 0 || dst.height == 0 {
            return Err(ClearError::InvalidDestinationSize {
                width: dst.width,
                height: dst.height,
            });
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ClearError::DimensionsTooLarge { width, height });
        }

        let n_width = width as usize;
        let n_height = height as usize;

        let mut src = ReadCursor::new(src);

        ensure_size!(in: src, size: 2, field: "frame header");
        let glyph_flags = GlyphFlags::from_bits_retain(src.read_u8());
        let seq_number = src.read_u8();

        if self.seq_number == 0 && seq_number != 0 {
            self.seq_number = seq_number;
        }

        if seq_number != self.seq_number {
            error!(
                target: LOG_TARGET,
                actual = seq_number,
                expected = self.seq_number,
                "unexpected sequence number"
            );
            return Err(ClearError::SequenceMismatch {
                actual: seq_number,
                expected: self.seq_number,
            });
        }

        self.seq_number = seq_number.wrapping_add(1);

        if glyph_flags.contains(GlyphFlags::CACHE_RESET) {
            self.vbar_cache.reset_cursor();
            self.short_vbar_cache.reset_cursor();
        }

        decode_glyph(
            &mut src,
            glyph_flags,
            n_width,
            n_height,
            self.format,
            &mut self.glyph_cache,
            dst,
            x_dst,
            y_dst,
            palette,
        )
        .map_err(|error| layer_failed("glyph", error))?;

        if src.len() < 12 {
            // A pure glyph redraw carries no composition payload.
            if glyph_flags.contains(GlyphFlags::GLYPH_INDEX | GlyphFlags::GLYPH_HIT) {
                return Ok(());
            }

            return Err(layer_failed(
                "composition payload",
                ClearError::NotEnoughBytes {
                    field: "payload byte counts",
                    received: src.len(),
                    expected: 12,
                },
            ));
        }

        let residual_byte_count = src.read_u32() as usize;
        let bands_byte_count = src.read_u32() as usize;
        let subcodec_byte_count = src.read_u32() as usize;

        if residual_byte_count > 0 {
            ensure_size!(in: src, size: residual_byte_count, field: "residual payload");
            let payload = ReadCursor::new(src.read_slice(residual_byte_count));

            decode_residual(
                payload,
                n_width,
                n_height,
                self.format,
                &mut self.temp_buffer,
                dst,
                x_dst,
                y_dst,
                palette,
            )
            .map_err(|error| layer_failed("residual", error))?;
        }

        if bands_byte_count > 0 {
            ensure_size!(in: src, size: bands_byte_count, field: "bands payload");
            let payload = ReadCursor::new(src.read_slice(bands_byte_count));

            decode_bands(
                payload,
                n_width,
                n_height,
                self.format,
                &mut self.vbar_cache,
                &mut self.short_vbar_cache,
                dst,
                x_dst,
                y_dst,
            )
            .map_err(|error| layer_failed("bands", error))?;
        }

        if subcodec_byte_count > 0 {
            ensure_size!(in: src, size: subcodec_byte_count, field: "subcodec payload");
            let payload = ReadCursor::new(src.read_slice(subcodec_byte_count));

            decode_subcodecs(
                payload,
                n_width,
                n_height,
                self.format,
                &mut self.temp_buffer,
                self.nsc.as_mut(),
                dst,
                x_dst,
                y_dst,
                palette,
            )
            .map_err(|error| layer_failed("subcodecs", error))?;
        }

        Ok(())
    }

    /// Not implemented; present for parity with the decompression surface.
    pub fn compress(&mut self, _src: &[u8], _dst: &mut Vec<u8>) -> Result<(), ClearError> {
        Err(ClearError::CompressNotImplemented)
    }

    #[cfg(test)]
    pub(crate) fn seq_number(&self) -> u8 {
        self.seq_number
    }

    #[cfg(test)]
    pub(crate) fn glyph_count(&self, index: usize) -> usize {
        self.glyph_cache.count(index)
    }

    #[cfg(test)]
    pub(crate) fn vbar_cursors(&self) -> (usize, usize) {
        (self.vbar_cache.cursor(), self.short_vbar_cache.cursor())
    }
}

impl Default for ClearDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClearDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClearDecoder")
            .field("seq_number", &self.seq_number)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

fn layer_failed(layer: &'static str, error: ClearError) -> ClearError {
    error!(target: LOG_TARGET, %error, "{} layer failed", layer);
    error
}
