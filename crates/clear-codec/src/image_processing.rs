use core::fmt;
use std::io;

use byteorder::WriteBytesExt as _;
use num_derive::ToPrimitive;
use num_traits::ToPrimitive as _;

const MAX_ALPHA: u8 = 0xff;

/// A mutable destination surface.
///
/// `width` and `height` are the logical bounds used for clipping; `step` is
/// the row stride in bytes (`0` means tightly packed).
pub struct ImageRegionMut<'a> {
    pub width: usize,
    pub height: usize,
    pub step: usize,
    pub pixel_format: PixelFormat,
    pub data: &'a mut [u8],
}

impl fmt::Debug for ImageRegionMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRegionMut")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("step", &self.step)
            .field("pixel_format", &self.pixel_format)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A read-only source rectangle, tightly bounded by `width` and `height`.
pub struct ImageRegion<'a> {
    pub width: usize,
    pub height: usize,
    pub step: usize,
    pub pixel_format: PixelFormat,
    pub data: &'a [u8],
}

impl fmt::Debug for ImageRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRegion")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("step", &self.step)
            .field("pixel_format", &self.pixel_format)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl ImageRegion<'_> {
    /// Copies this rectangle to `(x_dst, y_dst)` in `dst`, converting between
    /// pixel formats on the way.
    ///
    /// The rectangle is clipped against the destination's logical bounds:
    /// pixels that would land at `x >= dst.width` or `y >= dst.height` are
    /// not written.
    pub fn copy_to(
        &self,
        dst: &mut ImageRegionMut<'_>,
        x_dst: usize,
        y_dst: usize,
        palette: Option<&Palette256>,
    ) -> io::Result<()> {
        // Colour-mapped source formats would be resolved through the palette
        // here; only direct-colour formats are currently defined.
        let _ = palette;

        let width = if x_dst + self.width > dst.width {
            dst.width.saturating_sub(x_dst)
        } else {
            self.width
        };
        let height = if y_dst + self.height > dst.height {
            dst.height.saturating_sub(y_dst)
        } else {
            self.height
        };

        if width == 0 || height == 0 {
            return Ok(());
        }

        let src_byte = usize::from(self.pixel_format.bytes_per_pixel());
        let dst_byte = usize::from(dst.pixel_format.bytes_per_pixel());

        let src_step = if self.step == 0 {
            self.width * src_byte
        } else {
            self.step
        };
        let dst_step = if dst.step == 0 { dst.width * dst_byte } else { dst.step };

        if self.pixel_format.eq_no_alpha(dst.pixel_format) {
            let row = width * dst_byte;
            for y in 0..height {
                let src_start = y * src_step;
                let dst_start = (y_dst + y) * dst_step + x_dst * dst_byte;
                let src_row = self
                    .data
                    .get(src_start..src_start + row)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source buffer is too small"))?;
                let dst_row = dst
                    .data
                    .get_mut(dst_start..dst_start + row)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination buffer is too small"))?;
                dst_row.copy_from_slice(src_row);
            }
        } else {
            for y in 0..height {
                for x in 0..width {
                    let src_start = y * src_step + x * src_byte;
                    let color = self.pixel_format.read_color(self.data.get(src_start..).unwrap_or_default())?;

                    let dst_start = (y_dst + y) * dst_step + (x_dst + x) * dst_byte;
                    let buffer = dst.data.get_mut(dst_start..).unwrap_or_default();
                    dst.pixel_format.write_color(color, buffer)?;
                }
            }
        }

        Ok(())
    }
}

impl ImageRegionMut<'_> {
    /// Writes one pixel at absolute destination coordinates, converting the
    /// colour into the region's pixel format.
    ///
    /// The caller is responsible for clipping against the logical bounds;
    /// writing outside the backing buffer is an error.
    pub fn write_pixel(&mut self, x: usize, y: usize, color: Rgba) -> io::Result<()> {
        let bpp = usize::from(self.pixel_format.bytes_per_pixel());
        let step = if self.step == 0 { self.width * bpp } else { self.step };
        let start = y * step + x * bpp;
        let buffer = self.data.get_mut(start..).unwrap_or_default();
        self.pixel_format.write_color(color, buffer)
    }
}

/// Pixel memory layouts, identified by their FreeRDP wire codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ToPrimitive)]
pub enum PixelFormat {
    ARgb32 = 536_971_400,
    XRgb32 = 536_938_632,
    ABgr32 = 537_036_936,
    XBgr32 = 537_004_168,
    BgrA32 = 537_168_008,
    BgrX32 = 537_135_240,
    RgbA32 = 537_102_472,
    RgbX32 = 537_069_704,
    Bgr24 = 402_917_512,
    Rgb24 = 402_851_976,
}

impl TryFrom<u32> for PixelFormat {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            536_971_400 => Ok(PixelFormat::ARgb32),
            536_938_632 => Ok(PixelFormat::XRgb32),
            537_036_936 => Ok(PixelFormat::ABgr32),
            537_004_168 => Ok(PixelFormat::XBgr32),
            537_168_008 => Ok(PixelFormat::BgrA32),
            537_135_240 => Ok(PixelFormat::BgrX32),
            537_102_472 => Ok(PixelFormat::RgbA32),
            537_069_704 => Ok(PixelFormat::RgbX32),
            402_917_512 => Ok(PixelFormat::Bgr24),
            402_851_976 => Ok(PixelFormat::Rgb24),
            _ => Err(()),
        }
    }
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u8 {
        match self {
            Self::ARgb32
            | Self::XRgb32
            | Self::ABgr32
            | Self::XBgr32
            | Self::BgrA32
            | Self::BgrX32
            | Self::RgbA32
            | Self::RgbX32 => 4,
            Self::Bgr24 | Self::Rgb24 => 3,
        }
    }

    /// Whether two formats share the same component layout once the alpha
    /// depth is masked out, i.e. whether rows can be copied without
    /// conversion.
    pub fn eq_no_alpha(self, other: Self) -> bool {
        let mask = !(8 << 12);

        (self.to_u32().unwrap_or_default() & mask) == (other.to_u32().unwrap_or_default() & mask)
    }

    pub fn read_color(self, buffer: &[u8]) -> io::Result<Rgba> {
        let bpp = usize::from(self.bytes_per_pixel());

        if buffer.len() < bpp {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "input buffer is not large enough for one pixel",
            ));
        }

        let color = &buffer[..bpp];

        match self {
            Self::ARgb32 => Ok(Rgba {
                a: color[0],
                r: color[1],
                g: color[2],
                b: color[3],
            }),
            Self::XRgb32 => Ok(Rgba {
                a: MAX_ALPHA,
                r: color[1],
                g: color[2],
                b: color[3],
            }),
            Self::ABgr32 => Ok(Rgba {
                a: color[0],
                b: color[1],
                g: color[2],
                r: color[3],
            }),
            Self::XBgr32 => Ok(Rgba {
                a: MAX_ALPHA,
                b: color[1],
                g: color[2],
                r: color[3],
            }),
            Self::BgrA32 => Ok(Rgba {
                b: color[0],
                g: color[1],
                r: color[2],
                a: color[3],
            }),
            Self::BgrX32 => Ok(Rgba {
                b: color[0],
                g: color[1],
                r: color[2],
                a: MAX_ALPHA,
            }),
            Self::RgbA32 => Ok(Rgba {
                r: color[0],
                g: color[1],
                b: color[2],
                a: color[3],
            }),
            Self::RgbX32 => Ok(Rgba {
                r: color[0],
                g: color[1],
                b: color[2],
                a: MAX_ALPHA,
            }),
            Self::Bgr24 => Ok(Rgba {
                b: color[0],
                g: color[1],
                r: color[2],
                a: MAX_ALPHA,
            }),
            Self::Rgb24 => Ok(Rgba {
                r: color[0],
                g: color[1],
                b: color[2],
                a: MAX_ALPHA,
            }),
        }
    }

    pub fn write_color(self, color: Rgba, mut buffer: &mut [u8]) -> io::Result<()> {
        match self {
            Self::ARgb32 => {
                buffer.write_u8(color.a)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
            }
            Self::XRgb32 => {
                buffer.write_u8(MAX_ALPHA)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
            }
            Self::ABgr32 => {
                buffer.write_u8(color.a)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
            }
            Self::XBgr32 => {
                buffer.write_u8(MAX_ALPHA)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
            }
            Self::BgrA32 => {
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.a)?;
            }
            Self::BgrX32 => {
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(MAX_ALPHA)?;
            }
            Self::RgbA32 => {
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.a)?;
            }
            Self::RgbX32 => {
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(MAX_ALPHA)?;
            }
            Self::Bgr24 => {
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
            }
            Self::Rgb24 => {
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A 256-entry colour table for colour-mapped pixel formats.
#[derive(Clone, Debug)]
pub struct Palette256 {
    pub entries: [Rgba; 256],
}

impl Default for Palette256 {
    fn default() -> Self {
        Self {
            entries: [Rgba {
                r: 0,
                g: 0,
                b: 0,
                a: MAX_ALPHA,
            }; 256],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region<'a>(data: &'a mut [u8], width: usize, height: usize, format: PixelFormat) -> ImageRegionMut<'a> {
        ImageRegionMut {
            width,
            height,
            step: width * usize::from(format.bytes_per_pixel()),
            pixel_format: format,
            data,
        }
    }

    #[test]
    fn bgr24_converts_to_bgrx32() {
        let src_data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let src = ImageRegion {
            width: 2,
            height: 1,
            step: 0,
            pixel_format: PixelFormat::Bgr24,
            data: &src_data,
        };

        let mut dst_data = [0u8; 8];
        let mut dst = region(&mut dst_data, 2, 1, PixelFormat::BgrX32);

        src.copy_to(&mut dst, 0, 0, None).unwrap();

        assert_eq!(dst_data, [0x01, 0x02, 0x03, 0xFF, 0x04, 0x05, 0x06, 0xFF]);
    }

    #[test]
    fn same_layout_uses_row_copy() {
        let src_data = [0x01, 0x02, 0x03, 0x7F, 0x04, 0x05, 0x06, 0x7F];
        let src = ImageRegion {
            width: 2,
            height: 1,
            step: 0,
            pixel_format: PixelFormat::BgrA32,
            data: &src_data,
        };

        let mut dst_data = [0u8; 8];
        let mut dst = region(&mut dst_data, 2, 1, PixelFormat::BgrX32);

        src.copy_to(&mut dst, 0, 0, None).unwrap();

        // BgrA32 and BgrX32 only differ in alpha depth, so rows are copied
        // verbatim, alpha byte included.
        assert_eq!(dst_data, src_data);
    }

    #[test]
    fn rectangle_is_clipped_against_destination_bounds() {
        let src_data = [0xAA; 4 * 3];
        let src = ImageRegion {
            width: 4,
            height: 1,
            step: 0,
            pixel_format: PixelFormat::Bgr24,
            data: &src_data,
        };

        let mut dst_data = [0u8; 4 * 4];
        let mut dst = region(&mut dst_data, 4, 1, PixelFormat::BgrX32);

        src.copy_to(&mut dst, 2, 0, None).unwrap();

        // Columns 0 and 1 are untouched, columns 2 and 3 are written, the
        // last two source pixels fall outside the destination.
        assert_eq!(&dst_data[..8], [0u8; 8]);
        assert_eq!(&dst_data[8..], [0xAA, 0xAA, 0xAA, 0xFF, 0xAA, 0xAA, 0xAA, 0xFF]);
    }

    #[test]
    fn offset_past_bounds_writes_nothing() {
        let src_data = [0xAA; 3];
        let src = ImageRegion {
            width: 1,
            height: 1,
            step: 0,
            pixel_format: PixelFormat::Bgr24,
            data: &src_data,
        };

        let mut dst_data = [0u8; 4];
        let mut dst = region(&mut dst_data, 1, 1, PixelFormat::BgrX32);

        src.copy_to(&mut dst, 5, 5, None).unwrap();
        assert_eq!(dst_data, [0u8; 4]);
    }
}
