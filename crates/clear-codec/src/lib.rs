//! ClearCodec Bitmap Compression
//!
//! Decoder for the "Clear" codec used by RDP graphics pipelines for mixed
//! text/photographic screen content.
//!
//! ### References
//!
//! - Microsoft Learn:
//!   - [MS-RDPEGFX 2.2.4.1 RFX_CLEARCODEC_BITMAP_STREAM](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-rdpegfx/a3cfe569-7be1-40ed-a912-eeb722b84af4)
//! - FreeRDP:
//!   - [clear.c](https://github.com/FreeRDP/FreeRDP/blob/master/libfreerdp/codec/clear.c)

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

pub mod image_processing;
pub mod nscodec;

mod bands;
mod decoder;
mod glyph;
mod residual;
mod rlex;
mod subcodecs;
mod utils;


pub use decoder::{ClearDecoder, ClearError, GlyphFlags};
