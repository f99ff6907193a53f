use anyhow::{anyhow, Result};

/// Pixel layouts a CPU camera image may arrive in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    /// Y plane followed by interleaved UV at quarter resolution.
    Nv12,
    /// Like NV12 with VU order (Android camera default).
    Nv21,
    /// Planar Y, U, V (YUV 4:2:0).
    I420,
}

impl PixelFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rgb24" | "rgb" => Ok(Self::Rgb24),
            "rgba32" | "rgba" => Ok(Self::Rgba32),
            "nv12" => Ok(Self::Nv12),
            "nv21" => Ok(Self::Nv21),
            "i420" | "yuv420p" => Ok(Self::I420),
            other => Err(anyhow!("unsupported pixel format '{}'", other)),
        }
    }

    /// Byte length of a full frame in this format.
    pub fn frame_len(self, width: u32, height: u32) -> Result<usize> {
        let w = width as usize;
        let h = height as usize;
        let pixels = w
            .checked_mul(h)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let len = match self {
            Self::Rgb24 => pixels.checked_mul(3),
            Self::Rgba32 => pixels.checked_mul(4),
            Self::Nv12 | Self::Nv21 | Self::I420 => {
                let chroma = w.div_ceil(2) * h.div_ceil(2);
                chroma
                    .checked_mul(2)
                    .and_then(|c| pixels.checked_add(c))
            }
        };
        len.ok_or_else(|| anyhow!("frame dimensions overflow"))
    }
}

/// Mirroring applied after resampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transformation {
    #[default]
    None,
    MirrorX,
    MirrorY,
}

/// Region of the source image, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Conversion request. Output is always packed RGB24.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionParams {
    pub input_rect: Rect,
    pub output_width: u32,
    pub output_height: u32,
    pub transformation: Transformation,
}

impl ConversionParams {
    /// Whole frame at native resolution, no transformation.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            input_rect: Rect {
                x: 0,
                y: 0,
                width,
                height,
            },
            output_width: width,
            output_height: height,
            transformation: Transformation::None,
        }
    }

    pub fn output_len(&self) -> usize {
        self.output_width as usize * self.output_height as usize * 3
    }
}

/// Convert a frame to RGB24 according to `params`.
pub fn convert_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    params: &ConversionParams,
) -> Result<Vec<u8>> {
    let expected = format.frame_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    let rect = params.input_rect;
    if rect.width == 0
        || rect.height == 0
        || rect.x as u64 + rect.width as u64 > width as u64
        || rect.y as u64 + rect.height as u64 > height as u64
    {
        return Err(anyhow!(
            "input rect {:?} outside {}x{} frame",
            rect,
            width,
            height
        ));
    }
    if params.output_width == 0 || params.output_height == 0 {
        return Err(anyhow!("output dimensions must be non-zero"));
    }

    let sampler = Sampler {
        pixels,
        width: width as usize,
        height: height as usize,
        format,
    };
    let out_w = params.output_width as usize;
    let out_h = params.output_height as usize;
    let mut rgb = vec![0u8; params.output_len()];
    for oy in 0..out_h {
        for ox in 0..out_w {
            let sx = rect.x as usize + ox * rect.width as usize / out_w;
            let sy = rect.y as usize + oy * rect.height as usize / out_h;
            let (dx, dy) = match params.transformation {
                Transformation::None => (ox, oy),
                Transformation::MirrorX => (out_w - 1 - ox, oy),
                Transformation::MirrorY => (ox, out_h - 1 - oy),
            };
            let offset = (dy * out_w + dx) * 3;
            rgb[offset..offset + 3].copy_from_slice(&sampler.rgb_at(sx, sy));
        }
    }
    Ok(rgb)
}

struct Sampler<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    format: PixelFormat,
}

impl Sampler<'_> {
    fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let w = self.width;
        match self.format {
            PixelFormat::Rgb24 => {
                let i = (y * w + x) * 3;
                [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
            }
            PixelFormat::Rgba32 => {
                let i = (y * w + x) * 4;
                [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
            }
            PixelFormat::Nv12 | PixelFormat::Nv21 => {
                let y_plane = w * self.height;
                let chroma_w = w.div_ceil(2);
                let uv = y_plane + ((y / 2) * chroma_w + x / 2) * 2;
                let (u, v) = if self.format == PixelFormat::Nv12 {
                    (self.pixels[uv], self.pixels[uv + 1])
                } else {
                    (self.pixels[uv + 1], self.pixels[uv])
                };
                yuv_to_rgb(self.pixels[y * w + x], u, v)
            }
            PixelFormat::I420 => {
                let y_plane = w * self.height;
                let chroma_w = w.div_ceil(2);
                let chroma_plane = chroma_w * self.height.div_ceil(2);
                let c = (y / 2) * chroma_w + x / 2;
                yuv_to_rgb(
                    self.pixels[y * w + x],
                    self.pixels[y_plane + c],
                    self.pixels[y_plane + chroma_plane + c],
                )
            }
        }
    }
}

// Full-range BT.601.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    [clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
