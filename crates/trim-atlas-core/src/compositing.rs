use crate::codec::{ImageCodec, PixelBuffer};
use crate::error::{AtlasError, Result};
use crate::model::{
    AtlasMap, ChannelKind, DecalSource, PackingSolution, PixelBufferRef, PrepackPolicy, Rect,
};
use image::Rgba;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// What happened while compositing one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeReport {
    pub channel: Option<ChannelKind>,
    /// Sources that never authored this channel and got a neutral dummy instead.
    pub missing_channels: Vec<String>,
    /// REPEAT sources whose cell was too narrow to tile more than once.
    pub policy_mismatches: Vec<String>,
    /// Tile counts to store on sources; `None` clears a previous count.
    pub repetitions: Vec<(String, Option<u32>)>,
    /// Where the map was written, once saved.
    pub path: Option<PathBuf>,
}

/// Blank canvas in the channel's atlas background color.
pub fn fill_canvas(channel: ChannelKind, w: u32, h: u32) -> PixelBuffer {
    let [r, g, b] = channel.atlas_fill();
    PixelBuffer::from_pixel(w, h, Rgba([r, g, b, 255]))
}

/// Tiles `buf` horizontally into a cell of `w x h` pixels.
///
/// Returns the tile count, or `None` when the cell cannot hold at least two tiles at the
/// cell's height.
pub fn repeat_tile<C: ImageCodec + ?Sized>(
    codec: &C,
    buf: &PixelBuffer,
    w: u32,
    h: u32,
) -> Option<(PixelBuffer, u32)> {
    let (bw, bh) = buf.dimensions();
    if bw == 0 || bh == 0 {
        return None;
    }
    let scale = h as f64 / bh as f64;
    let reps = (w as f64 / (bw as f64 * scale)) as u32;
    if reps <= 1 {
        return None;
    }
    let mut strip = PixelBuffer::new(bw * reps, bh);
    for i in 0..reps {
        codec.composite(&mut strip, buf, i * bw, 0);
    }
    let strip = if strip.dimensions() != (w, h) {
        codec.resize(&strip, w, h)
    } else {
        strip
    };
    Some((strip, reps))
}

/// Contrast remap of one band around mid-gray: `128 + scale * (v - 128)`.
pub fn remap_height(buf: &mut PixelBuffer, band: usize, scale: f32) {
    for px in buf.pixels_mut() {
        let v = px.0[band] as f32;
        px.0[band] = (128.0 + scale * (v - 128.0)).round().clamp(0.0, 255.0) as u8;
    }
}

/// Builds one bitmap per channel from a packing solution and the decals' pixel buffers.
pub struct AtlasCompositor<'a, C: ImageCodec + ?Sized> {
    codec: &'a C,
}

impl<'a, C: ImageCodec + ?Sized> AtlasCompositor<'a, C> {
    pub fn new(codec: &'a C) -> Self {
        Self { codec }
    }

    fn load(
        &self,
        channel: ChannelKind,
        src: &DecalSource,
        report: &mut CompositeReport,
    ) -> Result<PixelBuffer> {
        match src.channels.get(&channel) {
            Some(PixelBufferRef::File { path, .. }) => self.codec.open(path),
            Some(PixelBufferRef::Memory(img)) => Ok(img.as_ref().clone()),
            None => {
                warn!(decal = %src.name, ?channel, "channel missing, using neutral dummy");
                report.missing_channels.push(src.id.clone());
                let [r, g, b] = channel.neutral_fill();
                Ok(PixelBuffer::from_pixel(
                    src.original_size.0.max(1),
                    src.original_size.1.max(1),
                    Rgba([r, g, b, 255]),
                ))
            }
        }
    }

    /// Fits a decal's buffer into its packed cell according to its prepack policy.
    fn fit(
        &self,
        src: &DecalSource,
        mut buf: PixelBuffer,
        cell: &Rect,
        report: &mut CompositeReport,
    ) -> PixelBuffer {
        let (bw, bh) = buf.dimensions();
        let (ow, oh) = src.original_size;
        if bw < ow || bh < oh {
            buf = self.codec.resize(&buf, ow.max(bw), oh.max(bh));
        }
        if buf.dimensions() == (cell.w, cell.h) {
            return buf;
        }
        match src.effective_prepack() {
            PrepackPolicy::None | PrepackPolicy::Stretch => {
                if src.repetitions.is_some() {
                    report.repetitions.push((src.id.clone(), None));
                }
                self.codec.resize(&buf, cell.w, cell.h)
            }
            PrepackPolicy::Repeat => match repeat_tile(self.codec, &buf, cell.w, cell.h) {
                Some((strip, reps)) => {
                    report.repetitions.push((src.id.clone(), Some(reps)));
                    strip
                }
                None => {
                    debug!(decal = %src.name, "cell too narrow to repeat, stretching");
                    report.policy_mismatches.push(src.id.clone());
                    self.codec.resize(&buf, cell.w, cell.h)
                }
            },
        }
    }

    #[instrument(skip_all, fields(channel = ?channel))]
    /// Composites every placed decal of `solution` into a new bitmap for `channel`.
    pub fn composite_channel(
        &self,
        channel: ChannelKind,
        solution: &PackingSolution,
        sources: &[DecalSource],
    ) -> Result<(AtlasMap, CompositeReport)> {
        let (rw, rh) = solution.resolution;
        if rw == 0 || rh == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: rw,
                height: rh,
            });
        }
        let by_id: HashMap<&str, &DecalSource> =
            sources.iter().map(|s| (s.id.as_str(), s)).collect();
        let canvas_rect = Rect::new(0, 0, rw, rh);
        let mut canvas = fill_canvas(channel, rw, rh);
        let mut report = CompositeReport {
            channel: Some(channel),
            ..Default::default()
        };

        for (id, cell) in &solution.placed_boxes {
            let src = by_id.get(id.as_str()).ok_or_else(|| {
                AtlasError::InvalidInput(format!("placed box '{id}' has no matching decal"))
            })?;
            let buf = self.load(channel, src, &mut report)?;
            let mut buf = self.fit(src, buf, cell, &mut report);

            match channel.height_band() {
                Some(band) if src.height_scale != 1.0 => {
                    remap_height(&mut buf, band, src.height_scale)
                }
                _ => {}
            }

            if !canvas_rect.contains(cell) {
                let w = rw.saturating_sub(cell.x).min(buf.width());
                let h = rh.saturating_sub(cell.y).min(buf.height());
                buf = self.codec.crop(&buf, &Rect::new(0, 0, w, h));
            }
            self.codec.composite(&mut canvas, &buf, cell.x, cell.y);
        }

        Ok((
            AtlasMap {
                channel,
                resolution: (rw, rh),
                rgba: canvas,
            },
            report,
        ))
    }

    /// Composites `channel` and saves it as `<dir>/<channel>.<ext>`.
    pub fn render_channel(
        &self,
        channel: ChannelKind,
        solution: &PackingSolution,
        sources: &[DecalSource],
        dir: &Path,
    ) -> Result<CompositeReport> {
        let (map, mut report) = self.composite_channel(channel, solution, sources)?;
        let path = dir.join(format!("{}.{}", channel.file_stem(), self.codec.extension()));
        self.codec.save(&map.rgba, &path)?;
        debug!(path = %path.display(), "saved atlas map");
        report.path = Some(path);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCrateCodec;

    #[test]
    fn repeat_tiles_to_exact_cell() {
        let codec = ImageCrateCodec::default();
        let buf = PixelBuffer::from_pixel(100, 50, Rgba([10, 20, 30, 255]));
        let (strip, reps) = repeat_tile(&codec, &buf, 320, 50).expect("repeats");
        assert_eq!(reps, 3);
        assert_eq!(strip.dimensions(), (320, 50));
    }

    #[test]
    fn narrow_cell_does_not_repeat() {
        let codec = ImageCrateCodec::default();
        let buf = PixelBuffer::from_pixel(100, 50, Rgba([0, 0, 0, 255]));
        assert!(repeat_tile(&codec, &buf, 199, 50).is_none());
    }

    #[test]
    fn height_remap_scales_around_mid_gray() {
        let mut buf = PixelBuffer::from_pixel(1, 1, Rgba([255, 128, 200, 255]));
        remap_height(&mut buf, 2, 0.5);
        assert_eq!(buf.get_pixel(0, 0).0, [255, 128, 164, 255]);
        remap_height(&mut buf, 2, 10.0);
        assert_eq!(buf.get_pixel(0, 0).0[2], 255);
    }
}
