use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use vigil_core::Direction;
use vigil_timing::{CalibrationStats, HighPrecisionTimer};

use crate::scene::{Mark, Scene, View};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const TRACK: [u8; 4] = [60, 60, 60, 255];
const BAR: [u8; 4] = [52, 152, 219, 255];

const CHEVRON_SPACING: f32 = 70.0;
const DIGIT_SPACING: f32 = 30.0;
const READOUT_OFFSET: f32 = 90.0;

#[repr(usize)]
#[derive(Debug, Clone, Copy)]
enum CacheIndex {
    Fixation = 0,
    ChevronLeft = 1,
    ChevronRight = 2,
    Stimulus = 3,
    Hit = 4,
    Miss = 5,
    NoResponse = 6,
    ReadyPrompt = 7,
    Finished = 8,
    // Seven-segment digits 0-9 (9-18)
    Digit0 = 9,
}

impl CacheIndex {
    const STATIC_COUNT: usize = 19;

    fn digit(d: u8) -> usize {
        CacheIndex::Digit0 as usize + d.min(9) as usize
    }
}

/// Axis-aligned pixel region, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Region {
    fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Draws task views into an offscreen pixmap and copies only the regions
/// that changed into the presented frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    static_cache: Vec<Pixmap>,

    canvas: Pixmap,
    clear_buffer: Vec<u8>,
    dirty_regions: Vec<Region>,
    first_frame: bool,

    component_timers: HashMap<&'static str, HighPrecisionTimer>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = blank_canvas(width, height)?;
        let mut renderer = SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            static_cache: Vec::with_capacity(CacheIndex::STATIC_COUNT),
            clear_buffer: canvas.data().to_vec(),
            canvas,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
            component_timers: ["clear", "draw", "copy"]
                .iter()
                .map(|&k| (k, HighPrecisionTimer::new()))
                .collect(),
        };
        renderer.init_cache()?;
        Ok(renderer)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = blank_canvas(width, height)?;
        self.clear_buffer = self.canvas.data().to_vec();
        self.width = width;
        self.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        self.dirty_regions.clear();
        self.first_frame = true;
        Ok(())
    }

    /// Frame-time statistics for one stage: `clear`, `draw` or `copy`.
    pub fn component_stats(&self, stage: &str) -> Option<CalibrationStats> {
        self.component_timers
            .get(stage)
            .map(HighPrecisionTimer::calibration_stats)
    }

    fn init_cache(&mut self) -> Result<()> {
        let white = Color::from_rgba8(255, 255, 255, 255);
        let sprites = [
            fixation_cross(40, 4)?,
            chevron(Direction::Left, 28.0, white)?,
            chevron(Direction::Right, 28.0, white)?,
            disc(50.0, Color::from_rgba8(230, 57, 70, 255))?,
            disc(40.0, Color::from_rgba8(46, 204, 113, 255))?,
            disc(40.0, Color::from_rgba8(231, 76, 60, 255))?,
            ring(40.0, 6.0, Color::from_rgba8(149, 165, 166, 255))?,
            chevron(Direction::Right, 36.0, Color::from_rgba8(52, 152, 219, 255))?,
            check_mark(64.0, Color::from_rgba8(46, 204, 113, 255))?,
        ];
        self.static_cache.extend(sprites);
        for d in 0..10 {
            self.static_cache
                .push(seven_segment(d, Color::from_rgba8(241, 196, 15, 255))?);
        }
        debug_assert_eq!(self.static_cache.len(), CacheIndex::STATIC_COUNT);
        Ok(())
    }

    /// Renders `view` and presents the changed regions into `frame_buffer`
    /// (RGBA8, `width * height * 4` bytes).
    pub fn render_frame(
        &mut self,
        view: &View,
        frame_buffer: &mut [u8],
        timer: &mut HighPrecisionTimer,
    ) -> Result<FrameStats> {
        let expected = self.width as usize * self.height as usize * 4;
        ensure!(
            frame_buffer.len() == expected,
            "frame buffer holds {} bytes, renderer expects {}",
            frame_buffer.len(),
            expected
        );

        if self.first_frame {
            self.first_frame = false;
            self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
            frame_buffer.copy_from_slice(&self.clear_buffer);
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);

        let t = timer.now_ns();
        self.clear_dirty(&old_dirty);
        let t_clear = timer.elapsed(t);

        let t = timer.now_ns();
        self.render_view(view);
        let t_draw = timer.elapsed(t);

        let mut present = old_dirty;
        present.extend_from_slice(&self.dirty_regions);
        coalesce_dirty(&mut present);

        let t = timer.now_ns();
        for region in &present {
            self.copy_region(*region, frame_buffer);
        }
        let t_copy = timer.elapsed(t);

        let total = t_clear + t_draw + t_copy;
        for (stage, d) in [("clear", t_clear), ("draw", t_draw), ("copy", t_copy)] {
            if let Some(stage_timer) = self.component_timers.get_mut(stage) {
                stage_timer.record_frame(d);
            }
        }
        timer.record_frame(total);

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    /// Draws `view` onto the offscreen canvas without presenting it.
    pub fn render_view(&mut self, view: &View) {
        let (cx, cy) = self.center;
        match view.scene {
            Scene::Ready => self.blit_cached(CacheIndex::ReadyPrompt as usize, self.center),
            Scene::Blank => {}
            Scene::Fixation => self.blit_cached(CacheIndex::Fixation as usize, self.center),
            Scene::Reaction { elapsed_ms } => {
                self.blit_cached(CacheIndex::Stimulus as usize, self.center);
                self.draw_number(elapsed_ms, (cx, cy + READOUT_OFFSET));
            }
            Scene::Flanker { arrows } => {
                for (i, direction) in arrows.iter().enumerate() {
                    let index = match direction {
                        Direction::Left => CacheIndex::ChevronLeft,
                        Direction::Right => CacheIndex::ChevronRight,
                    };
                    let x = cx + (i as f32 - 2.0) * CHEVRON_SPACING;
                    self.blit_cached(index as usize, (x, cy));
                }
            }
            Scene::Feedback {
                mark,
                reaction_time_ms,
            } => {
                let index = match mark {
                    Mark::Hit | Mark::Correct => CacheIndex::Hit,
                    Mark::Miss | Mark::Incorrect => CacheIndex::Miss,
                    Mark::NoResponse => CacheIndex::NoResponse,
                };
                self.blit_cached(index as usize, self.center);
                if let Some(rt) = reaction_time_ms {
                    self.draw_number(rt, (cx, cy + READOUT_OFFSET));
                }
            }
            Scene::Finished => self.blit_cached(CacheIndex::Finished as usize, self.center),
        }

        if let Some(fraction) = view.progress {
            self.draw_progress(fraction);
        }
    }

    fn draw_number(&mut self, value: u64, center: (f32, f32)) {
        let digits = value.to_string();
        let n = digits.len() as f32;
        let first_x = center.0 - (n - 1.0) * DIGIT_SPACING * 0.5;
        for (i, b) in digits.bytes().enumerate() {
            let x = first_x + i as f32 * DIGIT_SPACING;
            self.blit_cached(CacheIndex::digit(b - b'0'), (x, center.1));
        }
    }

    fn draw_progress(&mut self, fraction: f32) {
        let w = self.width as usize;
        let h = self.height as usize;
        let track_w = w * 3 / 5;
        let x0 = (w - track_w) / 2;
        let y0 = h.saturating_sub(40);
        let track = Region {
            x0,
            y0,
            x1: x0 + track_w,
            y1: (y0 + 6).min(h),
        };
        self.fill_region(track, TRACK);

        let filled = (track_w as f32 * fraction.clamp(0.0, 1.0)).round() as usize;
        self.fill_region(
            Region {
                x1: x0 + filled,
                ..track
            },
            BAR,
        );
    }

    fn fill_region(&mut self, region: Region, rgba: [u8; 4]) {
        if region.is_empty() {
            return;
        }
        let stride = self.width as usize * 4;
        let data = self.canvas.data_mut();
        for y in region.y0..region.y1 {
            let row = &mut data[y * stride + region.x0 * 4..y * stride + region.x1 * 4];
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
        self.dirty_regions.push(region);
    }

    fn clear_dirty(&mut self, dirty: &[Region]) {
        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data_mut();
        for region in dirty.iter().filter(|r| !r.is_empty()) {
            for y in region.y0..region.y1 {
                let start = y * stride + region.x0 * 4;
                let end = y * stride + region.x1 * 4;
                canvas_data[start..end].copy_from_slice(&self.clear_buffer[start..end]);
            }
        }
    }

    fn copy_region(&self, region: Region, frame_buffer: &mut [u8]) {
        if region.is_empty() {
            return;
        }
        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for y in region.y0..region.y1 {
            let start = y * stride + region.x0 * 4;
            let end = y * stride + region.x1 * 4;
            frame_buffer[start..end].copy_from_slice(&canvas_data[start..end]);
        }
    }

    /// Copies a cached sprite centred on `pos`, clipped to the canvas.
    fn blit_cached(&mut self, index: usize, pos: (f32, f32)) {
        let Some(pixmap) = self.static_cache.get(index) else {
            return;
        };
        let w = pixmap.width() as i32;
        let h = pixmap.height() as i32;
        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

        let canvas_w = self.width as i32;
        let canvas_h = self.height as i32;
        let dst_x0 = x0.max(0);
        let dst_y0 = y0.max(0);
        let dst_x1 = (x0 + w).min(canvas_w);
        let dst_y1 = (y0 + h).min(canvas_h);
        if dst_x1 <= dst_x0 || dst_y1 <= dst_y0 {
            return;
        }

        let src_x0 = (dst_x0 - x0) as usize;
        let src_y0 = (dst_y0 - y0) as usize;
        let copy_w = (dst_x1 - dst_x0) as usize;
        let copy_h = (dst_y1 - dst_y0) as usize;

        let src = pixmap.data();
        let src_stride = pixmap.width() as usize * 4;
        let dst_stride = self.width as usize * 4;
        let dst = self.canvas.data_mut();

        for row in 0..copy_h {
            let s = (src_y0 + row) * src_stride + src_x0 * 4;
            let d = (dst_y0 as usize + row) * dst_stride + dst_x0 as usize * 4;
            let src_row = &src[s..s + copy_w * 4];
            let dst_row = &mut dst[d..d + copy_w * 4];

            if src_row.iter().skip(3).step_by(4).all(|&a| a == 255) {
                dst_row.copy_from_slice(src_row);
                continue;
            }
            // premultiplied source-over
            for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                let inv = 255 - sp[3] as u32;
                for c in 0..4 {
                    dp[c] = (sp[c] as u32 + (dp[c] as u32 * inv + 127) / 255).min(255) as u8;
                }
            }
        }

        self.dirty_regions.push(Region {
            x0: dst_x0 as usize,
            y0: dst_y0 as usize,
            x1: dst_x1 as usize,
            y1: dst_y1 as usize,
        });
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut canvas = Pixmap::new(width, height)
        .with_context(|| format!("cannot allocate {width}x{height} canvas"))?;
    canvas.fill(Color::from_rgba8(
        BACKGROUND[0],
        BACKGROUND[1],
        BACKGROUND[2],
        BACKGROUND[3],
    ));
    Ok(canvas)
}

/// Merges regions that share a row band and touch horizontally.
fn coalesce_dirty(regions: &mut Vec<Region>) {
    regions.retain(|r| !r.is_empty());
    regions.sort_by_key(|r| (r.y0, r.x0));
    let mut out: Vec<Region> = Vec::with_capacity(regions.len());
    for r in regions.drain(..) {
        if let Some(last) = out.last_mut() {
            let same_band = r.y0 == last.y0 && r.y1 == last.y1;
            if same_band && r.x0 <= last.x1 {
                last.x1 = last.x1.max(r.x1);
                continue;
            }
        }
        out.push(r);
    }
    *regions = out;
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = false;
    paint
}

fn fixation_cross(size: u32, thickness: u32) -> Result<Pixmap> {
    let mut pm = Pixmap::new(size, size).context("fixation pixmap")?;
    let paint = solid_paint(Color::from_rgba8(255, 255, 255, 255));
    let (s, t) = (size as f32, thickness as f32);
    let bars = [
        Rect::from_xywh(0.0, (s - t) * 0.5, s, t),
        Rect::from_xywh((s - t) * 0.5, 0.0, t, s),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}

fn chevron(direction: Direction, size: f32, color: Color) -> Result<Pixmap> {
    let extent = (size * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(extent, extent).context("chevron pixmap")?;
    let (cx, cy) = (size, size);
    let mut pb = PathBuilder::new();
    match direction {
        Direction::Left => {
            pb.move_to(cx - size, cy);
            pb.line_to(cx + size * 0.6, cy - size);
            pb.line_to(cx + size * 0.6, cy + size);
        }
        Direction::Right => {
            pb.move_to(cx + size, cy);
            pb.line_to(cx - size * 0.6, cy - size);
            pb.line_to(cx - size * 0.6, cy + size);
        }
    }
    pb.close();
    let path = pb.finish().context("chevron path")?;
    pm.fill_path(
        &path,
        &solid_paint(color),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Ok(pm)
}

fn disc(radius: f32, color: Color) -> Result<Pixmap> {
    let extent = (radius * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(extent, extent).context("disc pixmap")?;
    let path = PathBuilder::from_circle(radius, radius, radius).context("disc path")?;
    pm.fill_path(
        &path,
        &solid_paint(color),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Ok(pm)
}

fn ring(radius: f32, width: f32, color: Color) -> Result<Pixmap> {
    let extent = (radius * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(extent, extent).context("ring pixmap")?;
    let path = PathBuilder::from_circle(radius, radius, radius - width * 0.5)
        .context("ring path")?;
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pm.stroke_path(&path, &solid_paint(color), &stroke, Transform::identity(), None);
    Ok(pm)
}

fn check_mark(size: f32, color: Color) -> Result<Pixmap> {
    let extent = size.ceil() as u32;
    let mut pm = Pixmap::new(extent, extent).context("check pixmap")?;
    let mut pb = PathBuilder::new();
    pb.move_to(size * 0.15, size * 0.5);
    pb.line_to(size * 0.4, size * 0.75);
    pb.line_to(size * 0.85, size * 0.25);
    let path = pb.finish().context("check path")?;
    let stroke = Stroke {
        width: size * 0.12,
        ..Stroke::default()
    };
    pm.stroke_path(&path, &solid_paint(color), &stroke, Transform::identity(), None);
    Ok(pm)
}

// Segment bits: a=0 (top), b=1, c=2, d=3 (bottom), e=4, f=5, g=6 (middle).
const SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];

fn seven_segment(digit: u8, color: Color) -> Result<Pixmap> {
    const W: f32 = 24.0;
    const H: f32 = 40.0;
    const T: f32 = 4.0;
    let mut pm = Pixmap::new(W as u32, H as u32).context("digit pixmap")?;
    let paint = solid_paint(color);
    let mid = (H - T) * 0.5;
    let half = (H - 3.0 * T) * 0.5;
    let segments = [
        Rect::from_xywh(T, 0.0, W - 2.0 * T, T),
        Rect::from_xywh(W - T, T, T, half),
        Rect::from_xywh(W - T, mid + T, T, half),
        Rect::from_xywh(T, H - T, W - 2.0 * T, T),
        Rect::from_xywh(0.0, mid + T, T, half),
        Rect::from_xywh(0.0, T, T, half),
        Rect::from_xywh(T, mid, W - 2.0 * T, T),
    ];
    let bits = SEGMENTS[digit.min(9) as usize];
    for (i, rect) in segments.into_iter().enumerate() {
        if bits & (1 << i) == 0 {
            continue;
        }
        if let Some(rect) = rect {
            pm.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 400;
    const H: u32 = 300;

    fn pixel(buf: &[u8], x: u32, y: u32) -> [u8; 4] {
        let i = ((y * W + x) * 4) as usize;
        [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]
    }

    fn render(renderer: &mut SkiaRenderer, view: View, buf: &mut [u8]) -> FrameStats {
        let mut timer = HighPrecisionTimer::new();
        renderer.render_frame(&view, buf, &mut timer).unwrap()
    }

    #[test]
    fn fixation_then_blank_restores_background() {
        let mut r = SkiaRenderer::new(W, H).unwrap();
        let mut buf = vec![0u8; (W * H * 4) as usize];

        render(&mut r, View::new(Scene::Fixation), &mut buf);
        assert_eq!(pixel(&buf, W / 2, H / 2), [255, 255, 255, 255]);
        assert_eq!(pixel(&buf, 5, 5), BACKGROUND);

        render(&mut r, View::new(Scene::Blank), &mut buf);
        assert_eq!(pixel(&buf, W / 2, H / 2), BACKGROUND);
    }

    #[test]
    fn reaction_scene_draws_stimulus_disc() {
        let mut r = SkiaRenderer::new(W, H).unwrap();
        let mut buf = vec![0u8; (W * H * 4) as usize];
        let stats = render(
            &mut r,
            View::new(Scene::Reaction { elapsed_ms: 287 }),
            &mut buf,
        );
        assert_eq!(pixel(&buf, W / 2, H / 2), [230, 57, 70, 255]);
        // disc plus three digits
        assert_eq!(stats.dirty_count, 4);
    }

    #[test]
    fn flanker_row_and_progress_bar() {
        let mut r = SkiaRenderer::new(W, H).unwrap();
        let mut buf = vec![0u8; (W * H * 4) as usize];
        let view = View {
            scene: Scene::Flanker {
                arrows: [Direction::Left; 5],
            },
            progress: Some(0.5),
        };
        render(&mut r, view, &mut buf);

        assert_eq!(pixel(&buf, W / 2, H / 2), [255, 255, 255, 255]);
        let bar_y = H - 38;
        assert_eq!(pixel(&buf, W / 5 + 2, bar_y), BAR);
        assert_eq!(pixel(&buf, W * 4 / 5 - 2, bar_y), TRACK);
    }

    #[test]
    fn rejects_mismatched_frame_buffer() {
        let mut r = SkiaRenderer::new(W, H).unwrap();
        let mut buf = vec![0u8; 16];
        let mut timer = HighPrecisionTimer::new();
        assert!(r.render_frame(&View::new(Scene::Ready), &mut buf, &mut timer).is_err());
    }

    #[test]
    fn resize_resets_canvas() {
        let mut r = SkiaRenderer::new(W, H).unwrap();
        r.resize(200, 100).unwrap();
        assert_eq!(r.size(), (200, 100));
        let mut buf = vec![7u8; 200 * 100 * 4];
        let mut timer = HighPrecisionTimer::new();
        r.render_frame(&View::new(Scene::Finished), &mut buf, &mut timer)
            .unwrap();
        assert_eq!(&buf[0..4], &BACKGROUND);
        assert!(r.component_stats("draw").is_some());
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn coalesces_touching_regions() {
        let mut regions = vec![
            Region { x0: 10, y0: 0, x1: 20, y1: 5 },
            Region { x0: 0, y0: 0, x1: 10, y1: 5 },
            Region { x0: 0, y0: 9, x1: 4, y1: 9 },
        ];
        coalesce_dirty(&mut regions);
        assert_eq!(regions, vec![Region { x0: 0, y0: 0, x1: 20, y1: 5 }]);
    }
}
