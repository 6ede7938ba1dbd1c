use js_sys::Array;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use position_engine::MarkerShape;

use crate::viewport::{MarkerGlyph, PlotCandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

pub(crate) trait RendererBackend {
    fn resize(&mut self, width: f64, height: f64);
    fn begin_frame(&mut self, clear_color: &str);
    fn draw_candles(&mut self, candles: &[PlotCandle], color_up: &str, color_down: &str);
    fn draw_polyline(&mut self, points: &[(f64, f64)], color: &str, width: f64);
    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), color: &str, dashed: bool);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    fn draw_text(&mut self, text: &str, x: f64, y: f64, color: &str, font: &str, align: Align);
    fn draw_marker(&mut self, glyph: &MarkerGlyph, font: &str);
}

/// 2d canvas renderer. Sizes are CSS pixels; the backing store is scaled by
/// the device pixel ratio.
pub(crate) struct CanvasBackend {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    width: f64,
    height: f64,
    dpr: f64,
}

impl CanvasBackend {
    pub(crate) fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d, dpr: f64) -> Self {
        Self {
            canvas,
            ctx,
            width: 0.0,
            height: 0.0,
            dpr,
        }
    }

    pub(crate) fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl RendererBackend for CanvasBackend {
    fn resize(&mut self, width: f64, height: f64) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.canvas.set_width((width * self.dpr).round() as u32);
        self.canvas.set_height((height * self.dpr).round() as u32);
        let _ = self
            .canvas
            .style()
            .set_property("height", &format!("{height}px"));
    }

    fn begin_frame(&mut self, clear_color: &str) {
        let _ = self
            .ctx
            .set_transform(self.dpr, 0.0, 0.0, self.dpr, 0.0, 0.0);
        self.ctx.set_fill_style_str(clear_color);
        self.ctx.fill_rect(0.0, 0.0, self.width, self.height);
    }

    fn draw_candles(&mut self, candles: &[PlotCandle], color_up: &str, color_down: &str) {
        let ctx = &self.ctx;
        ctx.set_line_width(1.0);
        for c in candles {
            let color = if c.up { color_up } else { color_down };
            ctx.set_stroke_style_str(color);
            ctx.set_fill_style_str(color);
            ctx.begin_path();
            ctx.move_to(c.x, c.y_high);
            ctx.line_to(c.x, c.y_low);
            ctx.stroke();

            let body_top = c.y_open.min(c.y_close);
            let body_h = (c.y_open.max(c.y_close) - body_top).max(1.0);
            ctx.fill_rect(c.x - c.half_w, body_top, c.half_w * 2.0, body_h);
        }
    }

    fn draw_polyline(&mut self, points: &[(f64, f64)], color: &str, width: f64) {
        if points.len() < 2 {
            return;
        }
        let ctx = &self.ctx;
        ctx.set_stroke_style_str(color);
        ctx.set_line_width(width);
        ctx.begin_path();
        ctx.move_to(points[0].0, points[0].1);
        for p in points.iter().skip(1) {
            ctx.line_to(p.0, p.1);
        }
        ctx.stroke();
    }

    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), color: &str, dashed: bool) {
        let ctx = &self.ctx;
        if dashed {
            let _ = ctx.set_line_dash(&Array::of2(
                &JsValue::from_f64(4.0),
                &JsValue::from_f64(4.0),
            ));
        }
        ctx.set_stroke_style_str(color);
        ctx.set_line_width(1.0);
        ctx.begin_path();
        ctx.move_to(from.0, from.1);
        ctx.line_to(to.0, to.1);
        ctx.stroke();
        if dashed {
            let _ = ctx.set_line_dash(&Array::new());
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(x, y, w, h);
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, color: &str, font: &str, align: Align) {
        let ctx = &self.ctx;
        ctx.set_fill_style_str(color);
        ctx.set_font(font);
        ctx.set_text_align(align.as_str());
        let _ = ctx.fill_text(text, x, y);
    }

    fn draw_marker(&mut self, glyph: &MarkerGlyph, font: &str) {
        let ctx = &self.ctx;
        let (x, y, r) = (glyph.x, glyph.y, glyph.radius);
        ctx.set_fill_style_str(&glyph.color);
        ctx.begin_path();
        match glyph.shape {
            MarkerShape::Circle => {
                let _ = ctx.arc(x, y, r, 0.0, std::f64::consts::TAU);
            }
            MarkerShape::ArrowUp => {
                ctx.move_to(x, y - r);
                ctx.line_to(x + r, y + r);
                ctx.line_to(x - r, y + r);
            }
            MarkerShape::ArrowDown => {
                ctx.move_to(x, y + r);
                ctx.line_to(x + r, y - r);
                ctx.line_to(x - r, y - r);
            }
        }
        ctx.close_path();
        ctx.fill();

        if !glyph.text.is_empty() {
            ctx.set_font(font);
            ctx.set_text_align("center");
            ctx.set_text_baseline("alphabetic");
            let _ = ctx.fill_text(&glyph.text, x, glyph.text_y);
        }
    }
}
