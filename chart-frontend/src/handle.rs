use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, WheelEvent};

use position_engine::Marker;
use ts_core::{Candle, TimeSeries, Timeframe, VisibleRange};

use crate::backend::{Align, CanvasBackend, RendererBackend};
use crate::dom::{
    as_mouse, create_canvas, device_pixel_ratio, document, element_by_id, layout_width, listen,
    local_point, request_frame, window,
};
use crate::error::ChartError;
use crate::events::ClickReport;
use crate::lifecycle::{ChartLifecycle, ListenerId, ListenerKind};
use crate::options::{ChartOptions, PriceLine};
use crate::viewport::{
    candle_at, crosshair_label, format_price, hit_test, layout_markers, legend_text, plot_candles,
    price_ticks, time_label, time_step, time_ticks, MarkerGlyph, Viewport, PRICE_AXIS_WIDTH,
    TIME_AXIS_HEIGHT,
};

pub type SubscriptionId = ListenerId;

type ClickCallback = Rc<dyn Fn(&ClickReport)>;
type RangeCallback = Rc<dyn Fn(VisibleRange)>;

const CLICK_SLOP_PX: f64 = 3.0;
const INITIAL_BARS: i64 = 120;

struct DragState {
    start_x: f64,
    last_x: f64,
    moved: bool,
}

struct ChartInner {
    container: HtmlElement,
    legend: HtmlElement,
    backend: CanvasBackend,
    options: ChartOptions,
    viewport: Viewport,
    has_range: bool,
    candles: TimeSeries<Candle>,
    markers: Vec<Marker>,
    glyphs: Vec<MarkerGlyph>,
    price_line: Option<PriceLine>,
    crosshair: Option<(f64, f64)>,
    hovered: Option<String>,
    drag: Option<DragState>,
    frame_pending: bool,
    removed: bool,
    next_sub: u32,
    click_subs: Vec<(u32, ClickCallback)>,
    range_subs: Vec<(u32, RangeCallback)>,
}

impl ChartInner {
    fn resize_to_container(&mut self) {
        let width = self
            .options
            .width
            .unwrap_or_else(|| layout_width(&self.container));
        let height = self.options.height;
        self.backend.resize(width, height);
        self.viewport
            .resize(width - PRICE_AXIS_WIDTH, height - TIME_AXIS_HEIGHT);
    }

    fn in_plot(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.viewport.width() && y <= self.viewport.height()
    }

    fn update_crosshair(&mut self, x: f64, y: f64) {
        if !self.in_plot(x, y) {
            self.clear_crosshair();
            return;
        }
        self.crosshair = Some((x, y));
        self.hovered = hit_test(&self.glyphs, x, y).map(|g| g.id.clone());
        let ts = self.viewport.x_to_time(x);
        let text = candle_at(&self.candles, ts, self.viewport.bar_secs())
            .map(|c| legend_text(c, self.options.price_precision));
        let style = self.legend.style();
        match text {
            Some(text) => {
                self.legend.set_text_content(Some(&text));
                let _ = style.set_property("display", "block");
            }
            None => {
                let _ = style.set_property("display", "none");
            }
        }
    }

    fn clear_crosshair(&mut self) {
        self.crosshair = None;
        self.hovered = None;
        let _ = self.legend.style().set_property("display", "none");
    }

    /// Pan while dragging. Returns the new range when it moved.
    fn drag_to(&mut self, x: f64) -> Option<VisibleRange> {
        let drag = self.drag.as_mut()?;
        if (x - drag.start_x).abs() > CLICK_SLOP_PX {
            drag.moved = true;
        }
        if !drag.moved {
            return None;
        }
        let dx = x - drag.last_x;
        drag.last_x = x;
        if dx == 0.0 {
            return None;
        }
        self.viewport.pan_pixels(dx);
        self.has_range = true;
        Some(self.viewport.range())
    }

    /// Finish a drag. A press that never moved is a click.
    fn end_drag(&mut self, x: f64, y: f64) -> Option<ClickReport> {
        let drag = self.drag.take()?;
        if drag.moved {
            return None;
        }
        Some(ClickReport {
            marker_id: self.hovered.clone(),
            visible_range: self.viewport.range(),
            time: self.viewport.x_to_time(x),
            price: self.viewport.y_to_price(y),
        })
    }

    fn render(&mut self) {
        if self.removed {
            return;
        }
        let extra: Vec<f64> = self.price_line.iter().map(|l| l.price).collect();
        let visible = self.viewport.visible(&self.candles);
        self.viewport.autoscale(visible, &extra);
        let plot = plot_candles(&self.viewport, visible);
        self.glyphs = layout_markers(&self.markers, &self.candles, &self.viewport);

        let vp = &self.viewport;
        let opts = &self.options;
        let (plot_w, plot_h) = (vp.width(), vp.height());
        let backend = &mut self.backend;
        backend.begin_frame(&opts.background);

        let (lo, hi) = vp.price_bounds();
        for price in price_ticks(lo, hi, 6) {
            let y = vp.price_to_y(price);
            backend.draw_segment((0.0, y), (plot_w, y), &opts.grid_color, false);
            backend.draw_text(
                &format_price(price, opts.price_precision),
                plot_w + 6.0,
                y + 4.0,
                &opts.text_color,
                &opts.font,
                Align::Left,
            );
        }
        let range = vp.range();
        let max_ticks = ((plot_w / 110.0) as usize).max(2);
        let step = time_step(range, max_ticks);
        for ts in time_ticks(range, max_ticks) {
            let x = vp.time_to_x(ts);
            backend.draw_segment((x, 0.0), (x, plot_h), &opts.grid_color, false);
            backend.draw_text(
                &time_label(ts, step),
                x,
                plot_h + 16.0,
                &opts.text_color,
                &opts.font,
                Align::Center,
            );
        }

        backend.draw_candles(&plot, &opts.up_color, &opts.down_color);

        if let Some(line) = &self.price_line {
            let y = vp.price_to_y(line.price);
            backend.draw_segment((0.0, y), (plot_w, y), &line.color, true);
            backend.fill_rect(plot_w, y - 9.0, PRICE_AXIS_WIDTH, 18.0, &line.color);
            backend.draw_text(
                &format_price(line.price, opts.price_precision),
                plot_w + 4.0,
                y + 4.0,
                &opts.background,
                &opts.font,
                Align::Left,
            );
            if !line.title.is_empty() {
                backend.draw_text(&line.title, plot_w - 4.0, y - 4.0, &line.color, &opts.font, Align::Right);
            }
        }

        for glyph in &self.glyphs {
            backend.draw_marker(glyph, &opts.font);
        }

        if let Some((x, y)) = self.crosshair {
            backend.draw_segment((x, 0.0), (x, plot_h), &opts.crosshair_color, true);
            backend.draw_segment((0.0, y), (plot_w, y), &opts.crosshair_color, true);
            backend.fill_rect(plot_w, y - 9.0, PRICE_AXIS_WIDTH, 18.0, &opts.crosshair_color);
            backend.draw_text(
                &format_price(vp.y_to_price(y), opts.price_precision),
                plot_w + 4.0,
                y + 4.0,
                &opts.background,
                &opts.font,
                Align::Left,
            );
            let label = crosshair_label(vp.x_to_time(x));
            let box_w = label.len() as f64 * 6.5 + 10.0;
            backend.fill_rect(x - box_w / 2.0, plot_h, box_w, TIME_AXIS_HEIGHT, &opts.crosshair_color);
            backend.draw_text(&label, x, plot_h + 16.0, &opts.background, &opts.font, Align::Center);
        }
    }
}

fn schedule_render(inner: &Rc<RefCell<ChartInner>>) {
    {
        let mut chart = inner.borrow_mut();
        if chart.removed || chart.frame_pending {
            return;
        }
        chart.frame_pending = true;
    }
    let weak = Rc::downgrade(inner);
    let scheduled = request_frame(move || {
        if let Some(inner) = weak.upgrade() {
            let mut chart = inner.borrow_mut();
            chart.frame_pending = false;
            chart.render();
        }
    });
    if let Err(err) = scheduled {
        debug!(%err, "could not schedule chart frame");
        inner.borrow_mut().frame_pending = false;
    }
}

fn emit_range(inner: &Rc<RefCell<ChartInner>>, range: VisibleRange) {
    let subs: Vec<RangeCallback> = inner
        .borrow()
        .range_subs
        .iter()
        .map(|(_, cb)| cb.clone())
        .collect();
    for cb in subs {
        cb(range);
    }
}

fn emit_click(inner: &Rc<RefCell<ChartInner>>, report: &ClickReport) {
    let subs: Vec<ClickCallback> = inner
        .borrow()
        .click_subs
        .iter()
        .map(|(_, cb)| cb.clone())
        .collect();
    for cb in subs {
        cb(report);
    }
}

fn attach_listeners(
    inner: &Rc<RefCell<ChartInner>>,
    lifecycle: &mut ChartLifecycle,
) -> Result<(), ChartError> {
    let canvas = inner.borrow().backend.canvas().clone();
    let win = window()?;

    {
        let inner = inner.clone();
        listen(lifecycle, &win, "resize", ListenerKind::Resize, true, move |_| {
            inner.borrow_mut().resize_to_container();
            schedule_render(&inner);
        })?;
    }

    {
        let inner = inner.clone();
        let canvas_el = canvas.clone();
        listen(lifecycle, &canvas, "mousedown", ListenerKind::MouseDown, false, move |event| {
            let Some(ev) = as_mouse(&event) else { return };
            if ev.button() != 0 {
                return;
            }
            let (x, y) = local_point(&canvas_el, ev);
            let mut chart = inner.borrow_mut();
            if chart.removed || !chart.in_plot(x, y) {
                return;
            }
            ev.prevent_default();
            chart.drag = Some(DragState {
                start_x: x,
                last_x: x,
                moved: false,
            });
        })?;
    }

    {
        let inner = inner.clone();
        let canvas_el = canvas.clone();
        listen(lifecycle, &canvas, "mousemove", ListenerKind::MouseMove, true, move |event| {
            let Some(ev) = as_mouse(&event) else { return };
            let (x, y) = local_point(&canvas_el, ev);
            let moved = {
                let mut chart = inner.borrow_mut();
                if chart.removed {
                    return;
                }
                let moved = chart.drag_to(x);
                chart.update_crosshair(x, y);
                moved
            };
            if let Some(range) = moved {
                emit_range(&inner, range);
            }
            schedule_render(&inner);
        })?;
    }

    {
        let inner = inner.clone();
        let canvas_el = canvas.clone();
        listen(lifecycle, &win, "mouseup", ListenerKind::MouseUp, true, move |event| {
            let Some(ev) = as_mouse(&event) else { return };
            let (x, y) = local_point(&canvas_el, ev);
            let report = inner.borrow_mut().end_drag(x, y);
            if let Some(report) = report {
                debug!(marker = ?report.marker_id, "chart click");
                emit_click(&inner, &report);
            }
        })?;
    }

    {
        let inner = inner.clone();
        listen(lifecycle, &canvas, "mouseleave", ListenerKind::MouseLeave, true, move |_| {
            inner.borrow_mut().clear_crosshair();
            schedule_render(&inner);
        })?;
    }

    {
        let inner = inner.clone();
        let canvas_el = canvas.clone();
        listen(lifecycle, &canvas, "wheel", ListenerKind::Wheel, true, move |event| {
            let Some(ev) = event.dyn_ref::<WheelEvent>() else { return };
            let (x, _) = local_point(&canvas_el, ev);
            let factor = if ev.delta_y() < 0.0 { 0.9 } else { 1.1 };
            let range = {
                let mut chart = inner.borrow_mut();
                if chart.removed {
                    return;
                }
                chart.viewport.zoom_at(x, factor);
                chart.has_range = true;
                chart.viewport.range()
            };
            emit_range(&inner, range);
            schedule_render(&inner);
        })?;
    }

    Ok(())
}

/// Candlestick chart with position markers, an optional price line and an
/// OHLC legend, drawn on a canvas inside a container element.
///
/// Construction attaches DOM listeners; [`destroy`](Self::destroy) (or drop)
/// detaches every listener and subscription and removes the DOM nodes.
pub struct PositionChartHandle {
    inner: Rc<RefCell<ChartInner>>,
    lifecycle: RefCell<ChartLifecycle>,
}

impl PositionChartHandle {
    pub fn new(container_id: &str, options: ChartOptions) -> Result<Self, ChartError> {
        let container = element_by_id(container_id)?;
        container.style().set_property("position", "relative")?;
        let (canvas, ctx) = create_canvas(&container)?;

        let legend = document()?
            .create_element("div")?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ChartError::Js("legend cast failed".into()))?;
        legend.set_class_name("position-chart-legend");
        let style = legend.style();
        for (key, value) in [
            ("position", "absolute"),
            ("left", "8px"),
            ("top", "6px"),
            ("z-index", "2"),
            ("pointer-events", "none"),
            ("display", "none"),
            ("font-size", "11px"),
        ] {
            style.set_property(key, value)?;
        }
        style.set_property("color", &options.text_color)?;
        container.append_child(&legend)?;

        let viewport = Viewport::new(1.0, 1.0, Timeframe::default().duration_secs());
        let inner = Rc::new(RefCell::new(ChartInner {
            container,
            legend,
            backend: CanvasBackend::new(canvas, ctx, device_pixel_ratio()),
            options,
            viewport,
            has_range: false,
            candles: TimeSeries::new(),
            markers: Vec::new(),
            glyphs: Vec::new(),
            price_line: None,
            crosshair: None,
            hovered: None,
            drag: None,
            frame_pending: false,
            removed: false,
            next_sub: 1,
            click_subs: Vec::new(),
            range_subs: Vec::new(),
        }));
        inner.borrow_mut().resize_to_container();

        let mut lifecycle = ChartLifecycle::new();
        attach_listeners(&inner, &mut lifecycle)?;
        debug!(container = container_id, listeners = lifecycle.active_count(), "position chart created");

        let handle = Self {
            inner,
            lifecycle: RefCell::new(lifecycle),
        };
        schedule_render(&handle.inner);
        Ok(handle)
    }

    fn live(&self) -> Result<std::cell::RefMut<'_, ChartInner>, ChartError> {
        let chart = self.inner.borrow_mut();
        if chart.removed {
            return Err(ChartError::Removed);
        }
        Ok(chart)
    }

    /// Replace the candles. The first data set frames the latest bars.
    pub fn set_data(&self, candles: TimeSeries<Candle>, timeframe: Timeframe) -> Result<(), ChartError> {
        {
            let mut chart = self.live()?;
            chart.viewport.set_bar_secs(timeframe.duration_secs());
            if !chart.has_range && !candles.is_empty() {
                chart.viewport.fit_last(&candles, INITIAL_BARS);
                chart.has_range = true;
            }
            chart.candles = candles;
        }
        schedule_render(&self.inner);
        Ok(())
    }

    /// Replace every marker on the series.
    pub fn set_markers(&self, markers: Vec<Marker>) -> Result<(), ChartError> {
        self.live()?.markers = markers;
        schedule_render(&self.inner);
        Ok(())
    }

    pub fn set_price_line(&self, line: Option<PriceLine>) -> Result<(), ChartError> {
        self.live()?.price_line = line;
        schedule_render(&self.inner);
        Ok(())
    }

    /// Programmatic range changes do not notify range subscribers.
    pub fn set_visible_range(&self, range: VisibleRange) -> Result<(), ChartError> {
        {
            let mut chart = self.live()?;
            if !chart.viewport.set_range(range) {
                return Err(ChartError::InvalidRange {
                    from: range.from,
                    to: range.to,
                });
            }
            chart.has_range = true;
        }
        schedule_render(&self.inner);
        Ok(())
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.live().ok().map(|chart| chart.viewport.range())
    }

    pub fn apply_options(&self, options: ChartOptions) -> Result<(), ChartError> {
        {
            let mut chart = self.live()?;
            let _ = chart.legend.style().set_property("color", &options.text_color);
            chart.options = options;
            chart.resize_to_container();
        }
        schedule_render(&self.inner);
        Ok(())
    }

    pub fn subscribe_click(
        &self,
        callback: impl Fn(&ClickReport) + 'static,
    ) -> Result<SubscriptionId, ChartError> {
        let key = {
            let mut chart = self.live()?;
            let key = chart.next_sub;
            chart.next_sub += 1;
            chart.click_subs.push((key, Rc::new(callback)));
            key
        };
        let weak = Rc::downgrade(&self.inner);
        self.lifecycle
            .borrow_mut()
            .track(ListenerKind::ClickSubscription, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().click_subs.retain(|(k, _)| *k != key);
                }
            })
    }

    pub fn subscribe_visible_range_change(
        &self,
        callback: impl Fn(VisibleRange) + 'static,
    ) -> Result<SubscriptionId, ChartError> {
        let key = {
            let mut chart = self.live()?;
            let key = chart.next_sub;
            chart.next_sub += 1;
            chart.range_subs.push((key, Rc::new(callback)));
            key
        };
        let weak = Rc::downgrade(&self.inner);
        self.lifecycle
            .borrow_mut()
            .track(ListenerKind::RangeSubscription, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().range_subs.retain(|(k, _)| *k != key);
                }
            })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lifecycle.borrow_mut().release(id)
    }

    pub fn active_listener_count(&self) -> usize {
        self.lifecycle.borrow().active_count()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.borrow().removed
    }

    /// Detach everything and remove the DOM nodes. Safe to call twice.
    pub fn destroy(&self) {
        {
            let mut chart = self.inner.borrow_mut();
            if chart.removed {
                return;
            }
            chart.removed = true;
            chart.drag = None;
        }
        self.lifecycle.borrow_mut().teardown();
        let chart = self.inner.borrow();
        let _ = chart.container.remove_child(chart.backend.canvas());
        let _ = chart.container.remove_child(&chart.legend);
        debug!("position chart destroyed");
    }
}

impl Drop for PositionChartHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}
