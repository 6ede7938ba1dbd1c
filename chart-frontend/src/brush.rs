use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use position_engine::{
    close_line, range_to_selection, selection_to_range, BrushInteraction, BrushScale,
};
use ts_core::{Candle, TimeSeries, VisibleRange};

use crate::backend::{CanvasBackend, RendererBackend};
use crate::dom::{
    as_mouse, create_canvas, device_pixel_ratio, element_by_id, layout_width, listen, local_point,
    request_frame, window,
};
use crate::error::ChartError;
use crate::lifecycle::{ChartLifecycle, ListenerKind};
use crate::options::ChartOptions;

const LINE_COLOR: &str = "#4f7cff";
const SELECTION_FILL: &str = "rgba(138, 180, 255, 0.18)";
const SELECTION_EDGE: &str = "rgba(138, 180, 255, 0.7)";

type BrushCallback = Rc<dyn Fn(VisibleRange)>;

struct BrushInner {
    container: web_sys::HtmlElement,
    backend: CanvasBackend,
    options: ChartOptions,
    width: f64,
    candles: TimeSeries<Candle>,
    interaction: BrushInteraction,
    frame_pending: bool,
    removed: bool,
}

impl BrushInner {
    fn scale(&self) -> Option<BrushScale> {
        BrushScale::for_series(&self.candles, self.width)
    }

    fn resize_to_container(&mut self) {
        let width = self
            .options
            .width
            .unwrap_or_else(|| layout_width(&self.container));
        let old = self.width;
        self.width = width;
        self.backend.resize(width, self.options.height);
        // keep the selection on the same fraction of the strip
        let selection = self.interaction.selection();
        self.interaction.set_width(width);
        if let (Some((a, b)), true) = (selection, old > 0.0) {
            let k = width / old;
            self.interaction.set_selection(Some((a * k, b * k)));
        }
    }

    fn render(&mut self) {
        if self.removed {
            return;
        }
        let height = self.options.height;
        self.backend.begin_frame(&self.options.background);
        let Some(scale) = self.scale() else { return };
        let line = close_line(&self.candles, &scale, height - 4.0);
        let line: Vec<(f64, f64)> = line.into_iter().map(|(x, y)| (x, y + 2.0)).collect();
        self.backend.draw_polyline(&line, LINE_COLOR, 1.0);
        if let Some((a, b)) = self.interaction.selection() {
            self.backend.fill_rect(a, 0.0, b - a, height, SELECTION_FILL);
            self.backend.draw_segment((a, 0.0), (a, height), SELECTION_EDGE, false);
            self.backend.draw_segment((b, 0.0), (b, height), SELECTION_EDGE, false);
        }
    }
}

fn schedule_render(inner: &Rc<RefCell<BrushInner>>) {
    {
        let mut brush = inner.borrow_mut();
        if brush.removed || brush.frame_pending {
            return;
        }
        brush.frame_pending = true;
    }
    let weak = Rc::downgrade(inner);
    let scheduled = request_frame(move || {
        if let Some(inner) = weak.upgrade() {
            let mut brush = inner.borrow_mut();
            brush.frame_pending = false;
            brush.render();
        }
    });
    if let Err(err) = scheduled {
        debug!(%err, "could not schedule brush frame");
        inner.borrow_mut().frame_pending = false;
    }
}

/// Overview strip of closing prices with a draggable selection. Finishing a
/// brush reports the enclosing candle range to `on_brush`.
pub struct BrushChartHandle {
    inner: Rc<RefCell<BrushInner>>,
    lifecycle: RefCell<ChartLifecycle>,
}

impl BrushChartHandle {
    pub fn new(
        container_id: &str,
        options: ChartOptions,
        on_brush: impl Fn(VisibleRange) + 'static,
    ) -> Result<Self, ChartError> {
        let container = element_by_id(container_id)?;
        let (canvas, ctx) = create_canvas(&container)?;
        canvas.style().set_property("cursor", "crosshair")?;
        let inner = Rc::new(RefCell::new(BrushInner {
            container,
            backend: CanvasBackend::new(canvas.clone(), ctx, device_pixel_ratio()),
            options,
            width: 0.0,
            candles: TimeSeries::new(),
            interaction: BrushInteraction::new(0.0),
            frame_pending: false,
            removed: false,
        }));
        inner.borrow_mut().resize_to_container();

        let on_brush: BrushCallback = Rc::new(on_brush);
        let mut lifecycle = ChartLifecycle::new();
        let win = window()?;

        {
            let inner = inner.clone();
            let canvas_el = canvas.clone();
            listen(&mut lifecycle, &canvas, "mousedown", ListenerKind::MouseDown, false, move |event| {
                let Some(ev) = as_mouse(&event) else { return };
                let (x, _) = local_point(&canvas_el, ev);
                {
                    let mut brush = inner.borrow_mut();
                    if brush.removed || brush.candles.is_empty() {
                        return;
                    }
                    ev.prevent_default();
                    brush.interaction.pointer_down(x);
                }
                schedule_render(&inner);
            })?;
        }

        {
            let inner = inner.clone();
            let canvas_el = canvas.clone();
            listen(&mut lifecycle, &win, "mousemove", ListenerKind::MouseMove, true, move |event| {
                let Some(ev) = as_mouse(&event) else { return };
                let (x, _) = local_point(&canvas_el, ev);
                let moved = {
                    let mut brush = inner.borrow_mut();
                    brush.interaction.is_dragging() && brush.interaction.pointer_move(x).is_some()
                };
                if moved {
                    schedule_render(&inner);
                }
            })?;
        }

        {
            let inner = inner.clone();
            let canvas_el = canvas.clone();
            listen(&mut lifecycle, &win, "mouseup", ListenerKind::MouseUp, true, move |event| {
                let Some(ev) = as_mouse(&event) else { return };
                let (x, _) = local_point(&canvas_el, ev);
                let range = {
                    let mut brush = inner.borrow_mut();
                    if !brush.interaction.is_dragging() {
                        return;
                    }
                    let selection = brush.interaction.pointer_up(x);
                    match (selection, brush.scale()) {
                        (Some(sel), Some(scale)) => selection_to_range(&brush.candles, &scale, sel),
                        _ => None,
                    }
                };
                schedule_render(&inner);
                if let Some(range) = range {
                    debug!(from = range.from, to = range.to, "brush end");
                    on_brush(range);
                }
            })?;
        }

        {
            let inner = inner.clone();
            listen(&mut lifecycle, &win, "resize", ListenerKind::Resize, true, move |_| {
                inner.borrow_mut().resize_to_container();
                schedule_render(&inner);
            })?;
        }

        debug!(container = container_id, listeners = lifecycle.active_count(), "brush chart created");
        let handle = Self {
            inner,
            lifecycle: RefCell::new(lifecycle),
        };
        schedule_render(&handle.inner);
        Ok(handle)
    }

    pub fn set_data(&self, candles: TimeSeries<Candle>) -> Result<(), ChartError> {
        {
            let mut brush = self.inner.borrow_mut();
            if brush.removed {
                return Err(ChartError::Removed);
            }
            brush.candles = candles;
            brush.interaction.set_selection(None);
        }
        schedule_render(&self.inner);
        Ok(())
    }

    /// Move the selection to cover `range`, or clear it. Does not notify.
    pub fn set_selection(&self, range: Option<VisibleRange>) -> Result<(), ChartError> {
        {
            let mut brush = self.inner.borrow_mut();
            if brush.removed {
                return Err(ChartError::Removed);
            }
            if brush.interaction.is_dragging() {
                return Ok(());
            }
            let selection = match (range, brush.scale()) {
                (Some(range), Some(scale)) => Some(range_to_selection(range, &scale)),
                _ => None,
            };
            brush.interaction.set_selection(selection);
        }
        schedule_render(&self.inner);
        Ok(())
    }

    pub fn active_listener_count(&self) -> usize {
        self.lifecycle.borrow().active_count()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.borrow().removed
    }

    pub fn destroy(&self) {
        {
            let mut brush = self.inner.borrow_mut();
            if brush.removed {
                return;
            }
            brush.removed = true;
        }
        self.lifecycle.borrow_mut().teardown();
        let brush = self.inner.borrow();
        let _ = brush.container.remove_child(brush.backend.canvas());
        debug!("brush chart destroyed");
    }
}

impl Drop for BrushChartHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}
