//! Small DOM helpers shared by the chart widgets.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, CanvasRenderingContext2d, Document, Event, EventTarget,
    HtmlCanvasElement, HtmlElement, MouseEvent, Window,
};

use crate::error::ChartError;
use crate::lifecycle::{ChartLifecycle, ListenerKind};

pub(crate) fn window() -> Result<Window, ChartError> {
    web_sys::window().ok_or_else(|| ChartError::MissingElement("window".into()))
}

pub(crate) fn document() -> Result<Document, ChartError> {
    window()?
        .document()
        .ok_or_else(|| ChartError::MissingElement("document".into()))
}

pub(crate) fn element_by_id(id: &str) -> Result<HtmlElement, ChartError> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| ChartError::MissingElement(id.to_string()))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| ChartError::MissingElement(format!("{id} is not an html element")))
}

/// Append a canvas filling `container` and return it with its 2d context.
pub(crate) fn create_canvas(
    container: &HtmlElement,
) -> Result<(HtmlCanvasElement, CanvasRenderingContext2d), ChartError> {
    let canvas = document()?
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| ChartError::Js("canvas cast failed".into()))?;
    let style = canvas.style();
    style.set_property("display", "block")?;
    style.set_property("width", "100%")?;
    container.append_child(&canvas)?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| ChartError::Js("no 2d context".into()))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| ChartError::Js("2d context cast failed".into()))?;
    Ok((canvas, ctx))
}

pub(crate) fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .filter(|r| *r > 0.0)
        .unwrap_or(1.0)
}

/// Width the container currently lays out at.
pub(crate) fn layout_width(container: &HtmlElement) -> f64 {
    container.get_bounding_client_rect().width().max(1.0)
}

/// Pointer position relative to `canvas`, in CSS pixels.
pub(crate) fn local_point(canvas: &HtmlCanvasElement, event: &MouseEvent) -> (f64, f64) {
    let rect = canvas.get_bounding_client_rect();
    (
        event.client_x() as f64 - rect.left(),
        event.client_y() as f64 - rect.top(),
    )
}

/// Attach `handler` to `target` and hand the detach thunk to `lifecycle`.
pub(crate) fn listen(
    lifecycle: &mut ChartLifecycle,
    target: &EventTarget,
    event: &'static str,
    kind: ListenerKind,
    passive: bool,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), ChartError> {
    let closure = Closure::<dyn FnMut(Event)>::wrap(Box::new(handler));
    let opts = AddEventListenerOptions::new();
    opts.set_passive(passive);
    target.add_event_listener_with_callback_and_add_event_listener_options(
        event,
        closure.as_ref().unchecked_ref(),
        &opts,
    )?;
    let target = target.clone();
    lifecycle.track(kind, move || {
        let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        drop(closure);
    })?;
    Ok(())
}

/// Run `f` on the next animation frame.
pub(crate) fn request_frame(f: impl FnOnce() + 'static) -> Result<(), ChartError> {
    let cb = Closure::once_into_js(f);
    window()?.request_animation_frame(cb.unchecked_ref::<js_sys::Function>())?;
    Ok(())
}

pub(crate) fn as_mouse(event: &Event) -> Option<&MouseEvent> {
    event.dyn_ref::<MouseEvent>()
}
