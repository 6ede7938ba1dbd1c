use leptos::*;
use ts_core::{Candle, TimeSeries, VisibleRange};

#[cfg(target_arch = "wasm32")]
use chart_frontend::{BrushChartHandle, ChartOptions};
#[cfg(target_arch = "wasm32")]
use gloo_timers::future::TimeoutFuture;
#[cfg(target_arch = "wasm32")]
use std::cell::Cell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use tracing::{debug, warn};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::spawn_local;

/// Daily close overview with a draggable range selection.
#[component]
pub fn BrushChart(
    #[prop(into)] chart_id: String,
    candles: TimeSeries<Candle>,
    #[prop(into)] selection: Signal<Option<VisibleRange>>,
    #[prop(into)] on_brush: Callback<VisibleRange>,
) -> impl IntoView {
    let container_id = format!("position-brush-{chart_id}");
    #[cfg(not(target_arch = "wasm32"))]
    let _ = (&candles, selection, on_brush);

    #[cfg(target_arch = "wasm32")]
    {
        let handle = create_rw_signal::<Option<Rc<BrushChartHandle>>>(None);
        let alive = Rc::new(Cell::new(true));

        {
            let id = container_id.clone();
            let alive = alive.clone();
            spawn_local(async move {
                TimeoutFuture::new(0).await;
                if !alive.get() {
                    return;
                }
                let brush = match BrushChartHandle::new(&id, ChartOptions::brush(), move |range| {
                    on_brush.call(range)
                }) {
                    Ok(brush) => brush,
                    Err(err) => {
                        warn!(%err, container = %id, "brush chart not created");
                        return;
                    }
                };
                if let Err(err) = brush.set_data(candles) {
                    debug!(%err, "brush set_data failed");
                }
                handle.set(Some(Rc::new(brush)));
            });
        }

        create_effect(move |_| {
            let range = selection.get();
            if let Some(brush) = handle.get() {
                if let Err(err) = brush.set_selection(range) {
                    debug!(%err, "brush set_selection failed");
                }
            }
        });

        on_cleanup(move || {
            alive.set(false);
            if let Some(brush) = handle.get_untracked() {
                brush.destroy();
            }
        });
    }

    view! { <div id=container_id class="position-brush"></div> }
}
