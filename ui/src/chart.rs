use chart_frontend::{ChartOptions, ClickReport, PriceLine};
use leptos::*;
use position_engine::Marker;
use ts_core::{Candle, TimeSeries, Timeframe, VisibleRange};

#[cfg(target_arch = "wasm32")]
use chart_frontend::PositionChartHandle;
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

/// Candle chart for one loaded data set. The handle is built after mount and
/// destroyed on cleanup, so a new data set means a new chart.
#[component]
pub fn PositionChart(
    #[prop(into)] chart_id: String,
    candles: TimeSeries<Candle>,
    timeframe: Timeframe,
    #[prop(into)] markers: Signal<Vec<Marker>>,
    #[prop(into)] price_line: Signal<Option<PriceLine>>,
    #[prop(into)] visible_range: Signal<Option<VisibleRange>>,
    #[prop(into)] on_click: Callback<ClickReport>,
    #[prop(into)] on_range_change: Callback<VisibleRange>,
    #[prop(optional)] options: Option<ChartOptions>,
) -> impl IntoView {
    let container_id = format!("position-chart-{chart_id}");
    #[cfg(not(target_arch = "wasm32"))]
    let _ = (
        &candles,
        timeframe,
        markers,
        price_line,
        visible_range,
        on_click,
        on_range_change,
        &options,
    );

    #[cfg(target_arch = "wasm32")]
    {
        let handle = create_rw_signal::<Option<Rc<PositionChartHandle>>>(None);
        let alive = Rc::new(Cell::new(true));

        {
            let id = container_id.clone();
            let alive = alive.clone();
            let options = options.unwrap_or_default();
            spawn_local(async move {
                TimeoutFuture::new(0).await;
                if !alive.get() {
                    return;
                }
                let chart = match PositionChartHandle::new(&id, options) {
                    Ok(chart) => chart,
                    Err(err) => {
                        warn!(%err, container = %id, "position chart not created");
                        return;
                    }
                };
                if let Err(err) = chart.set_data(candles, timeframe) {
                    debug!(%err, "set_data failed");
                }
                let subscribed = chart
                    .subscribe_click(move |report| on_click.call(report.clone()))
                    .and_then(|_| {
                        chart.subscribe_visible_range_change(move |range| on_range_change.call(range))
                    });
                if let Err(err) = subscribed {
                    debug!(%err, "chart subscription failed");
                }
                handle.set(Some(Rc::new(chart)));
            });
        }

        create_effect(move |_| {
            let markers = markers.get();
            if let Some(chart) = handle.get() {
                if let Err(err) = chart.set_markers(markers) {
                    debug!(%err, "set_markers failed");
                }
            }
        });

        create_effect(move |_| {
            let line = price_line.get();
            if let Some(chart) = handle.get() {
                if let Err(err) = chart.set_price_line(line) {
                    debug!(%err, "set_price_line failed");
                }
            }
        });

        create_effect(move |_| {
            let range = visible_range.get();
            if let (Some(chart), Some(range)) = (handle.get(), range) {
                if chart.visible_range() == Some(range) {
                    return;
                }
                // A failed range update leaves the chart where it was.
                if let Err(err) = chart.set_visible_range(range) {
                    debug!(%err, from = range.from, to = range.to, "set_visible_range ignored");
                }
            }
        });

        on_cleanup(move || {
            alive.set(false);
            if let Some(chart) = handle.get_untracked() {
                chart.destroy();
            }
        });
    }

    view! { <div id=container_id class="position-chart"></div> }
}
