use chart_frontend::{ClickReport, PriceLine};
use data_feed::ChartDataQuery;
use leptos::*;
use position_engine::{
    candle_window, overview_window, ChartCommand, ChartContext, ChartViewState, PositionData,
    RangeDebouncer,
};
use tracing::debug;
use ts_core::{
    prepare_candles, Candle, TimeSeries, Timeframe, Timestamp, TimezoneOffset, VisibleRange,
};

use crate::brush::BrushChart;
use crate::chart::PositionChart;
use crate::legend::{PositionLegend, SeeMore, TimeframeSelector};
use crate::state::{now_secs, use_chart_ctx, ChartCtx};

#[cfg(target_arch = "wasm32")]
use gloo_timers::callback::Timeout;

/// Candles of one completed fetch, already in chart time.
#[derive(Debug, Clone, PartialEq)]
struct LoadedCandles {
    timeframe: Timeframe,
    series: TimeSeries<Candle>,
}

/// Split loaded positions into the open and closed lists the marker
/// renderer takes.
pub fn split_positions(positions: &[PositionData]) -> (Vec<PositionData>, Vec<PositionData>) {
    positions.iter().cloned().partition(|p| !p.is_closed())
}

#[derive(Clone, Copy)]
struct ChartEnv {
    first_candle: Memo<Option<Timestamp>>,
    is_expanded: Signal<bool>,
    has_next_page: Signal<bool>,
    is_all_tokens: bool,
    tz: TimezoneOffset,
    now: Timestamp,
}

impl ChartEnv {
    fn context<'a>(&self, positions: &'a [PositionData]) -> ChartContext<'a> {
        ChartContext {
            positions,
            first_candle_time: self.first_candle.get_untracked(),
            is_expanded: self.is_expanded.get_untracked(),
            is_all_tokens: self.is_all_tokens,
            has_next_page: self.has_next_page.get_untracked(),
            tz: self.tz,
            now: self.now,
        }
    }
}

/// Position chart of one trading pair: candles with position markers, the
/// timeframe selector, the legend of the highlighted position and, when
/// expanded, the brush overview.
#[component]
pub fn ChartPositions(
    #[prop(into)] chart_id: String,
    #[prop(into)] currency: Signal<String>,
    #[prop(into)] positions: Signal<Vec<PositionData>>,
    #[prop(into)] is_expanded: Signal<bool>,
    #[prop(into)] on_expand: Callback<()>,
    #[prop(into)] on_fetch_next_page: Callback<()>,
    #[prop(into, optional)] target_id: MaybeSignal<Option<String>>,
    #[prop(into, optional)] has_next_page: MaybeSignal<bool>,
    #[prop(optional)] is_all_tokens: bool,
    #[prop(optional)] timeframe: Option<Timeframe>,
) -> impl IntoView {
    let ChartCtx { fetcher, tz } = use_chart_ctx();
    let now = now_secs();
    let view_state =
        create_rw_signal(ChartViewState::for_mode(timeframe, is_expanded.get_untracked()));

    let current_tf = create_memo(move |_| view_state.with(|s| s.timeframe()));
    let visible_range = create_memo(move |_| view_state.with(|s| s.visible_range()));
    let show_see_more = create_memo(move |_| view_state.with(|s| s.show_see_more()));

    let query = create_memo(move |_| {
        let tf = current_tf.get();
        let window = positions.with(|ps| candle_window(tf, ps, now));
        ChartDataQuery::new(currency.get(), tf, window.from, window.to)
    });
    let candle_data = {
        let fetcher = fetcher.clone();
        create_local_resource(
            move || query.get(),
            move |query: ChartDataQuery| {
                let fetcher = fetcher.clone();
                async move {
                    let timeframe = query.timeframe;
                    let raw = fetcher.fetch(query).await?;
                    let series = prepare_candles(raw.as_ref().clone(), timeframe, tz);
                    (!series.is_empty()).then_some(LoadedCandles { timeframe, series })
                }
            },
        )
    };
    let candles = create_memo(move |_| candle_data.get().flatten());
    let first_candle = create_memo(move |_| {
        candles.with(|c| c.as_ref().and_then(|c| c.series.first().map(|c| c.time)))
    });

    let overview_query = create_memo(move |_| {
        is_expanded.get().then(|| {
            let window = overview_window(now);
            ChartDataQuery::new(currency.get(), Timeframe::D1, window.from, window.to)
        })
    });
    let overview_data = create_local_resource(
        move || overview_query.get(),
        move |query: Option<ChartDataQuery>| {
            let fetcher = fetcher.clone();
            async move {
                let raw = fetcher.fetch(query?).await?;
                let series = prepare_candles(raw.as_ref().clone(), Timeframe::D1, tz);
                (!series.is_empty()).then_some(series)
            }
        },
    );
    let overview = create_memo(move |_| overview_data.get().flatten());

    let env = ChartEnv {
        first_candle,
        is_expanded,
        has_next_page: Signal::derive(move || has_next_page.get()),
        is_all_tokens,
        tz,
        now,
    };

    // Deep link: follow the target once it is among the loaded positions.
    create_effect(move |_| {
        let target = target_id.get();
        let focused = view_state.with_untracked(|s| s.target_id().map(str::to_owned));
        if target == focused {
            return;
        }
        positions.with(|ps| {
            let ctx = env.context(ps);
            match target.as_deref().and_then(|id| ps.iter().find(|p| p.id == id)) {
                Some(target) => view_state.update(|s| s.focus_target(target, &ctx)),
                None if focused.is_some() => view_state.update(|s| s.clear_target()),
                None => {}
            }
        });
    });

    create_effect(move |prev: Option<String>| {
        let current = currency.get();
        if prev.is_some_and(|prev| prev != current) {
            positions.with_untracked(|ps| {
                let ctx = env.context(ps);
                view_state.update(|s| s.change_currency(&ctx));
            });
        }
        current
    });

    create_effect(move |prev: Option<bool>| {
        let expanded = is_expanded.get();
        if prev.is_some_and(|prev| prev != expanded) {
            view_state.update(|s| s.set_expanded(expanded));
        }
        expanded
    });

    create_effect(move |_| {
        if candle_data.loading().get() || first_candle.get().is_none() {
            return;
        }
        if positions.with(|ps| ps.is_empty()) {
            return;
        }
        let pending = view_state.with(|s| s.visible_range().is_none() && s.target_id().is_none());
        if pending {
            positions.with_untracked(|ps| {
                let ctx = env.context(ps);
                view_state.update(|s| {
                    s.resolve_default_range(&ctx);
                });
            });
        }
    });

    let run_command = move |command: Option<ChartCommand>| match command {
        Some(ChartCommand::FetchNextPage) => on_fetch_next_page.call(()),
        Some(ChartCommand::ShowSeeMore) => {
            debug!("see more revealed");
        }
        None => {}
    };

    let handle_range = move |range: VisibleRange| {
        let command = positions.with_untracked(|ps| {
            let ctx = env.context(ps);
            view_state.try_update(|s| s.on_visible_range_changed(range, &ctx))
        });
        run_command(command.flatten());
    };

    let debouncer = store_value(RangeDebouncer::default());

    #[cfg(target_arch = "wasm32")]
    let on_range_change = {
        let timer = store_value::<Option<Timeout>>(None);
        on_cleanup(move || {
            debouncer.update_value(RangeDebouncer::cancel);
            timer.set_value(None);
        });
        move |range: VisibleRange| {
            let ticket = debouncer
                .try_update_value(|d| d.push(range, js_sys::Date::now() as u64))
                .unwrap_or_default();
            let delay = debouncer.with_value(|d| d.delay_ms()) as u32;
            // Replacing the timer drops and cancels the previous one.
            timer.set_value(Some(Timeout::new(delay, move || {
                if let Some(range) = debouncer.try_update_value(|d| d.fire(ticket)).flatten() {
                    handle_range(range);
                }
            })));
        }
    };
    // No timer off the browser: each event counts as past its quiet period.
    #[cfg(not(target_arch = "wasm32"))]
    let on_range_change = move |range: VisibleRange| {
        let due = debouncer.try_update_value(|d| {
            let now = d.delay_ms();
            d.push(range, 0);
            d.poll(now)
        });
        if let Some(range) = due.flatten() {
            handle_range(range);
        }
    };

    let on_click = move |report: ClickReport| {
        debug!(marker = ?report.marker_id, hit = report.hit_marker(), "chart click");
        view_state.update(|s| s.select_marker(report.marker_id, report.visible_range));
    };

    let on_brush = move |range: VisibleRange| {
        let command = positions.with_untracked(|ps| {
            let ctx = env.context(ps);
            view_state.try_update(|s| {
                s.apply_brush(range);
                s.request_next_page(&ctx)
            })
        });
        run_command(command.flatten());
    };

    let on_timeframe = move |tf: Timeframe| {
        positions.with_untracked(|ps| {
            let ctx = env.context(ps);
            view_state.update(|s| {
                s.select_timeframe(tf, &ctx);
            });
        });
    };

    let markers = create_memo(move |_| {
        positions.with(|ps| {
            let (open, closed) = split_positions(ps);
            view_state.with(|s| s.markers(&open, &closed, tz))
        })
    });
    let selected = create_memo(move |_| {
        positions.with(|ps| view_state.with(|s| s.selected_position(ps).cloned()))
    });
    let price_line = Signal::derive(move || {
        selected.with(|p| p.as_ref().map(|p| PriceLine::average_price(p.average_price)))
    });
    let see_more = Signal::derive(move || !is_expanded.get() && show_see_more.get());

    let main_id = chart_id.clone();
    let chart_body = move || {
        if candle_data.loading().get() {
            return view! { <div class="chart-spinner" aria-label="Loading"></div> }.into_view();
        }
        match candles.get() {
            Some(LoadedCandles { timeframe, series }) => view! {
                <PositionChart
                    chart_id=main_id.clone()
                    candles=series
                    timeframe=timeframe
                    markers=markers
                    price_line=price_line
                    visible_range=visible_range
                    on_click=on_click
                    on_range_change=on_range_change
                />
            }
            .into_view(),
            None => view! { <div class="chart-empty">"No data found"</div> }.into_view(),
        }
    };

    let brush_id = chart_id;
    let brush = move || {
        overview.get().map(|series| {
            view! {
                <BrushChart
                    chart_id=brush_id.clone()
                    candles=series
                    selection=visible_range
                    on_brush=on_brush
                />
            }
        })
    };

    view! {
        <div class="chart-positions">
            <div class="chart-toolbar">
                <TimeframeSelector current=current_tf expanded=is_expanded on_select=on_timeframe/>
                <SeeMore visible=see_more on_expand=on_expand/>
            </div>
            <div class="chart-body">
                {chart_body}
                <PositionLegend position=selected/>
            </div>
            <Show when=move || is_expanded.get()>
                {brush.clone()}
            </Show>
        </div>
    }
}
