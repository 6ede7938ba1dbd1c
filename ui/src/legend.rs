use chrono::{DateTime, Utc};
use leptos::*;
use position_engine::{format_pnl, PositionData};
use ts_core::Timeframe;

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%d %b %y %H:%M").to_string()
}

fn format_usd(value: f64) -> String {
    if value.abs() >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${value:.2}")
    }
}

/// Label/value pairs shown for the highlighted position.
pub fn legend_rows(position: &PositionData) -> Vec<(&'static str, String)> {
    let side = if position.is_long { "Long" } else { "Short" };
    let mut rows = vec![
        ("Side", format!("{side} {:.1}x", position.leverage)),
        ("Entry", format!("{:.4}", position.average_price)),
        ("Size", format_usd(position.size)),
        ("Opened", format_time(position.open_block_time)),
    ];
    if let Some(closed) = position.close_block_time.filter(|_| position.is_closed()) {
        rows.push(("Closed", format_time(closed)));
    }
    if position.is_liquidated() {
        rows.push(("PnL", "Liquidated".to_string()));
    } else {
        rows.push(("PnL", format_pnl(position.pnl)));
    }
    rows
}

#[component]
pub fn PositionLegend(#[prop(into)] position: Signal<Option<PositionData>>) -> impl IntoView {
    move || {
        position.get().map(|p| {
            let tone = if p.is_long { "legend-long" } else { "legend-short" };
            let rows = legend_rows(&p)
                .into_iter()
                .map(|(label, value)| {
                    view! {
                        <div class="legend-row">
                            <span class="legend-label">{label}</span>
                            <span class="legend-value">{value}</span>
                        </div>
                    }
                })
                .collect_view();
            view! {
                <div class=format!("position-legend {tone}")>
                    <div class="legend-title">{p.pair.clone().unwrap_or_else(|| p.index_token.clone())}</div>
                    {rows}
                </div>
            }
        })
    }
}

#[component]
pub fn TimeframeSelector(
    #[prop(into)] current: Signal<Timeframe>,
    #[prop(into)] expanded: Signal<bool>,
    #[prop(into)] on_select: Callback<Timeframe>,
) -> impl IntoView {
    view! {
        <div class="timeframe-selector">
            {move || {
                Timeframe::selectable(expanded.get())
                    .map(|tf| {
                        let active = move || current.get() == tf;
                        view! {
                            <button
                                class="tf-button"
                                class:active=active
                                on:click=move |_| on_select.call(tf)
                            >
                                {tf.label()}
                            </button>
                        }
                    })
                    .collect_view()
            }}
        </div>
    }
}

/// Shown in the collapsed layout once the user scrolls the chart.
#[component]
pub fn SeeMore(#[prop(into)] visible: Signal<bool>, #[prop(into)] on_expand: Callback<()>) -> impl IntoView {
    view! {
        <Show when=move || visible.get()>
            <button class="see-more" on:click=move |_| on_expand.call(())>
                "See more"
            </button>
        </Show>
    }
}
