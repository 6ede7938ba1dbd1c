use data_feed::{ChartDataConfig, ChartDataFetcher, HttpChartDataSource};
use leptos::*;
use ts_core::{Timestamp, TimezoneOffset};

/// Shared by every chart mounted under the app: one candle cache and the
/// viewer's timezone.
#[derive(Clone)]
pub struct ChartCtx {
    pub fetcher: ChartDataFetcher<HttpChartDataSource>,
    pub tz: TimezoneOffset,
}

pub fn provide_chart_ctx(config: ChartDataConfig, tz: TimezoneOffset) -> ChartCtx {
    let ctx = ChartCtx {
        fetcher: ChartDataFetcher::new(HttpChartDataSource::new(config)),
        tz,
    };
    provide_context(ctx.clone());
    ctx
}

pub fn use_chart_ctx() -> ChartCtx {
    use_context::<ChartCtx>().expect("ChartCtx not provided")
}

/// Wall clock in UTC seconds.
#[cfg(target_arch = "wasm32")]
pub fn now_secs() -> Timestamp {
    (js_sys::Date::now() / 1000.0) as Timestamp
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_secs() -> Timestamp {
    chrono::Utc::now().timestamp()
}
