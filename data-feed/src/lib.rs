use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use ts_core::{Candle, Timeframe, Timestamp};

const DEFAULT_BASE_URL: &str = "https://api.copin.io";
const BASE_URL_KEY: &str = "COPIN_CHART_API_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDataConfig {
    pub base_url: String,
}

impl ChartDataConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for ChartDataConfig {
    fn default() -> Self {
        let base_url = configured_base_url().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self { base_url }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn configured_base_url() -> Option<String> {
    std::env::var(BASE_URL_KEY)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(target_arch = "wasm32")]
fn configured_base_url() -> Option<String> {
    use wasm_bindgen::JsValue;
    js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(BASE_URL_KEY))
        .ok()
        .and_then(|v| v.as_string())
        .filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Error)]
pub enum ChartDataError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("candle api returned status {0}")]
    Status(u16),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// One candle request: symbol, bucket size and a UTC window in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartDataQuery {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub from: Timestamp,
    pub to: Timestamp,
}

impl ChartDataQuery {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        from: Timestamp,
        to: Timestamp,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            from,
            to,
        }
    }

    pub fn cache_key(&self) -> String {
        format!(
            "chart:{}:{}:{}:{}",
            self.symbol,
            self.timeframe.name(),
            self.from,
            self.to
        )
    }

    fn validate(&self) -> Result<(), ChartDataError> {
        if self.symbol.trim().is_empty() {
            return Err(ChartDataError::InvalidQuery("empty symbol".to_string()));
        }
        if self.from >= self.to {
            return Err(ChartDataError::InvalidQuery(format!(
                "from {} is not before to {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

/// Backend seam for OHLC series. Returned candles are in UTC seconds.
#[allow(async_fn_in_trait)]
pub trait ChartDataSource {
    async fn get_chart_data(&self, query: &ChartDataQuery) -> Result<Vec<Candle>, ChartDataError>;
}

#[derive(Debug, Deserialize)]
struct ChartBar {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

fn bars_to_candles(bars: Vec<ChartBar>) -> Vec<Candle> {
    let mut candles: Vec<Candle> = bars
        .into_iter()
        .filter(|b| b.open.is_finite() && b.close.is_finite())
        .map(|b| Candle {
            time: b.timestamp.div_euclid(1_000),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .collect();
    candles.sort_by_key(|c| c.time);
    candles
}

/// `GET {base}/candles/v2?symbol&timeframe&from&to` with millisecond bounds.
#[derive(Clone)]
pub struct HttpChartDataSource {
    config: ChartDataConfig,
    http: reqwest::Client,
}

impl HttpChartDataSource {
    pub fn new(config: ChartDataConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ChartDataConfig {
        &self.config
    }
}

impl ChartDataSource for HttpChartDataSource {
    async fn get_chart_data(&self, query: &ChartDataQuery) -> Result<Vec<Candle>, ChartDataError> {
        query.validate()?;
        let url = format!("{}/candles/v2", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("symbol", query.symbol.as_str()),
                ("timeframe", query.timeframe.name()),
            ])
            .query(&[("from", query.from * 1_000), ("to", query.to * 1_000)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChartDataError::Status(resp.status().as_u16()));
        }
        let bars: Vec<ChartBar> = resp.json().await?;
        Ok(bars_to_candles(bars))
    }
}

pub type CandleData = Rc<Vec<Candle>>;

type PendingFetch = Shared<LocalBoxFuture<'static, Option<CandleData>>>;

enum CacheSlot {
    Pending(PendingFetch),
    Ready(CandleData),
}

/// Query-keyed candle cache for the UI thread.
///
/// Concurrent requests for one key share a single in-flight fetch. Failures
/// are not retried: they resolve to `None` and leave no cache entry behind.
pub struct ChartDataFetcher<S> {
    source: Rc<S>,
    cache: Rc<RefCell<HashMap<String, CacheSlot>>>,
}

impl<S> Clone for ChartDataFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: ChartDataSource + 'static> ChartDataFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Rc::new(source),
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub async fn fetch(&self, query: ChartDataQuery) -> Option<CandleData> {
        let key = query.cache_key();
        let pending = {
            let mut cache = self.cache.borrow_mut();
            match cache.get(&key) {
                Some(CacheSlot::Ready(candles)) => {
                    debug!(%key, "candle cache hit");
                    return Some(candles.clone());
                }
                Some(CacheSlot::Pending(fut)) => fut.clone(),
                None => {
                    let fut = self.request(query).boxed_local().shared();
                    cache.insert(key.clone(), CacheSlot::Pending(fut.clone()));
                    fut
                }
            }
        };

        let result = pending.clone().await;
        let mut cache = self.cache.borrow_mut();
        // Only the fetch still parked in the slot may settle it: an
        // invalidation or a newer request for the key must survive.
        let owns_slot = matches!(
            cache.get(&key),
            Some(CacheSlot::Pending(current)) if current.ptr_eq(&pending)
        );
        if owns_slot {
            match &result {
                Some(candles) => {
                    cache.insert(key, CacheSlot::Ready(candles.clone()));
                }
                None => {
                    cache.remove(&key);
                }
            }
        }
        result
    }

    fn request(&self, query: ChartDataQuery) -> impl std::future::Future<Output = Option<CandleData>> {
        let source = self.source.clone();
        async move {
            match source.get_chart_data(&query).await {
                Ok(candles) => {
                    debug!(
                        symbol = %query.symbol,
                        timeframe = %query.timeframe,
                        count = candles.len(),
                        "candles loaded"
                    );
                    Some(Rc::new(candles))
                }
                Err(err) => {
                    warn!(symbol = %query.symbol, timeframe = %query.timeframe, %err, "candle fetch failed");
                    None
                }
            }
        }
    }

    pub fn is_cached(&self, query: &ChartDataQuery) -> bool {
        matches!(
            self.cache.borrow().get(&query.cache_key()),
            Some(CacheSlot::Ready(_))
        )
    }

    pub fn invalidate(&self, query: &ChartDataQuery) {
        self.cache.borrow_mut().remove(&query.cache_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockSource {
        calls: Rc<Cell<u32>>,
        fail: bool,
    }

    impl MockSource {
        fn new(fail: bool) -> (Self, Rc<Cell<u32>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Self {
                    calls: calls.clone(),
                    fail,
                },
                calls,
            )
        }
    }

    impl ChartDataSource for MockSource {
        async fn get_chart_data(
            &self,
            query: &ChartDataQuery,
        ) -> Result<Vec<Candle>, ChartDataError> {
            self.calls.set(self.calls.get() + 1);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(ChartDataError::Status(500));
            }
            Ok(vec![Candle {
                time: query.from,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
            }])
        }
    }

    fn query(symbol: &str) -> ChartDataQuery {
        ChartDataQuery::new(symbol, Timeframe::H1, 1_000, 2_000)
    }

    #[test]
    fn cache_key_includes_every_field() {
        let q = query("BTC");
        assert_eq!(q.cache_key(), "chart:BTC:1h:1000:2000");
        let other = ChartDataQuery::new("BTC", Timeframe::H4, 1_000, 2_000);
        assert_ne!(q.cache_key(), other.cache_key());
    }

    #[test]
    fn invalid_queries_are_rejected() {
        assert!(ChartDataQuery::new("", Timeframe::H1, 0, 10).validate().is_err());
        assert!(ChartDataQuery::new("ETH", Timeframe::H1, 10, 10).validate().is_err());
        assert!(query("ETH").validate().is_ok());
    }

    #[test]
    fn bars_are_converted_to_sorted_second_candles() {
        let bars: Vec<ChartBar> = serde_json::from_str(
            r#"[
                {"timestamp": 7200000, "open": 2.0, "high": 3.0, "low": 1.0, "close": 2.5},
                {"timestamp": 3600000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}
            ]"#,
        )
        .unwrap();
        let candles = bars_to_candles(bars);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 3_600);
        assert_eq!(candles[1].close, 2.5);
    }

    #[test]
    fn default_config_has_base_url() {
        let cfg = ChartDataConfig::default().with_base_url("http://localhost:9000");
        assert_eq!(cfg.base_url, "http://localhost:9000");
    }

    #[tokio::test]
    async fn concurrent_identical_queries_share_one_request() {
        let (source, calls) = MockSource::new(false);
        let fetcher = ChartDataFetcher::new(source);
        let (a, b) = tokio::join!(fetcher.fetch(query("BTC")), fetcher.fetch(query("BTC")));
        assert_eq!(calls.get(), 1);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert!(fetcher.is_cached(&query("BTC")));
    }

    #[tokio::test]
    async fn cached_results_skip_the_source() {
        let (source, calls) = MockSource::new(false);
        let fetcher = ChartDataFetcher::new(source);
        fetcher.fetch(query("BTC")).await.unwrap();
        fetcher.fetch(query("BTC")).await.unwrap();
        fetcher.fetch(query("ETH")).await.unwrap();
        assert_eq!(calls.get(), 2);

        fetcher.invalidate(&query("BTC"));
        fetcher.fetch(query("BTC")).await.unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn invalidation_during_a_fetch_is_not_undone() {
        let (source, calls) = MockSource::new(false);
        let fetcher = ChartDataFetcher::new(source);
        let mut first = fetcher.fetch(query("BTC")).boxed_local();
        assert!(futures_util::poll!(&mut first).is_pending());

        fetcher.invalidate(&query("BTC"));
        assert!(first.await.is_some());
        assert!(!fetcher.is_cached(&query("BTC")));

        fetcher.fetch(query("BTC")).await.unwrap();
        assert_eq!(calls.get(), 2);
        assert!(fetcher.is_cached(&query("BTC")));
    }

    #[tokio::test]
    async fn stale_failure_keeps_the_newer_request_shared() {
        let (source, calls) = MockSource::new(true);
        let fetcher = ChartDataFetcher::new(source);
        let mut stale = fetcher.fetch(query("BTC")).boxed_local();
        assert!(futures_util::poll!(&mut stale).is_pending());

        fetcher.invalidate(&query("BTC"));
        let mut fresh = fetcher.fetch(query("BTC")).boxed_local();
        assert!(futures_util::poll!(&mut fresh).is_pending());
        assert_eq!(calls.get(), 2);

        // The stale request fails while the fresh one is still in flight.
        assert!(stale.await.is_none());
        let (fresh, joined) = tokio::join!(fresh, fetcher.fetch(query("BTC")));
        assert!(fresh.is_none() && joined.is_none());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn failures_yield_no_data_without_retry() {
        let (source, calls) = MockSource::new(true);
        let fetcher = ChartDataFetcher::new(source);
        assert!(fetcher.fetch(query("BTC")).await.is_none());
        assert_eq!(calls.get(), 1);
        assert!(!fetcher.is_cached(&query("BTC")));

        // A later mount asks again.
        assert!(fetcher.fetch(query("BTC")).await.is_none());
        assert_eq!(calls.get(), 2);
    }
}
