use crate::{chart_positions::ChartPositions, state::provide_chart_ctx, theme::GLOBAL_CSS};
use data_feed::ChartDataConfig;
use leptos::*;
use position_engine::PositionData;
use serde::Deserialize;
use tracing::{debug, warn};
use ts_core::{Timeframe, TimezoneOffset};

#[cfg(target_arch = "wasm32")]
use js_sys::Reflect;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

const CONFIG_KEY: &str = "COPIN_CHART_CONFIG";

/// Mount configuration, read as JSON from the `COPIN_CHART_CONFIG` global.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub api_base: Option<String>,
    pub currency: String,
    pub positions: Vec<PositionData>,
    pub target_id: Option<String>,
    pub expanded: bool,
    pub is_all_tokens: bool,
    pub has_next_page: bool,
    pub timeframe: Option<Timeframe>,
    /// Minutes behind UTC, as `Date.getTimezoneOffset` reports them. Defaults
    /// to the browser's zone.
    pub timezone_offset: Option<i32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            currency: "BTC".to_string(),
            positions: Vec::new(),
            target_id: None,
            expanded: false,
            is_all_tokens: false,
            has_next_page: false,
            timeframe: None,
            timezone_offset: None,
        }
    }
}

impl AppConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn data_config(&self) -> ChartDataConfig {
        match &self.api_base {
            Some(base) => ChartDataConfig::default().with_base_url(base.clone()),
            None => ChartDataConfig::default(),
        }
    }

    pub fn tz(&self) -> TimezoneOffset {
        self.timezone_offset
            .map(TimezoneOffset::from_minutes)
            .unwrap_or_else(TimezoneOffset::local)
    }

    /// Currency of the deep-linked position, falling back to the configured
    /// one.
    pub fn initial_currency(&self) -> String {
        self.target_id
            .as_deref()
            .and_then(|id| self.positions.iter().find(|p| p.id == id))
            .map(|p| p.symbol().to_string())
            .unwrap_or_else(|| self.currency.clone())
    }
}

#[cfg(target_arch = "wasm32")]
fn read_global(key: &str) -> Option<String> {
    Reflect::get(&js_sys::global(), &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

#[cfg(not(target_arch = "wasm32"))]
fn read_global(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn load_config() -> AppConfig {
    match read_global(CONFIG_KEY) {
        Some(raw) => AppConfig::from_json(&raw).unwrap_or_else(|err| {
            warn!(%err, "invalid {CONFIG_KEY}, using defaults");
            AppConfig::default()
        }),
        None => AppConfig::default(),
    }
}

#[component]
pub fn App() -> impl IntoView {
    let config = load_config();
    provide_chart_ctx(config.data_config(), config.tz());

    let currency = create_rw_signal(config.initial_currency());
    let positions = create_rw_signal(config.positions.clone());
    let expanded = create_rw_signal(config.expanded);
    let has_next_page = create_rw_signal(config.has_next_page);

    let on_expand = move |_: ()| expanded.set(true);
    // The host page owns paging; without one there is nothing more to load.
    let on_fetch_next_page = move |_: ()| {
        debug!(loaded = positions.with_untracked(Vec::len), "next page requested");
        has_next_page.set(false);
    };

    view! {
        <style>{GLOBAL_CSS}</style>
        <div class="app-root">
            <div class="app-header">
                <span class="legend-title">{move || currency.get()}</span>
                <Show when=move || expanded.get()>
                    <button class="see-more" on:click=move |_| expanded.set(false)>
                        "Collapse"
                    </button>
                </Show>
            </div>
            <ChartPositions
                chart_id="main"
                currency=currency
                positions=positions
                is_expanded=expanded
                on_expand=on_expand
                on_fetch_next_page=on_fetch_next_page
                target_id=config.target_id.clone()
                has_next_page=has_next_page
                is_all_tokens=config.is_all_tokens
                timeframe=config.timeframe.unwrap_or_default()
            />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = AppConfig::from_json(r#"{"currency": "ETH", "expanded": true}"#).unwrap();
        assert_eq!(config.currency, "ETH");
        assert!(config.expanded);
        assert!(config.positions.is_empty());
        assert_eq!(config.timeframe, None);
    }

    #[test]
    fn explicit_offset_wins_over_browser_zone() {
        let config = AppConfig::from_json(r#"{"timezoneOffset": -120}"#).unwrap();
        assert_eq!(config.tz(), TimezoneOffset::from_minutes(-120));
    }

    #[test]
    fn target_position_picks_the_currency() {
        let config = AppConfig::from_json(
            r#"{
                "currency": "BTC",
                "targetId": "p9",
                "positions": [{
                    "id": "p9",
                    "indexToken": "0xeth",
                    "pair": "ETH-USDT",
                    "isLong": true,
                    "status": "OPEN",
                    "openBlockTime": "2024-03-01T10:00:00Z"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.initial_currency(), "ETH");
    }

    #[test]
    fn api_base_overrides_the_default() {
        let config = AppConfig::from_json(r#"{"apiBase": "http://localhost:9000"}"#).unwrap();
        assert_eq!(config.data_config().base_url, "http://localhost:9000");
    }
}
