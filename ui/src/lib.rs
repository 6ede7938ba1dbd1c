pub mod app;
pub mod brush;
pub mod chart;
pub mod chart_positions;
pub mod legend;
pub mod state;
pub mod theme;

pub use app::{App, AppConfig};
pub use chart_positions::ChartPositions;

#[cfg(target_arch = "wasm32")]
use leptos::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // tracing events fall through to `log` when no subscriber is installed
    let _ = console_log::init_with_level(log::Level::Debug);
    leptos::mount_to_body(|| view! { <App/> });
}
