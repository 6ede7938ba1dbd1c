use thiserror::Error;
use ts_core::Timestamp;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChartError {
    #[error("javascript error: {0}")]
    Js(String),
    #[error("element not found: {0}")]
    MissingElement(String),
    #[error("chart has been removed")]
    Removed,
    #[error("invalid visible range {from}..{to}")]
    InvalidRange { from: Timestamp, to: Timestamp },
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for ChartError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        ChartError::Js(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }
}
