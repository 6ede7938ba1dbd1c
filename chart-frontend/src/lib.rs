//! Canvas widgets for the position chart: the candle chart with position
//! markers and the brush overview strip.
//!
//! Layout, scaling and hit testing live in [`viewport`] and run on any
//! target. The DOM-bound handles are only built for `wasm32`.

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod options;
pub mod viewport;

#[cfg(target_arch = "wasm32")]
mod backend;
#[cfg(target_arch = "wasm32")]
pub mod brush;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
pub mod handle;

pub use error::ChartError;
pub use events::ClickReport;
pub use lifecycle::{ChartLifecycle, ListenerId, ListenerKind};
pub use options::{ChartOptions, PriceLine};
pub use viewport::{MarkerGlyph, Viewport};

#[cfg(target_arch = "wasm32")]
pub use brush::BrushChartHandle;
#[cfg(target_arch = "wasm32")]
pub use handle::{PositionChartHandle, SubscriptionId};
