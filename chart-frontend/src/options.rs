use serde::{Deserialize, Serialize};

/// Look and size of a chart widget. `width: None` follows the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub width: Option<f64>,
    pub height: f64,
    pub background: String,
    pub text_color: String,
    pub grid_color: String,
    pub up_color: String,
    pub down_color: String,
    pub crosshair_color: String,
    pub font: String,
    pub price_precision: Option<usize>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: 360.0,
            background: "#0b111a".to_string(),
            text_color: "#b7c6d9".to_string(),
            grid_color: "rgba(255, 255, 255, 0.06)".to_string(),
            up_color: "#3fb68b".to_string(),
            down_color: "#f0635c".to_string(),
            crosshair_color: "#8ab4ff".to_string(),
            font: "11px 'Inter', sans-serif".to_string(),
            price_precision: None,
        }
    }
}

impl ChartOptions {
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_price_precision(mut self, precision: usize) -> Self {
        self.price_precision = Some(precision);
        self
    }

    /// Overview strip under the main chart.
    pub fn brush() -> Self {
        Self {
            height: 72.0,
            background: "#0d1520".to_string(),
            ..Self::default()
        }
    }
}

/// Horizontal line across the price pane, e.g. the average entry price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub price: f64,
    pub color: String,
    pub title: String,
}

impl PriceLine {
    pub fn average_price(price: f64) -> Self {
        Self {
            price,
            color: "#f7c843".to_string(),
            title: "Avg".to_string(),
        }
    }
}
