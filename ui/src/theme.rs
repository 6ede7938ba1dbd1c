pub const GLOBAL_CSS: &str = r#"
:root {
  --bg: #05090f;
  --bg-elev-1: #0b111a;
  --bg-elev-2: #111a26;
  --border: rgba(255, 255, 255, 0.08);
  --border-strong: rgba(255, 255, 255, 0.16);
  --text: #e6edf7;
  --text-dim: #b7c6d9;
  --text-muted: #7f8ba0;
  --accent: #5cb0ff;
  --positive: #3fb68b;
  --negative: #f0635c;
  --warning: #f7c843;
  --surface-hover: rgba(255, 255, 255, 0.05);
  --surface-active: rgba(255, 255, 255, 0.1);
  --radius: 10px;
  --radius-pill: 999px;
  --space-1: 4px;
  --space-2: 8px;
  --space-3: 12px;
  --font-body: "Inter", "SF Pro Text", system-ui, -apple-system, sans-serif;
  --font-mono: "JetBrains Mono", "SFMono-Regular", ui-monospace, monospace;
  --font-size-xs: 11px;
  --font-size-sm: 13px;
  --transition: 140ms ease-out;
}

* { box-sizing: border-box; }
html, body {
  padding: 0;
  margin: 0;
  background: var(--bg);
  color: var(--text);
  font-family: var(--font-body);
  font-size: var(--font-size-sm);
  line-height: 1.4;
}

button { font-family: var(--font-body); }

.app-root { max-width: 1200px; margin: 0 auto; padding: var(--space-3); display: flex; flex-direction: column; gap: var(--space-3); }
.app-header { display: flex; align-items: center; justify-content: space-between; gap: var(--space-3); }

.chart-positions { display: flex; flex-direction: column; gap: var(--space-2); padding: var(--space-3); background: var(--bg-elev-1); border: 1px solid var(--border); border-radius: var(--radius); }
.chart-toolbar { display: flex; align-items: center; justify-content: space-between; gap: var(--space-2); }
.chart-body { position: relative; min-height: 360px; }
.position-chart { position: relative; width: 100%; min-height: 360px; }
.position-brush { position: relative; width: 100%; height: 72px; border-top: 1px solid var(--border); }

.chart-empty { display: flex; align-items: center; justify-content: center; min-height: 360px; color: var(--text-muted); }
.chart-spinner { margin: 160px auto; width: 28px; height: 28px; border-radius: 50%; border: 3px solid var(--border-strong); border-top-color: var(--accent); animation: chart-spin 0.9s linear infinite; }
@keyframes chart-spin { to { transform: rotate(360deg); } }

.timeframe-selector { display: inline-flex; gap: var(--space-1); padding: 2px; border: 1px solid var(--border); border-radius: var(--radius-pill); }
.tf-button { padding: 3px 10px; border: 0; border-radius: var(--radius-pill); background: transparent; color: var(--text-dim); font-size: var(--font-size-xs); cursor: pointer; transition: background var(--transition); }
.tf-button:hover { background: var(--surface-hover); }
.tf-button.active { background: var(--surface-active); color: var(--text); }

.see-more { padding: 4px 12px; border: 1px solid var(--border-strong); border-radius: var(--radius-pill); background: var(--bg-elev-2); color: var(--accent); cursor: pointer; }
.see-more:hover { background: var(--surface-hover); }

.position-chart-legend { font-family: var(--font-mono); background: rgba(11, 17, 26, 0.8); padding: 2px 6px; border-radius: 6px; }

.position-legend { position: absolute; right: 72px; top: var(--space-2); z-index: 3; min-width: 180px; padding: var(--space-2); background: var(--bg-elev-2); border: 1px solid var(--border-strong); border-radius: var(--radius); font-size: var(--font-size-xs); pointer-events: none; }
.position-legend.legend-long { border-left: 3px solid var(--positive); }
.position-legend.legend-short { border-left: 3px solid var(--negative); }
.legend-title { font-weight: 600; margin-bottom: var(--space-1); }
.legend-row { display: flex; justify-content: space-between; gap: var(--space-3); }
.legend-label { color: var(--text-muted); }
.legend-value { font-family: var(--font-mono); color: var(--text); }

@media (max-width: 720px) {
  .position-legend { right: var(--space-2); }
  .chart-body, .position-chart, .chart-empty { min-height: 260px; }
}
"#;
