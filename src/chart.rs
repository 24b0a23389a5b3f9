//! Two-series line chart of today's readings.
//!
//! Values are min/max normalized per series and mapped into a 100-unit wide
//! SVG viewbox. Output is either the bare `points` attribute of a polyline or a
//! complete SVG document.

use std::fmt::Write as _;

use crate::model::Reading;

/// Minutes in a day minus one, the right edge of the time-of-day axis.
const LAST_MINUTE: f64 = 1439.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Readings spaced evenly by position in the list.
    #[default]
    Sequential,
    /// Readings placed by their `HH:MM` time across a 24h axis.
    TimeOfDay,
}

impl Layout {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Some(Layout::Sequential),
            "time-of-day" | "time_of_day" | "tod" => Some(Layout::TimeOfDay),
            _ => None,
        }
    }

    fn left(&self) -> f64 {
        match self {
            Layout::Sequential => 7.0,
            Layout::TimeOfDay => 5.0,
        }
    }

    fn baseline(&self) -> f64 {
        match self {
            Layout::Sequential => 65.0,
            Layout::TimeOfDay => 55.0,
        }
    }

    fn plot_height(&self) -> f64 {
        match self {
            Layout::Sequential => 60.0,
            Layout::TimeOfDay => 50.0,
        }
    }

    fn view_height(&self) -> f64 {
        self.baseline() + 5.0
    }

    fn x_at(&self, idx: usize, n: usize, reading: &Reading) -> Option<f64> {
        match self {
            Layout::Sequential => {
                let offset = if n <= 1 { 0.0 } else { (idx as f64 / (n - 1) as f64) * 90.0 };
                Some(self.left() + offset)
            }
            Layout::TimeOfDay => {
                let minute = reading.minute_of_day()? as f64;
                Some(self.left() + (minute / LAST_MINUTE) * 90.0)
            }
        }
    }

    fn format_x(&self, x: f64) -> String {
        match self {
            Layout::Sequential => format!("{}", x),
            Layout::TimeOfDay => format!("{:.2}", x),
        }
    }
}

/// Value range of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// Min and max of the finite values; a span under 1 is widened by 0.5
    /// on each side so flat series sit mid-chart.
    pub fn of<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut bounds: Option<Bounds> = None;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            bounds = Some(match bounds {
                None => Bounds { min: v, max: v },
                Some(b) => Bounds { min: b.min.min(v), max: b.max.max(v) },
            });
        }
        bounds.map(|mut b| {
            if b.max - b.min < 1.0 {
                b.max += 0.5;
                b.min -= 0.5;
            }
            b
        })
    }

    pub fn normalize(&self, v: f64) -> f64 {
        (v - self.min) / (self.max - self.min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub layout: Layout,
    pub bounds: Option<Bounds>,
    pub points: Vec<Point>,
}

impl Series {
    fn build<F>(layout: Layout, readings: &[Reading], value: F) -> Self
    where
        F: Fn(&Reading) -> Option<f64>,
    {
        let n = readings.len();
        let placed: Vec<(f64, f64)> = readings
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| Some((layout.x_at(idx, n, r)?, value(r)?)))
            .collect();

        let bounds = Bounds::of(placed.iter().map(|(_, v)| *v));
        let points = match bounds {
            Some(b) => placed
                .iter()
                .map(|&(x, v)| Point { x, y: layout.baseline() - b.normalize(v) * layout.plot_height() })
                .collect(),
            None => Vec::new(),
        };
        Self { layout, bounds, points }
    }

    /// Value for a polyline `points` attribute: `"x,y x,y ..."`.
    pub fn points_attr(&self) -> String {
        self.points
            .iter()
            .map(|p| format!("{},{:.2}", self.layout.format_x(p.x), p.y))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn markers(&self, class: &str) -> String {
        let mut out = String::new();
        for p in &self.points {
            let _ = write!(
                out,
                r#"<circle cx="{}" cy="{:.2}" r="0.9" class="{}"></circle>"#,
                self.layout.format_x(p.x),
                p.y,
                class
            );
        }
        out
    }
}

/// Temperature and humidity series over the same readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub layout: Layout,
    pub temp: Series,
    pub umid: Series,
}

impl Chart {
    pub fn build(layout: Layout, readings: &[Reading]) -> Self {
        Self {
            layout,
            temp: Series::build(layout, readings, |r| r.temp),
            umid: Series::build(layout, readings, |r| r.umid),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temp.points.is_empty() && self.umid.points.is_empty()
    }
}

/// Complete SVG document for the chart.
pub fn render_svg(chart: &Chart) -> String {
    let height = chart.layout.view_height();
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 {}" preserveAspectRatio="none">"#,
        height
    );
    svg.push_str(
        "<style>.temp{fill:none;stroke:#e4572e;stroke-width:0.6}\
.umid{fill:none;stroke:#2e86ab;stroke-width:0.6}\
.point-temp{fill:#e4572e}.point-umid{fill:#2e86ab}\
.axis{stroke:#999;stroke-width:0.2}</style>\n",
    );
    let left = chart.layout.left();
    let base = chart.layout.baseline();
    let _ = writeln!(
        svg,
        r#"<line class="axis" x1="{l}" y1="{b}" x2="{r}" y2="{b}"></line>"#,
        l = left,
        b = base,
        r = left + 90.0
    );
    let _ = writeln!(svg, r#"<polyline id="linhaTemp" class="temp" points="{}"></polyline>"#, chart.temp.points_attr());
    let _ = writeln!(svg, r#"<polyline id="linhaUmid" class="umid" points="{}"></polyline>"#, chart.umid.points_attr());
    if chart.layout == Layout::Sequential {
        let _ = writeln!(svg, r#"<g id="pontosTemp">{}</g>"#, chart.temp.markers("point-temp"));
        let _ = writeln!(svg, r#"<g id="pontosUmid">{}</g>"#, chart.umid.markers("point-umid"));
    }
    svg.push_str("</svg>\n");
    svg
}
