//! SVG rendering of a ROC curve

use super::RocCurve;
use std::fmt::Write;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;

/// File name the evaluate step logs the plot under.
pub const ROC_CURVE_FILE: &str = "roc-curve.svg";

impl RocCurve {
    /// Render the curve with the 50% diagonal as a standalone SVG document.
    #[must_use]
    pub fn render_svg(&self) -> String {
        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let px = |x: f64| MARGIN_LEFT + x * plot_w;
        let py = |y: f64| MARGIN_TOP + (1.0 - y) * plot_h;

        let mut svg = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            svg,
            r#"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="black"/>"#
        );

        for tick in 0..=5 {
            let v = f64::from(tick) / 5.0;
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="middle">{v:.1}</text>"#,
                px(v),
                HEIGHT - MARGIN_BOTTOM + 16.0
            );
            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end">{v:.1}</text>"#,
                MARGIN_LEFT - 6.0,
                py(v) + 4.0
            );
        }

        let _ = writeln!(
            svg,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black" stroke-dasharray="6,4"/>"#,
            px(0.0),
            py(0.0),
            px(1.0),
            py(1.0)
        );

        let points: Vec<String> = self
            .fpr
            .iter()
            .zip(&self.tpr)
            .map(|(&x, &y)| format!("{:.2},{:.2}", px(x), py(y)))
            .collect();
        let _ = writeln!(
            svg,
            r##"<polyline points="{}" fill="none" stroke="#1f77b4" stroke-width="2"/>"##,
            points.join(" ")
        );

        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="24" font-size="15" text-anchor="middle">ROC curve</text>"#,
            WIDTH / 2.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle">False positive rate</text>"#,
            MARGIN_LEFT + plot_w / 2.0,
            HEIGHT - 15.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="20" y="{y:.1}" font-size="12" text-anchor="middle" transform="rotate(-90 20 {y:.1})">True positive rate</text>"#,
            y = MARGIN_TOP + plot_h / 2.0
        );
        svg.push_str("</svg>\n");
        svg
    }
}
