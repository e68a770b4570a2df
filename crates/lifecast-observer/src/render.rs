//! HTML fragments and server-sent-event framing for grid state.
//!
//! Cells render as htmx `<form>` elements; clicking one posts its
//! coordinates to `/game/cell`. Each cell listens for an SSE event named
//! after it (`cell{x}-{y}`) and swaps itself with the event's data.
//!
//! Payloads are framed as `event: <name>\r\ndata:<payload>\r\n\r\n`. Line
//! breaks inside a payload would end the `data:` field early, so they are
//! stripped before framing.

use lifecast_core::{Grid, StepView};
use minijinja::{context, Environment};

use crate::error::ObserverError;

/// SSE event name carrying a complete field.
pub const FULL_FIELD_EVENT: &str = "all";

const MACROS_TEMPLATE: &str = r#"{% macro cell(x, y, val) -%}
<form{% if val != 0 %} class="black"{% endif %} hx-post="game/cell" hx-trigger="click" hx-swap="outerHTML" sse-swap="cell{{ x }}-{{ y }}">
  <input type="hidden" name="x" value="{{ x }}">
  <input type="hidden" name="y" value="{{ y }}">
</form>
{%- endmacro %}"#;

const CELL_TEMPLATE: &str = r#"{% import "macros.html" as m %}{{ m.cell(x, y, val) }}"#;

const FIELD_TEMPLATE: &str = r#"{% import "macros.html" as m -%}
<div class="game-grid" style="grid-template-columns: repeat({{ cols }}, 1fr);grid-template-rows: repeat({{ rows }}, 1fr)">
{% for row in cells %}{% set y = loop.index0 %}{% for val in row %}{{ m.cell(loop.index0, y, val) }}{% endfor %}{% endfor %}
</div>"#;

/// The SSE event name a cell listens on.
pub fn cell_id(x: usize, y: usize) -> String {
    format!("cell{x}-{y}")
}

/// Append one SSE frame to `out`, dropping line breaks from `data`.
pub fn push_sse_frame(out: &mut Vec<u8>, event: &str, data: &str) {
    out.extend_from_slice(b"event: ");
    out.extend_from_slice(event.as_bytes());
    out.extend_from_slice(b"\r\ndata:");
    out.extend(data.bytes().filter(|&b| b != b'\n' && b != b'\r'));
    out.extend_from_slice(b"\r\n\r\n");
}

/// Renders cells, fields, and per-step diff events.
#[derive(Debug)]
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    /// Compile the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if a template fails to compile.
    pub fn new() -> Result<Self, ObserverError> {
        let mut env = Environment::new();
        env.add_template("macros.html", MACROS_TEMPLATE)?;
        env.add_template("cell.html", CELL_TEMPLATE)?;
        env.add_template("field.html", FIELD_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Render a single cell.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if rendering fails.
    pub fn cell(&self, x: usize, y: usize, value: u8) -> Result<String, ObserverError> {
        let html = self
            .env
            .get_template("cell.html")?
            .render(context! { x => x, y => y, val => value })?;
        Ok(html)
    }

    /// Render the whole grid.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if rendering fails.
    pub fn field(&self, grid: &Grid) -> Result<String, ObserverError> {
        let cells: Vec<&[u8]> = grid.row_slices().collect();
        let html = self.env.get_template("field.html")?.render(context! {
            rows => grid.rows(),
            cols => grid.cols(),
            cells => cells,
        })?;
        Ok(html)
    }

    /// The SSE frame that replaces a client's whole field.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if rendering fails.
    pub fn full_field_event(&self, grid: &Grid) -> Result<Vec<u8>, ObserverError> {
        let mut out = Vec::new();
        push_sse_frame(&mut out, FULL_FIELD_EVENT, &self.field(grid)?);
        Ok(out)
    }

    /// One SSE frame per cell changed by the step, concatenated.
    ///
    /// A step that changed nothing yields an empty event.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::Render`] if rendering fails.
    pub fn step_event(&self, view: &StepView<'_>) -> Result<Vec<u8>, ObserverError> {
        let mut out = Vec::new();
        for change in view.changes() {
            let html = self.cell(change.x, change.y, change.value)?;
            push_sse_frame(&mut out, &cell_id(change.x, change.y), &html);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lifecast_core::StepKind;

    use super::*;

    #[test]
    fn frame_strips_line_breaks_from_data() {
        let mut out = Vec::new();
        push_sse_frame(&mut out, "cell0-1", "<form>\r\n  <input>\n</form>");
        assert_eq!(out, b"event: cell0-1\r\ndata:<form>  <input></form>\r\n\r\n");
    }

    #[test]
    fn live_cell_is_black_and_listens_on_its_id() {
        let renderer = Renderer::new().unwrap();
        let html = renderer.cell(3, 4, 1).unwrap();
        assert!(html.contains(r#"class="black""#));
        assert!(html.contains(r#"sse-swap="cell3-4""#));
        assert!(html.contains(r#"name="x" value="3""#));
        assert!(html.contains(r#"name="y" value="4""#));

        let dead = renderer.cell(3, 4, 0).unwrap();
        assert!(!dead.contains("black"));
    }

    #[test]
    fn field_contains_every_cell() {
        let renderer = Renderer::new().unwrap();
        let grid = Grid::with_live_cells(2, 3, &[(2, 1)]);
        let html = renderer.field(&grid).unwrap();

        assert!(html.contains("repeat(3, 1fr);grid-template-rows: repeat(2, 1fr)"));
        assert_eq!(html.matches("<form").count(), 6);
        assert_eq!(html.matches(r#"class="black""#).count(), 1);
        assert!(html.contains(r#"sse-swap="cell2-1""#));
        assert!(html.contains(r#"sse-swap="cell0-0""#));
    }

    #[test]
    fn full_field_event_is_a_single_frame() {
        let renderer = Renderer::new().unwrap();
        let event = renderer.full_field_event(&Grid::new(2, 2)).unwrap();
        let text = String::from_utf8(event).unwrap();
        assert!(text.starts_with("event: all\r\ndata:<div"));
        assert!(text.ends_with("</div>\r\n\r\n"));
        assert_eq!(text.matches("\r\n").count(), 3);
    }

    #[test]
    fn step_event_has_one_frame_per_change() {
        let renderer = Renderer::new().unwrap();
        let previous = Grid::with_live_cells(2, 2, &[(0, 0)]);
        let current = Grid::with_live_cells(2, 2, &[(1, 1)]);
        let view = StepView {
            step: 9,
            kind: StepKind::Advance,
            current: &current,
            previous: &previous,
        };

        let text = String::from_utf8(renderer.step_event(&view).unwrap()).unwrap();
        assert!(text.starts_with("event: cell0-0\r\ndata:"));
        assert!(text.contains("event: cell1-1\r\ndata:<form class=\"black\""));
        assert_eq!(text.matches("event: ").count(), 2);
    }

    #[test]
    fn unchanged_step_is_empty() {
        let renderer = Renderer::new().unwrap();
        let grid = Grid::new(2, 2);
        let view = StepView {
            step: 1,
            kind: StepKind::Clear,
            current: &grid,
            previous: &grid,
        };
        assert!(renderer.step_event(&view).unwrap().is_empty());
    }
}
