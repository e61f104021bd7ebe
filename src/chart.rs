//! Chart building.
//!
//! Turns a [`ChartIntent`] and the loaded records into a Plotly-compatible
//! `{data, layout}` specification. Aggregation happens here; the theme only
//! picks colors.
//!
//! | Aggregation | Points |
//! |-------------|--------|
//! | `distinct` | one per distinct value of `fields[0]`, valued by frequency |
//! | `count` | rows carrying `fields[0]`, per `fields[1]` value or per source file |
//! | `mean` | numeric mean of `fields[0]`, per `fields[1]` value or overall |
//! | `none` | raw numeric `fields[0]` against `fields[1]` or the row index |
//!
//! Bar and pie charts have no meaningful raw form, so `none` falls back to
//! `distinct` for them. Group and label orders follow first appearance.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{Aggregation, ChartIntent, ChartOutcome, ChartType, JsonRecord, Theme};
use crate::rows::{label, rows, type_name, Row};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl ChartSpec {
    /// Aggregated `(label, value)` pairs of the first trace.
    pub fn points(&self) -> Vec<(String, f64)> {
        let Some(trace) = self.data.first() else {
            return Vec::new();
        };
        match (&trace.labels, &trace.values, &trace.x, &trace.y) {
            (Some(labels), Some(values), _, _) => labels.iter().cloned().zip(values.iter().copied()).collect(),
            (_, _, Some(x), Some(y)) => x.iter().map(label).zip(y.iter().copied()).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    pub marker: Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub template: &'static str,
    pub paper_bgcolor: &'static str,
    pub plot_bgcolor: &'static str,
    pub font: Font,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
    pub gridcolor: &'static str,
}

struct Palette {
    template: &'static str,
    background: &'static str,
    font: &'static str,
    grid: &'static str,
    colorway: &'static [&'static str],
}

const LIGHT: Palette = Palette {
    template: "plotly_white",
    background: "#ffffff",
    font: "#2a3f5f",
    grid: "#e5ecf6",
    colorway: &[
        "#636efa", "#EF553B", "#00cc96", "#ab63fa", "#FFA15A", "#19d3f3", "#FF6692", "#B6E880",
        "#FF97FF", "#FECB52",
    ],
};

const DARK: Palette = Palette {
    template: "plotly_dark",
    background: "#111111",
    font: "#f2f5fa",
    grid: "#283442",
    colorway: &[
        "#8c94ff", "#ff7a5c", "#2ee6b0", "#c28cff", "#ffbd80", "#5ce1f7", "#ff8cab", "#cdf0a6",
        "#ffb8ff", "#ffe08a",
    ],
};

fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Light => &LIGHT,
        Theme::Dark => &DARK,
    }
}

/// Aggregated series before styling.
#[derive(Debug, Clone, PartialEq)]
struct Points {
    x: Vec<Value>,
    y: Vec<f64>,
    x_title: String,
    y_title: String,
    title: String,
}

pub fn build_chart(records: &[JsonRecord], intent: &ChartIntent, theme: Theme) -> ChartOutcome {
    if intent.is_none() {
        return ChartOutcome::NoChart;
    }
    match aggregate(records, intent) {
        Ok(points) => ChartOutcome::Chart(render(intent.chart_type, points, theme)),
        Err(reason) => ChartOutcome::Failure(reason),
    }
}

fn effective_aggregation(intent: &ChartIntent) -> Aggregation {
    match (intent.chart_type, intent.aggregation) {
        (ChartType::Bar | ChartType::Pie, Aggregation::None) => Aggregation::Distinct,
        (_, aggregation) => aggregation,
    }
}

fn aggregate(records: &[JsonRecord], intent: &ChartIntent) -> Result<Points, String> {
    let field = intent
        .fields
        .first()
        .map(String::as_str)
        .ok_or_else(|| "chart intent names no field".to_string())?;
    let secondary = intent.fields.get(1).map(String::as_str);

    let all_rows = rows(records);
    if !all_rows.iter().any(|row| row.get(field).is_some()) {
        return Err(format!("field '{}' not found in any record", field));
    }
    if let Some(second) = secondary {
        if !all_rows.iter().any(|row| row.get(second).is_some()) {
            return Err(format!("field '{}' not found in any record", second));
        }
    }

    match effective_aggregation(intent) {
        Aggregation::Distinct => Ok(distinct(&all_rows, field)),
        Aggregation::Count => count(&all_rows, field, secondary),
        Aggregation::Mean => mean(&all_rows, field, secondary),
        Aggregation::None => raw(&all_rows, field, secondary),
    }
}

/// Ordered label → accumulator map.
struct Groups<T> {
    order: Vec<String>,
    values: HashMap<String, T>,
}

impl<T: Default> Groups<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            values: HashMap::new(),
        }
    }

    fn entry(&mut self, key: String) -> &mut T {
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.entry(key).or_default()
    }

    fn into_points(mut self, mut f: impl FnMut(T) -> f64) -> (Vec<Value>, Vec<f64>) {
        let mut x = Vec::with_capacity(self.order.len());
        let mut y = Vec::with_capacity(self.order.len());
        for key in self.order {
            if let Some(acc) = self.values.remove(&key) {
                y.push(f(acc));
                x.push(Value::String(key));
            }
        }
        (x, y)
    }
}

fn distinct(rows: &[Row<'_>], field: &str) -> Points {
    let mut groups: Groups<usize> = Groups::new();
    for value in rows.iter().filter_map(|row| row.get(field)) {
        *groups.entry(label(value)) += 1;
    }
    let (x, y) = groups.into_points(|n| n as f64);
    Points {
        x,
        y,
        x_title: field.to_string(),
        y_title: "count".to_string(),
        title: format!("Distinct values of {}", field),
    }
}

fn count(rows: &[Row<'_>], field: &str, group_by: Option<&str>) -> Result<Points, String> {
    let mut groups: Groups<usize> = Groups::new();
    for row in rows.iter().filter(|row| row.get(field).is_some()) {
        let key = match group_by {
            Some(g) => match row.get(g) {
                Some(value) => label(value),
                None => continue,
            },
            None => row.source_key.to_string(),
        };
        *groups.entry(key) += 1;
    }
    let (x, y) = groups.into_points(|n| n as f64);
    if x.is_empty() {
        return Err(format!(
            "no record carries both '{}' and '{}'",
            field,
            group_by.unwrap_or(field)
        ));
    }
    let group_title = group_by.unwrap_or("source file").to_string();
    Ok(Points {
        x,
        y,
        title: format!("Count of {} by {}", field, group_title),
        x_title: group_title,
        y_title: "count".to_string(),
    })
}

fn numeric(value: &Value, field: &str, aggregation: &str) -> Result<f64, String> {
    value.as_f64().ok_or_else(|| {
        format!(
            "cannot compute {} of field '{}': found {} value {}",
            aggregation,
            field,
            type_name(value),
            value
        )
    })
}

fn mean(rows: &[Row<'_>], field: &str, group_by: Option<&str>) -> Result<Points, String> {
    let mut groups: Groups<(f64, usize)> = Groups::new();
    for row in rows {
        let Some(value) = row.get(field) else {
            continue;
        };
        let number = numeric(value, field, "mean")?;
        let key = match group_by {
            Some(g) => match row.get(g) {
                Some(value) => label(value),
                None => continue,
            },
            None => field.to_string(),
        };
        let acc = groups.entry(key);
        acc.0 += number;
        acc.1 += 1;
    }
    let (x, y) = groups.into_points(|(sum, n)| sum / n as f64);
    if x.is_empty() {
        return Err(format!(
            "no record carries both '{}' and '{}'",
            field,
            group_by.unwrap_or(field)
        ));
    }
    Ok(Points {
        x,
        y,
        title: match group_by {
            Some(g) => format!("Mean {} by {}", field, g),
            None => format!("Mean {}", field),
        },
        x_title: group_by.unwrap_or(field).to_string(),
        y_title: format!("mean {}", field),
    })
}

fn raw(rows: &[Row<'_>], field: &str, x_field: Option<&str>) -> Result<Points, String> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let Some(value) = row.get(field) else {
            continue;
        };
        let number = numeric(value, field, "a plot")?;
        let x_value = match x_field {
            Some(xf) => match row.get(xf) {
                Some(v @ (Value::Number(_) | Value::String(_))) => v.clone(),
                Some(other) => Value::String(label(other)),
                None => continue,
            },
            None => Value::from(index),
        };
        x.push(x_value);
        y.push(number);
    }
    if x.is_empty() {
        return Err(format!(
            "no record carries both '{}' and '{}'",
            field,
            x_field.unwrap_or(field)
        ));
    }
    Ok(Points {
        x,
        y,
        title: match x_field {
            Some(xf) => format!("{} by {}", field, xf),
            None => field.to_string(),
        },
        x_title: x_field.unwrap_or("row").to_string(),
        y_title: field.to_string(),
    })
}

fn render(chart_type: ChartType, points: Points, theme: Theme) -> ChartSpec {
    let palette = palette(theme);
    let axis = |text: String| Axis {
        title: Title { text },
        gridcolor: palette.grid,
    };

    let (trace, xaxis, yaxis) = match chart_type {
        ChartType::Pie => {
            let labels: Vec<String> = points.x.iter().map(label).collect();
            let colors = (0..labels.len())
                .map(|i| palette.colorway[i % palette.colorway.len()].to_string())
                .collect();
            let trace = Trace {
                trace_type: "pie",
                mode: None,
                name: points.x_title.clone(),
                x: None,
                y: None,
                labels: Some(labels),
                values: Some(points.y),
                marker: Marker {
                    color: None,
                    colors: Some(colors),
                },
            };
            (trace, None, None)
        }
        other => {
            let (trace_type, mode) = match other {
                ChartType::Line => ("scatter", Some("lines+markers")),
                ChartType::Scatter => ("scatter", Some("markers")),
                _ => ("bar", None),
            };
            let trace = Trace {
                trace_type,
                mode,
                name: points.y_title.clone(),
                x: Some(points.x),
                y: Some(points.y),
                labels: None,
                values: None,
                marker: Marker {
                    color: Some(palette.colorway[0].to_string()),
                    colors: None,
                },
            };
            (trace, Some(axis(points.x_title)), Some(axis(points.y_title)))
        }
    };

    ChartSpec {
        data: vec![trace],
        layout: Layout {
            title: Title { text: points.title },
            template: palette.template,
            paper_bgcolor: palette.background,
            plot_bgcolor: palette.background,
            font: Font {
                color: palette.font,
            },
            xaxis,
            yaxis,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<JsonRecord> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, content)| JsonRecord {
                source_key: format!("f{}.json", i),
                content,
            })
            .collect()
    }

    fn chart(outcome: ChartOutcome) -> ChartSpec {
        match outcome {
            ChartOutcome::Chart(spec) => spec,
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_none_intent_is_no_chart() {
        let recs = records(vec![json!({"a": 1})]);
        assert_eq!(
            build_chart(&recs, &ChartIntent::none(), Theme::Dark),
            ChartOutcome::NoChart
        );
        // Fields are irrelevant once the chart type is none.
        let intent = ChartIntent::new(ChartType::None, &["missing"], Aggregation::Mean);
        assert_eq!(build_chart(&recs, &intent, Theme::Light), ChartOutcome::NoChart);
    }

    #[test]
    fn test_pie_distinct_status() {
        let recs = records(vec![
            json!({"status": "pass"}),
            json!({"status": "pass"}),
            json!({"status": "fail"}),
        ]);
        let intent = ChartIntent::new(ChartType::Pie, &["status"], Aggregation::Distinct);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(
            spec.points(),
            vec![("pass".to_string(), 2.0), ("fail".to_string(), 1.0)]
        );
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["data"][0]["type"], "pie");
        assert_eq!(json["data"][0]["labels"], json!(["pass", "fail"]));
        assert_eq!(json["data"][0]["values"], json!([2.0, 1.0]));
        assert!(json["data"][0].get("x").is_none());
    }

    #[test]
    fn test_missing_field_everywhere_is_failure() {
        let recs = records(vec![json!({"status": "pass"})]);
        let intent = ChartIntent::new(ChartType::Bar, &["latency"], Aggregation::Mean);
        assert_eq!(
            build_chart(&recs, &intent, Theme::Light),
            ChartOutcome::Failure("field 'latency' not found in any record".to_string())
        );
    }

    #[test]
    fn test_missing_on_some_records_is_skipped() {
        let recs = records(vec![json!({"ms": 10}), json!({"other": 1}), json!({"ms": 30})]);
        let intent = ChartIntent::new(ChartType::Bar, &["ms"], Aggregation::Mean);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(spec.points(), vec![("ms".to_string(), 20.0)]);
    }

    #[test]
    fn test_count_without_shared_rows_is_failure() {
        let recs = records(vec![json!({"id": 1}), json!({"team": "x"})]);
        let intent = ChartIntent::new(ChartType::Bar, &["id", "team"], Aggregation::Count);
        assert_eq!(
            build_chart(&recs, &intent, Theme::Light),
            ChartOutcome::Failure("no record carries both 'id' and 'team'".to_string())
        );
    }

    #[test]
    fn test_mean_of_strings_is_failure() {
        let recs = records(vec![json!({"ms": 10}), json!({"ms": "slow"})]);
        let intent = ChartIntent::new(ChartType::Bar, &["ms"], Aggregation::Mean);
        let outcome = build_chart(&recs, &intent, Theme::Light);
        let reason = outcome.failure().unwrap();
        assert!(reason.contains("cannot compute mean of field 'ms'"), "{}", reason);
        assert!(reason.contains("string"));
    }

    #[test]
    fn test_mean_grouped() {
        let recs = records(vec![json!([
            {"region": "eu", "ms": 10},
            {"region": "us", "ms": 40},
            {"region": "eu", "ms": 20},
            {"ms": 1000}
        ])]);
        let intent = ChartIntent::new(ChartType::Bar, &["ms", "region"], Aggregation::Mean);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(
            spec.points(),
            vec![("eu".to_string(), 15.0), ("us".to_string(), 40.0)]
        );
    }

    #[test]
    fn test_count_by_source_file() {
        let recs = records(vec![
            json!([{"id": 1}, {"id": 2}, {"x": 0}]),
            json!({"id": 3}),
        ]);
        let intent = ChartIntent::new(ChartType::Bar, &["id"], Aggregation::Count);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(
            spec.points(),
            vec![("f0.json".to_string(), 2.0), ("f1.json".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_bar_without_aggregation_counts_distinct() {
        let recs = records(vec![json!({"t": true}), json!({"t": false}), json!({"t": true})]);
        let intent = ChartIntent::new(ChartType::Bar, &["t"], Aggregation::None);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(
            spec.points(),
            vec![("true".to_string(), 2.0), ("false".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_scatter_raw_points() {
        let recs = records(vec![json!([
            {"size": 1, "ms": 5},
            {"size": 2, "ms": 9},
            {"ms": 100}
        ])]);
        let intent = ChartIntent::new(ChartType::Scatter, &["ms", "size"], Aggregation::None);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        let trace = &spec.data[0];
        assert_eq!(trace.mode, Some("markers"));
        assert_eq!(trace.x, Some(vec![json!(1), json!(2)]));
        assert_eq!(trace.y, Some(vec![5.0, 9.0]));
    }

    #[test]
    fn test_line_uses_row_index_without_x_field() {
        let recs = records(vec![json!({"v": 3}), json!({"v": 4.5})]);
        let intent = ChartIntent::new(ChartType::Line, &["v"], Aggregation::None);
        let spec = chart(build_chart(&recs, &intent, Theme::Light));
        assert_eq!(spec.data[0].x, Some(vec![json!(0), json!(1)]));
        assert_eq!(spec.data[0].mode, Some("lines+markers"));
    }

    #[test]
    fn test_theme_changes_only_colors() {
        let recs = records(vec![
            json!({"status": "pass"}),
            json!({"status": "fail"}),
            json!({"status": "pass"}),
        ]);
        for chart_type in [ChartType::Bar, ChartType::Pie, ChartType::Line] {
            let intent = ChartIntent::new(chart_type, &["status"], Aggregation::Distinct);
            let light = chart(build_chart(&recs, &intent, Theme::Light));
            let dark = chart(build_chart(&recs, &intent, Theme::Dark));

            assert_eq!(light.points(), dark.points());
            assert_eq!(light.layout.title, dark.layout.title);
            assert_ne!(light.layout.paper_bgcolor, dark.layout.paper_bgcolor);
            assert_ne!(light.data[0].marker, dark.data[0].marker);

            let mut recolored = dark.clone();
            recolored.data[0].marker = light.data[0].marker.clone();
            assert_eq!(recolored.data, light.data);
        }
    }
}
