//! Self-contained HTML report for a local surrogate explanation.
//!
//! The page has no external assets: styles are inline and bars are plain `div`s sized
//! in percent, so the file renders the same offline.

use crate::error::Result;
use crate::explainability::LimeExplanation;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::debug;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
body { font-family: Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
h1 { font-size: 1.4em; }
h2 { font-size: 1.1em; margin-top: 1.6em; }
.meta { color: #777; font-size: 0.85em; }
.row { display: flex; align-items: center; margin: 4px 0; }
.label { width: 240px; font-size: 0.9em; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
.track { flex: 1; max-width: 420px; background: #f2f2f2; height: 18px; position: relative; }
.bar { height: 18px; }
.value { width: 80px; text-align: right; font-size: 0.85em; padding-left: 8px; }
.pos { background: #ff7f0e; }
.neg { background: #1f77b4; }
.proba-0 { background: #1f77b4; }
.proba-1 { background: #ff7f0e; }
table { border-collapse: collapse; margin-top: 0.5em; }
td, th { border: 1px solid #ddd; padding: 4px 10px; font-size: 0.9em; }
th { background: #fafafa; text-align: left; }
</style>
</head>
<body>
<h1>{{title}}</h1>
<p class="meta">Generated {{generated_at}}{{#if instance_id}} &middot; instance {{instance_id}}{{/if}}</p>

<h2>Prediction probabilities</h2>
{{#each probabilities}}
<div class="row">
  <div class="label">{{this.class_name}}</div>
  <div class="track"><div class="bar proba-{{this.index}}" style="width: {{this.width}}%"></div></div>
  <div class="value">{{this.value}}</div>
</div>
{{/each}}

<h2>Feature contributions toward class {{positive_class}}</h2>
{{#each weights}}
<div class="row">
  <div class="label" title="{{this.condition}}">{{this.condition}}</div>
  <div class="track"><div class="bar {{this.sign}}" style="width: {{this.width}}%"></div></div>
  <div class="value">{{this.value}}</div>
</div>
{{/each}}

<h2>Surrogate model</h2>
<table>
  <tr><th>Intercept</th><td>{{intercept}}</td></tr>
  <tr><th>Local prediction</th><td>{{local_prediction}}</td></tr>
  <tr><th>Model prediction</th><td>{{model_prediction}}</td></tr>
  <tr><th>Weighted R&sup2;</th><td>{{score}}</td></tr>
</table>

<h2>Feature values</h2>
<table>
  <tr><th>Feature</th><th>Value</th></tr>
  {{#each instance}}
  <tr><td>{{this.name}}</td><td>{{this.value}}</td></tr>
  {{/each}}
</table>
</body>
</html>
"#;

/// HTML page describing one local surrogate explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimeHtmlReport {
    pub title: String,
    /// Names of the negative and positive class
    pub class_names: [String; 2],
    pub instance_id: Option<String>,
    pub explanation: LimeExplanation,
    pub generated_at: DateTime<Utc>,
}

impl LimeHtmlReport {
    pub fn new(explanation: LimeExplanation) -> Self {
        Self {
            title: "LIME local explanation".to_string(),
            class_names: ["0".to_string(), "1".to_string()],
            instance_id: None,
            explanation,
            generated_at: Utc::now(),
        }
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Render the page
    pub fn to_html(&self) -> Result<String> {
        let e = &self.explanation;
        let p1 = e.model_prediction.clamp(0.0, 1.0);

        let probabilities: Vec<_> = [1.0 - p1, p1]
            .iter()
            .enumerate()
            .map(|(index, &p)| {
                json!({
                    "index": index,
                    "class_name": self.class_names[index],
                    "width": format!("{:.1}", p * 100.0),
                    "value": format!("{:.2}", p),
                })
            })
            .collect();

        let max_abs = e
            .weights
            .iter()
            .map(|(_, w)| w.abs())
            .fold(0.0f64, f64::max);
        let weights: Vec<_> = e
            .weights
            .iter()
            .map(|(condition, w)| {
                let width = if max_abs > 0.0 { w.abs() / max_abs * 100.0 } else { 0.0 };
                json!({
                    "condition": condition,
                    "sign": if *w >= 0.0 { "pos" } else { "neg" },
                    "width": format!("{:.1}", width),
                    "value": format!("{:+.4}", w),
                })
            })
            .collect();

        let instance: Vec<_> = e
            .instance
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": format!("{:.4}", value) }))
            .collect();

        let data = json!({
            "title": self.title,
            "generated_at": self.generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            "instance_id": self.instance_id,
            "positive_class": self.class_names[1],
            "probabilities": probabilities,
            "weights": weights,
            "intercept": format!("{:.4}", e.intercept),
            "local_prediction": format!("{:.4}", e.local_prediction),
            "model_prediction": format!("{:.4}", e.model_prediction),
            "score": format!("{:.4}", e.score),
            "instance": instance,
        });

        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Ok(handlebars.render_template(TEMPLATE, &data)?)
    }

    /// Render and write the page to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_html()?)?;
        debug!(path = %path.display(), "wrote lime report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explanation() -> LimeExplanation {
        LimeExplanation {
            intercept: 0.31,
            local_prediction: 0.72,
            model_prediction: 0.8,
            score: 0.55,
            weights: vec![
                ("income > 3.00".to_string(), 0.25),
                ("age <= 1.00".to_string(), -0.125),
            ],
            instance: vec![("income".to_string(), 4.2), ("age".to_string(), 0.5)],
        }
    }

    #[test]
    fn test_html_contains_explanation() {
        let html = LimeHtmlReport::new(explanation())
            .with_instance_id("17")
            .to_html()
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("instance 17"));
        assert!(html.contains("+0.2500"));
        assert!(html.contains("-0.1250"));
        assert!(html.contains("width: 100.0%"));
        assert!(html.contains("width: 50.0%"));
        assert!(html.contains("0.80"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_conditions_are_escaped() {
        let html = LimeHtmlReport::new(explanation()).to_html().unwrap();
        assert!(html.contains("income &gt; 3.00"));
        assert!(html.contains("age &lt;"));
        assert!(!html.contains("age <="));
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lime.html");
        LimeHtmlReport::new(explanation()).save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Feature values"));
    }
}
