//! Query orchestration: prompt assembly, the model call, and decoding of the
//! model's answer.
//!
//! The model is asked to answer in prose and to append one fenced block
//! tagged `chart` holding a JSON chart directive:
//!
//! ````text
//! Two of the three runs passed.
//!
//! ```chart
//! {"chart_type": "pie", "fields": ["status"], "aggregation": "distinct"}
//! ```
//! ````
//!
//! The directive is decoded strictly into [`ChartIntent`]. A missing or
//! malformed directive yields [`ChartIntent::none`], never an error.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::PromptConfig;
use crate::error::PipelineResult;
use crate::llm::Prompt;
use crate::models::{Aggregation, ChartIntent, ChartType, JsonRecord};
use crate::summary::summarize;
use crate::traits::LanguageModel;

const SYSTEM_PROMPT: &str = "You analyze data loaded from a collection of JSON files. \
Answer the user's question concisely using only the data provided. \
Rows come from files; array files are expanded into one row per element, and fields are \
addressed by dotted paths such as `meta.owner`.\n\n\
After your answer, append exactly one fenced code block tagged `chart` containing a JSON \
object with these keys:\n\
- \"chart_type\": one of \"bar\", \"line\", \"scatter\", \"pie\", \"none\"\n\
- \"fields\": list of field paths; the first is the measured field, an optional second is \
the x-axis (line/scatter) or the group key (count/mean)\n\
- \"aggregation\": one of \"count\", \"distinct\", \"mean\", \"none\"\n\n\
Use \"distinct\" to count how often each value occurs, \"count\" to count rows carrying a \
field, and \"mean\" to average a numeric field. Use chart_type \"none\" with an empty \
fields list when no chart would help.";

pub fn build_prompt(records: &[JsonRecord], query: &str, budget: &PromptConfig) -> Prompt {
    let summary = summarize(records, budget);
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("Data:\n{}\nQuestion: {}", summary, query.trim()),
    }
}

/// Run one model call over the records and decode its answer.
pub async fn analyze(
    model: &dyn LanguageModel,
    records: &[JsonRecord],
    query: &str,
    budget: &PromptConfig,
) -> PipelineResult<(String, ChartIntent)> {
    let prompt = build_prompt(records, query, budget);
    debug!(
        model = model.model_name(),
        prompt_chars = prompt.user.len() + prompt.system.len(),
        "submitting prompt"
    );

    let text = model.complete(&prompt).await?;
    let (answer, intent) = parse_response(&text);
    info!(
        chart_type = ?intent.chart_type,
        aggregation = ?intent.aggregation,
        fields = ?intent.fields,
        "model answered"
    );
    Ok((answer, intent))
}

/// Wire shape of the chart directive.
#[derive(Debug, Deserialize)]
struct Directive {
    chart_type: ChartType,
    #[serde(default)]
    fields: Vec<String>,
    /// Single-field shorthand.
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    aggregation: Aggregation,
}

impl Directive {
    fn into_intent(self) -> Result<ChartIntent, String> {
        if self.chart_type == ChartType::None {
            return Ok(ChartIntent::none());
        }

        let mut fields: Vec<String> = self
            .fields
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            if let Some(field) = self.field.map(|f| f.trim().to_string()) {
                if !field.is_empty() {
                    fields.push(field);
                }
            }
        }
        if fields.is_empty() {
            return Err("chart directive names no field".to_string());
        }

        Ok(ChartIntent {
            chart_type: self.chart_type,
            fields,
            aggregation: self.aggregation,
        })
    }
}

/// Split a model response into the prose answer and the chart intent.
pub fn parse_response(text: &str) -> (String, ChartIntent) {
    let Some(block) = find_directive_block(text) else {
        return (text.trim().to_string(), ChartIntent::none());
    };

    let intent = match serde_json::from_str::<Directive>(block.body.trim())
        .map_err(|e| e.to_string())
        .and_then(Directive::into_intent)
    {
        Ok(intent) => intent,
        Err(e) => {
            warn!("ignoring malformed chart directive: {}", e);
            ChartIntent::none()
        }
    };

    let mut answer = String::with_capacity(text.len());
    answer.push_str(&text[..block.start]);
    answer.push_str(&text[block.end..]);
    let answer = answer.trim();

    let answer = if answer.is_empty() {
        text.trim().to_string()
    } else {
        answer.to_string()
    };

    (answer, intent)
}

struct DirectiveBlock {
    /// Byte range of the whole fenced block, fences included.
    start: usize,
    end: usize,
    body: String,
}

/// The last fenced block tagged `chart`, or failing that the last `json`
/// block that mentions `chart_type`.
fn find_directive_block(text: &str) -> Option<DirectiveBlock> {
    let fences: Vec<usize> = text.match_indices("```").map(|(i, _)| i).collect();
    let mut tagged = None;
    let mut json_fallback = None;

    for pair in fences.chunks_exact(2) {
        let (open, close) = (pair[0], pair[1]);
        let after_open = &text[open + 3..close];
        let (first_line, rest) = after_open.split_once('\n').unwrap_or((after_open, ""));

        // The info tag may be followed by the body on the same line.
        let first_line = first_line.trim();
        let (info, inline) = first_line
            .split_once(char::is_whitespace)
            .unwrap_or((first_line, ""));
        let body = if inline.trim().is_empty() {
            rest.to_string()
        } else {
            format!("{}\n{}", inline, rest)
        };

        let block = DirectiveBlock {
            start: open,
            end: close + 3,
            body,
        };

        if info.eq_ignore_ascii_case("chart") {
            tagged = Some(block);
        } else if info.eq_ignore_ascii_case("json") && block.body.contains("\"chart_type\"") {
            json_fallback = Some(block);
        }
    }

    tagged.or(json_fallback)
}
