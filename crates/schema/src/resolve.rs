//! Registration-time resolution of skill text and schemas.

use serde_json::Value;

use crate::doc::Documentation;
use crate::provider::{Inference, SchemaProvider};

/// Values given explicitly at registration. Explicit values always win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declared {
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    /// Documentation text; overrides what the provider found.
    pub doc: Option<String>,
}

/// Final text and schemas of a skill.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub description: String,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub output_description: Option<String>,
}

/// Resolve description, input, and output for the skill `name`.
///
/// Description: explicit, else the documentation summary, else
/// `"Remote skill {name}"`. Input: the explicit schema, else the inferred
/// one, then enriched from documentation. Output: explicit, else inferred.
pub fn resolve(name: &str, declared: Declared, provider: Option<&dyn SchemaProvider>) -> Resolved {
    let inference = provider.map(|provider| provider.infer()).unwrap_or_default();
    let Inference {
        input_schema: inferred_input,
        output_schema: inferred_output,
        documentation,
    } = inference;
    let documentation = match declared.doc.as_deref() {
        Some(text) => Documentation::parse(text),
        None => documentation,
    };

    let description = trimmed(declared.description.as_deref())
        .or_else(|| trimmed(documentation.summary.as_deref()))
        .unwrap_or_else(|| format!("Remote skill {name}"));

    let input_schema = declared
        .input_schema
        .or(inferred_input)
        .map(|schema| enrich(schema, &documentation));

    let output_description = declared
        .output_schema
        .as_ref()
        .and_then(|schema| trimmed(schema.get("description").and_then(Value::as_str)))
        .or_else(|| trimmed(documentation.returns.as_deref()));
    let output_schema = declared.output_schema.or(inferred_output);

    tracing::trace!(
        skill = name,
        has_input_schema = input_schema.is_some(),
        has_output_schema = output_schema.is_some(),
        "resolved skill schema"
    );

    Resolved {
        description,
        input_schema,
        output_schema,
        output_description,
    }
}

/// Attach documentation descriptions without adding properties.
fn enrich(mut schema: Value, documentation: &Documentation) -> Value {
    let Some(object) = schema.as_object_mut() else {
        return schema;
    };

    if let Some(summary) = trimmed(documentation.summary.as_deref()) {
        if !has_text(object.get("description")) {
            object.insert("description".into(), Value::String(summary));
        }
    }

    if let Some(properties) = object.get_mut("properties").and_then(Value::as_object_mut) {
        for (name, text) in &documentation.params {
            let Some(property) = properties.get_mut(name).and_then(Value::as_object_mut) else {
                continue;
            };
            if !has_text(property.get("description")) {
                property.insert("description".into(), Value::String(text.clone()));
            }
        }
    }

    schema
}

fn has_text(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|text| !text.trim().is_empty())
}

fn trimmed(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    (!text.is_empty()).then(|| text.to_string())
}
