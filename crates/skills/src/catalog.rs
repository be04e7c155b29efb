//! Catalog views of a registry: instruction text and tool definitions.

use std::io::{self, Write};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use serde_json::ser::Formatter;
use wire::ToolDefinition;

use crate::registry::{SkillDefinition, SkillRegistry};

const CATALOG_HEADER: &str = "Session remote skill catalog:";
const CATALOG_GUIDANCE: &str =
    "Use these capabilities when relevant and do not invent unknown tools.";

impl SkillRegistry {
    /// Input schema advertised for `skill`, falling back to the configured default.
    pub fn effective_input_schema(&self, skill: &SkillDefinition) -> Value {
        skill
            .input_schema
            .clone()
            .unwrap_or_else(|| self.config().default_input_schema.clone())
    }

    /// Human-readable catalog block; empty when there are no skills.
    pub fn instruction_text(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = vec![CATALOG_HEADER.to_string(), CATALOG_GUIDANCE.to_string()];
        for skill in self.skills() {
            lines.push(format!("- {}: {}", skill.name, skill.description));
            lines.push(format!(
                "  input_schema: {}",
                canonical_json(&self.effective_input_schema(skill))
            ));
            if let Some(output) = skill.output_schema.as_ref().filter(|s| !is_empty(s)) {
                lines.push(format!("  output_schema: {}", canonical_json(output)));
            }
            if let Some(text) = skill.output_description.as_deref().map(str::trim) {
                if !text.is_empty() {
                    lines.push(format!("  output_description: {text}"));
                }
            }
        }
        lines.join("\n")
    }

    /// Tool definitions sent at session creation, ordered by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.skills()
            .into_iter()
            .map(|skill| ToolDefinition {
                name: skill.name.clone(),
                description: skill.description.clone(),
                input_schema: self.effective_input_schema(skill),
            })
            .collect()
    }

    /// Prefix a user request with the catalog block.
    pub fn inject_request(&self, text: &str) -> String {
        let instruction = self.instruction_text();
        if instruction.is_empty() {
            return text.to_string();
        }
        format!("{instruction}\n\nUser request:\n{text}")
    }
}

fn is_empty(schema: &Value) -> bool {
    match schema {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// JSON with object keys sorted at every level, `", "` and `": "` separators,
/// and every character outside printable ASCII written as a `\uXXXX` escape.
pub(crate) fn canonical_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiSpaced);
    if Canonical(value).serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(out)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

struct AsciiSpaced;

impl Formatter for AsciiSpaced {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            return Ok(());
        }
        writer.write_all(b", ")
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            return Ok(());
        }
        writer.write_all(b", ")
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch < '\u{7f}' {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            other => other.serialize(serializer),
        }
    }
}
