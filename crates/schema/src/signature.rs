//! Callable signatures described as data.

use serde_json::{Map, Value};

use crate::shape::{Definitions, Record, Renderer, Shape, is_empty_schema, object_schema};

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub shape: Shape,
    /// Parameters with a default are not required.
    pub has_default: bool,
}

/// Parameters, return shape, and documentation of a skill handler.
///
/// ```
/// use schema::{Shape, Signature};
///
/// let signature = Signature::new()
///     .param("query", Shape::String)
///     .defaulted("limit", Shape::Integer)
///     .returns(Shape::list(Shape::String));
///
/// let input = signature.input_schema();
/// assert_eq!(input["required"], serde_json::json!(["query"]));
/// assert_eq!(input["additionalProperties"], false);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    catch_all: bool,
    returns: Option<Shape>,
    doc: Option<String>,
    definitions: Definitions,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter.
    pub fn param(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.params.push(Param {
            name: name.into(),
            shape,
            has_default: false,
        });
        self
    }

    /// Add a parameter that has a default value.
    pub fn defaulted(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.params.push(Param {
            name: name.into(),
            shape,
            has_default: true,
        });
        self
    }

    /// Accept arbitrary extra keyword arguments.
    pub fn catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    pub fn returns(mut self, shape: Shape) -> Self {
        self.returns = Some(shape);
        self
    }

    /// Attach the handler's documentation comment.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.doc = Some(text.into());
        self
    }

    /// Make a record available to [`Shape::Named`] references.
    pub fn define(mut self, record: Record) -> Self {
        self.definitions.insert(record);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// `{type: object, properties, required?, additionalProperties}`.
    pub fn input_schema(&self) -> Value {
        let mut renderer = Renderer::new(&self.definitions);
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(param.name.clone(), renderer.render(&param.shape, 1));
            if !param.has_default {
                required.push(Value::String(param.name.clone()));
            }
        }
        object_schema(properties, required, Value::Bool(self.catch_all))
    }

    /// Schema of the return value; `None` when unknown.
    pub fn output_schema(&self) -> Option<Value> {
        let shape = self.returns.as_ref()?;
        let schema = Renderer::new(&self.definitions).render(shape, 0);
        (!is_empty_schema(&schema)).then_some(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticket_signature() {
        let signature = Signature::new()
            .param("title", Shape::String)
            .param("summary", Shape::String)
            .defaulted("priority", Shape::choice(["low", "med", "high"]))
            .defaulted("owner_hint", Shape::optional(Shape::String));

        assert_eq!(
            signature.input_schema(),
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "summary": {"type": "string"},
                    "priority": {"enum": ["low", "med", "high"], "type": "string"},
                    "owner_hint": {"type": "string", "nullable": true}
                },
                "required": ["title", "summary"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn empty_signature() {
        let signature = Signature::new().catch_all();
        assert_eq!(
            signature.input_schema(),
            json!({"type": "object", "properties": {}, "additionalProperties": true})
        );
        assert_eq!(signature.output_schema(), None);
        assert_eq!(Signature::new().returns(Shape::Any).output_schema(), None);
    }

    #[test]
    fn named_records_resolve() {
        let signature = Signature::new()
            .define(Record::new("Filter").field("tag", Shape::String))
            .param("filter", Shape::named("Filter"))
            .returns(Shape::named("Filter"));

        assert_eq!(
            signature.input_schema()["properties"]["filter"]["required"],
            json!(["tag"])
        );
        assert_eq!(signature.output_schema().unwrap()["type"], "object");
    }
}
