//! Type-shape descriptors and their JSON-schema rendering.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

/// Nesting limit for schema rendering. Deeper shapes render as `{"type": "object"}`.
pub const MAX_DEPTH: usize = 12;

/// Shape of a parameter, field, or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// No type information; renders as `{}`.
    Any,
    Null,
    Boolean,
    Integer,
    Number,
    String,
    /// Value or null.
    Optional(Box<Shape>),
    /// One of several shapes. A `Null` branch marks the result nullable.
    Union(Vec<Shape>),
    /// Sequences and sets.
    List(Box<Shape>),
    /// Fixed-size heterogeneous sequence.
    Tuple(Vec<Shape>),
    /// String-keyed mapping with the given value shape.
    Map(Box<Shape>),
    /// Fixed set of allowed values.
    Choice(Vec<Value>),
    Record(Record),
    /// Reference to a record in [`Definitions`].
    Named(String),
    /// A type with no usable structure.
    Opaque,
}

impl Shape {
    pub fn optional(inner: Shape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(item: Shape) -> Self {
        Self::List(Box::new(item))
    }

    pub fn map(value: Shape) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn choice<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Choice(values.into_iter().map(Into::into).collect())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
    pub required: bool,
}

/// Plain record type: named fields, optionally accepting extra keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>,
    pub open: bool,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            open: false,
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape,
            required: true,
        });
        self
    }

    /// Add a field that may be omitted.
    pub fn optional_field(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape,
            required: false,
        });
        self
    }

    /// Accept keys beyond the declared fields.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }
}

/// Records that [`Shape::Named`] can refer to, including recursive ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    records: HashMap<String, Record>,
}

impl Definitions {
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }
}

/// Render `shape` with no named definitions available.
pub fn to_schema(shape: &Shape) -> Value {
    Renderer::new(&Definitions::default()).render(shape, 0)
}

pub(crate) struct Renderer<'a> {
    definitions: &'a Definitions,
    path: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(definitions: &'a Definitions) -> Self {
        Self {
            definitions,
            path: Vec::new(),
        }
    }

    pub(crate) fn render(&mut self, shape: &Shape, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return json!({"type": "object"});
        }

        match shape {
            Shape::Any => json!({}),
            Shape::Null => json!({"nullable": true}),
            Shape::Boolean => json!({"type": "boolean"}),
            Shape::Integer => json!({"type": "integer"}),
            Shape::Number => json!({"type": "number"}),
            Shape::String => json!({"type": "string"}),
            Shape::Opaque => json!({"type": "object"}),
            Shape::Optional(inner) => {
                let mut schema = self.render(inner, depth + 1);
                mark_nullable(&mut schema);
                schema
            }
            Shape::Union(branches) => self.render_union(branches, depth),
            Shape::List(item) => array_of(self.render(item, depth + 1)),
            Shape::Tuple(items) => {
                let item = match items.as_slice() {
                    [] => json!({}),
                    [only] => self.render(only, depth + 1),
                    many => {
                        let any_of: Vec<Value> =
                            many.iter().map(|s| self.render(s, depth + 1)).collect();
                        json!({"anyOf": any_of})
                    }
                };
                array_of(item)
            }
            Shape::Map(value) => {
                let value = self.render(value, depth + 1);
                let mut schema = json!({"type": "object"});
                if !is_empty_schema(&value) {
                    schema["additionalProperties"] = value;
                }
                schema
            }
            Shape::Choice(values) => {
                let mut schema = json!({"enum": values});
                if let Some(kind) = choice_type(values) {
                    schema["type"] = json!(kind);
                }
                schema
            }
            Shape::Record(record) => self.render_record(record, depth),
            Shape::Named(name) => match self.definitions.get(name) {
                Some(record) => self.render_record(record, depth),
                None => json!({}),
            },
        }
    }

    fn render_union(&mut self, branches: &[Shape], depth: usize) -> Value {
        let nullable = branches.iter().any(|b| matches!(b, Shape::Null));
        let concrete: Vec<&Shape> = branches
            .iter()
            .filter(|b| !matches!(b, Shape::Null))
            .collect();

        let mut schema = match concrete.as_slice() {
            [only] => self.render(only, depth + 1),
            [] => json!({}),
            many => {
                let any_of: Vec<Value> = many.iter().map(|s| self.render(s, depth + 1)).collect();
                json!({"anyOf": any_of})
            }
        };
        if nullable {
            mark_nullable(&mut schema);
        }
        schema
    }

    fn render_record(&mut self, record: &Record, depth: usize) -> Value {
        if self.path.iter().any(|seen| *seen == record.name) {
            return json!({"type": "object"});
        }

        self.path.push(record.name.clone());
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &record.fields {
            properties.insert(field.name.clone(), self.render(&field.shape, depth + 1));
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }
        self.path.pop();

        object_schema(properties, required, Value::Bool(record.open))
    }
}

/// `{type: object, properties, required?, additionalProperties}`.
pub(crate) fn object_schema(
    properties: Map<String, Value>,
    required: Vec<Value>,
    additional: Value,
) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    schema.insert("additionalProperties".into(), additional);
    Value::Object(schema)
}

pub(crate) fn is_empty_schema(schema: &Value) -> bool {
    schema.as_object().is_some_and(Map::is_empty)
}

fn array_of(item: Value) -> Value {
    let mut schema = json!({"type": "array"});
    if !is_empty_schema(&item) {
        schema["items"] = item;
    }
    schema
}

fn mark_nullable(schema: &mut Value) {
    if let Some(object) = schema.as_object_mut() {
        object.insert("nullable".into(), Value::Bool(true));
    }
}

/// Shared JSON scalar type of the choices, if there is one.
fn choice_type(values: &[Value]) -> Option<&'static str> {
    let mut kinds = Vec::new();
    for value in values {
        let kind = match value {
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            _ => return None,
        };
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }

    match kinds.as_slice() {
        [only] => Some(*only),
        ["integer", "number"] | ["number", "integer"] => Some("number"),
        _ => None,
    }
}
