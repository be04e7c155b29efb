//! Pluggable schema sources.

use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use serde_json::Value;

use crate::doc::Documentation;
use crate::signature::Signature;

/// What a provider could learn about a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub documentation: Documentation,
}

/// Source of inferred schemas for a skill.
///
/// Providers are best-effort: anything they cannot determine is left unset
/// and registration falls back to defaults.
pub trait SchemaProvider: Send + Sync {
    fn infer(&self) -> Inference;
}

impl SchemaProvider for Signature {
    fn infer(&self) -> Inference {
        Inference {
            input_schema: Some(self.input_schema()),
            output_schema: self.output_schema(),
            documentation: self.doc_text().map(Documentation::parse).unwrap_or_default(),
        }
    }
}

/// Provider that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Opaque;

impl SchemaProvider for Opaque {
    fn infer(&self) -> Inference {
        Inference::default()
    }
}

/// Schemas derived from `schemars::JsonSchema` types.
///
/// ```
/// use schema::{Derived, SchemaProvider};
/// use schemars::JsonSchema;
///
/// #[derive(JsonSchema)]
/// #[allow(dead_code)]
/// struct Lookup {
///     id: u64,
///     verbose: Option<bool>,
/// }
///
/// let inferred = Derived::input::<Lookup>().infer();
/// let input = inferred.input_schema.unwrap();
/// assert_eq!(input["required"], serde_json::json!(["id"]));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    input: Option<Value>,
    output: Option<Value>,
    doc: Option<String>,
}

impl Derived {
    /// Derive the input schema from the argument type.
    pub fn input<A: JsonSchema>() -> Self {
        Self {
            input: derive_schema::<A>(),
            ..Self::default()
        }
    }

    /// Derive the output schema from the return type.
    pub fn output<R: JsonSchema>(mut self) -> Self {
        self.output = derive_schema::<R>();
        self
    }

    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.doc = Some(text.into());
        self
    }
}

impl SchemaProvider for Derived {
    fn infer(&self) -> Inference {
        Inference {
            input_schema: self.input.clone(),
            output_schema: self.output.clone(),
            documentation: self
                .doc
                .as_deref()
                .map(Documentation::parse)
                .unwrap_or_default(),
        }
    }
}

fn derive_schema<T: JsonSchema>() -> Option<Value> {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    match serde_json::to_value(root) {
        Ok(Value::Object(mut schema)) => {
            schema.remove("title");
            Some(Value::Object(schema))
        }
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "schema derivation failed");
            None
        }
    }
}
