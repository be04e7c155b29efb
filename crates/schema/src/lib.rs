//! Schema inference for remote skills.
//!
//! A skill's input schema, output schema, and description come from three
//! places, in priority order: values declared at registration, a
//! [`SchemaProvider`], and built-in fallbacks. Inference is best-effort and
//! never fails; anything that cannot be determined is left unset.
//!
//! # Example
//!
//! ```
//! use schema::{Declared, Shape, Signature, resolve};
//!
//! let signature = Signature::new()
//!     .param("title", Shape::String)
//!     .param("summary", Shape::String)
//!     .defaulted("priority", Shape::choice(["low", "med", "high"]))
//!     .defaulted("owner_hint", Shape::optional(Shape::String))
//!     .doc("Open a ticket.\n\nArgs:\n    title: Short title.");
//!
//! let resolved = resolve("create_ticket", Declared::default(), Some(&signature));
//! let input = resolved.input_schema.unwrap();
//!
//! assert_eq!(resolved.description, "Open a ticket.");
//! assert_eq!(input["required"], serde_json::json!(["title", "summary"]));
//! assert_eq!(input["properties"]["owner_hint"]["nullable"], true);
//! ```

mod doc;
mod provider;
mod resolve;
mod shape;
mod signature;

pub use doc::Documentation;
pub use provider::{Derived, Inference, Opaque, SchemaProvider};
pub use resolve::{Declared, Resolved, resolve};
pub use shape::{Definitions, Field, MAX_DEPTH, Record, Shape, to_schema};
pub use signature::{Param, Signature};
