//! Fieldform Core - declarative, directive-driven field transformation
//!
//! This crate walks arbitrary record graphs (nested records, sequences and
//! maps) and applies the directive chain declared on each field to that
//! field's value in place, collecting per-field failures into one error.
//!
//! # Main Components
//!
//! - **Value Model**: the [`Reflect`] trait and its capability views, with
//!   implementations for std scalars, containers and chrono types
//! - **Directive Parser**: tag strings such as `"trim,lowercase"` into chains
//! - **Type Unwrapper**: strips `Option` and `Box<dyn Reflect>` layers
//! - **Namespace Resolver**: `"a.b[2].c"` lookups for cross-field directives
//! - **Traversal and Dispatch**: depth-first walk, registry lookup, error
//!   aggregation, optional parallel fan-out
//!
//! # Example
//!
//! ```
//! use fieldform_core::{Record, Transformer};
//!
//! #[derive(Record)]
//! struct Signup {
//!     #[transform("trim,lowercase")]
//!     email: String,
//!     #[transform("trim")]
//!     nickname: Option<String>,
//! }
//!
//! let mut signup = Signup {
//!     email: "  Ada@Example.COM ".to_string(),
//!     nickname: None,
//! };
//!
//! Transformer::new().transform(&mut signup).unwrap();
//! assert_eq!(signup.email, "ada@example.com");
//! ```

// Lets derive output refer to `::fieldform_core` from inside this crate.
extern crate self as fieldform_core;

pub mod built_in;
pub mod cancel;
pub mod config;
pub mod directive;
pub mod dispatch;
pub mod error;
mod fanout;
pub mod field_error;
pub mod namespace;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod transformer;
pub mod unwrap;
pub mod value;
mod walk;

// Re-export main types for convenience
pub use cancel::CancelToken;
pub use config::{DispatchMode, ExecutionMode, PoolConfig, TransformerConfig};
pub use directive::{Directive, DirectiveParser};
pub use dispatch::FieldLevel;
pub use error::{Error, Result};
pub use field_error::{FieldError, FieldErrors};
pub use registry::{Registry, TransformFn};
pub use resolver::{resolve, Resolved};
pub use source::{DirectiveSource, FieldDescriptor, SchemaSource, TagSource};
pub use transformer::{Transformer, TransformerBuilder};
pub use value::{
    FieldInfo, Kind, MapKey, MapValue, Record, Reflect, ReflectMut, ReflectRef, Scalar, Sequence,
    SetError, Value,
};

#[cfg(feature = "derive")]
pub use fieldform_derive::Record;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
