//! Static binding: structs generated against an embedded schema.
//!
//! [`static_record!`](crate::static_record) declares a struct whose fields
//! line up one-to-one, in order, with a record schema given as text. The
//! schema is parsed and checked against the struct the first time it's
//! needed and cached for the life of the process; conversion to and from
//! records is positional with no name lookups.
//!
//! ## Example
//!
//! ```ignore
//! const CUSTOMER: &str = r#"{"type":"record","name":"Customer","fields":[
//!     {"name":"first_name","type":"string"},
//!     {"name":"age","type":"int"},
//!     {"name":"automated_email","type":"boolean","default":true}]}"#;
//!
//! static_record! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Customer: CUSTOMER, builder = CustomerBuilder {
//!         pub first_name: String,
//!         pub age: i32,
//!         pub automated_email: bool,
//!     }
//! }
//!
//! let customer = Customer::builder().first_name("Ada").age(36).build()?;
//! assert!(customer.automated_email); // schema default
//! ```
//!
//! The code generator in [`crate::codegen`] emits these invocations from a
//! parsed schema.

use std::sync::Arc;

use tracing::debug;

use crate::binding::RecordSource;
use crate::error::SchemaError;
use crate::schema::{RecordSchema, Schema};

/// A struct bound to a fixed record schema at compile time
pub trait StaticRecord: RecordSource {
    /// Schema text embedded at declaration
    const SCHEMA_TEXT: &'static str;

    /// The parsed, checked schema. Parsed once per process.
    fn schema() -> Result<&'static Arc<RecordSchema>, SchemaError>;
}

/// Parse a static record's schema and check it against the struct's fields.
#[doc(hidden)]
pub fn load_schema(
    text: &str,
    fields: Vec<(&'static str, Result<Schema, SchemaError>)>,
) -> Result<Arc<RecordSchema>, SchemaError> {
    let schema = Schema::parse_record(text)?;

    if schema.fields().len() != fields.len() {
        return Err(SchemaError::Incompatible {
            field: schema.fullname().to_string(),
            reason: format!(
                "schema declares {} fields, struct declares {}",
                schema.fields().len(),
                fields.len()
            ),
        });
    }

    for (declared, (name, field_type)) in schema.fields().iter().zip(fields) {
        let field_type = field_type?;
        if declared.name != name {
            return Err(SchemaError::Incompatible {
                field: name.to_string(),
                reason: format!("schema has field {:?} at this position", declared.name),
            });
        }
        if !declared.schema.same_kind(&field_type) {
            return Err(SchemaError::Incompatible {
                field: name.to_string(),
                reason: format!(
                    "schema type is {}, struct type is {}",
                    declared.schema.type_name(),
                    field_type.type_name()
                ),
            });
        }
    }

    debug!(
        record = schema.fullname(),
        fingerprint = %format!("{:016x}", Schema::Record(Arc::clone(&schema)).fingerprint()),
        "Loaded static record schema"
    );

    Ok(schema)
}

/// Declare a struct bound to a record schema, plus a typed builder.
///
/// Fields must match the schema's fields in name, order and type. Raw
/// identifiers map to their bare name (`r#type` is the field `type`).
#[macro_export]
macro_rules! static_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $schema:expr, builder = $builder:ident {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::binding::specific::StaticRecord for $name {
            const SCHEMA_TEXT: &'static str = $schema;

            fn schema() -> ::std::result::Result<
                &'static ::std::sync::Arc<$crate::schema::RecordSchema>,
                $crate::SchemaError,
            > {
                static SCHEMA: ::std::sync::OnceLock<
                    ::std::result::Result<::std::sync::Arc<$crate::schema::RecordSchema>, $crate::SchemaError>,
                > = ::std::sync::OnceLock::new();

                SCHEMA
                    .get_or_init(|| {
                        $crate::binding::specific::load_schema(
                            <Self as $crate::binding::specific::StaticRecord>::SCHEMA_TEXT,
                            vec![$((
                                $crate::binding::field_name(stringify!($field)),
                                <$ty as $crate::binding::FieldType>::field_schema(),
                            )),*],
                        )
                    })
                    .as_ref()
                    .map_err(Clone::clone)
            }
        }

        $crate::__record_binding!(
            $name,
            <$name as $crate::binding::specific::StaticRecord>::schema(),
            $crate::binding::Binding::Static,
            { $($field : $ty),* }
        );

        /// Typed builder applying schema defaults at `build`
        $vis struct $builder {
            inner: ::std::result::Result<$crate::binding::RecordBuilder, $crate::SchemaError>,
        }

        impl $builder {
            $(
                pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                    if let Ok(builder) = &mut self.inner {
                        let value: $ty = value.into();
                        match <$ty as $crate::binding::FieldType>::to_value(&value) {
                            Ok(value) => {
                                builder.set($crate::binding::field_name(stringify!($field)), value);
                            }
                            Err(err) => builder.fail(err),
                        }
                    }
                    self
                }
            )*

            pub fn build(self) -> $crate::Result<$name> {
                let record = self.inner?.build()?;
                <$name as $crate::binding::RecordSource>::from_record(record)
            }
        }

        impl $name {
            $vis fn builder() -> $builder {
                $builder {
                    inner: <$name as $crate::binding::specific::StaticRecord>::schema()
                        .map($crate::binding::RecordBuilder::new),
                }
            }
        }
    };
}
