//! Introspected binding: schemas derived from struct declarations.
//!
//! [`describable!`](crate::describable) declares a struct and derives its
//! record schema from the declaration itself: the record is named after the
//! struct, each field becomes a schema field of the mapped type, in
//! declaration order. The namespace is given explicitly or taken from the
//! declaring module's path (`my_app::model` becomes `my_app.model`).
//!
//! ```ignore
//! describable! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Sensor in "com.example.iot" {
//!         pub id: String,
//!         pub reading: f64,
//!     }
//! }
//!
//! assert_eq!(Sensor::schema()?.fullname(), "com.example.iot.Sensor");
//! ```
//!
//! Derived schemas go through the same validation as parsed ones and are
//! cached after the first derivation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::RecordSource;
use crate::error::SchemaError;
use crate::schema::{Field, Name, RecordSchema, Schema};

/// A struct whose record schema is derived from its declaration
pub trait Describable: RecordSource {
    /// Record name (the struct name)
    const NAME: &'static str;

    fn namespace() -> Option<String>;

    /// Fields in declaration order
    fn describe() -> Result<Vec<Field>, SchemaError>;

    /// The derived schema, cached after the first call
    fn schema() -> Result<&'static Arc<RecordSchema>, SchemaError>;

    /// Derive the schema from scratch, bypassing the cache.
    fn derive_schema() -> Result<RecordSchema, SchemaError> {
        let namespace = Self::namespace();
        let name = Name::new(Self::NAME, namespace.as_deref())?;
        let fields = Self::describe()?;
        check_named_types(&fields, &mut HashMap::new())?;
        RecordSchema::new(name, None, fields)
    }
}

/// Explicit namespace, or the module path with `::` turned into `.`
#[doc(hidden)]
pub fn namespace_or_module(namespace: Option<&str>, module_path: &str) -> Option<String> {
    match namespace {
        Some(ns) => Some(ns.to_string()),
        None => Some(module_path.replace("::", ".")),
    }
}

// Two different structs deriving the same full name would produce schema
// text that can't be parsed back.
fn check_named_types<'a>(
    fields: &'a [Field],
    seen: &mut HashMap<&'a str, &'a Arc<RecordSchema>>,
) -> Result<(), SchemaError> {
    for field in fields {
        if let Schema::Record(record) = &field.schema {
            match seen.get(record.fullname()) {
                Some(existing) if existing.as_ref() != record.as_ref() => {
                    return Err(SchemaError::Redefined(record.fullname().to_string()));
                }
                Some(_) => {}
                None => {
                    seen.insert(record.fullname(), record);
                    check_named_types(record.fields(), seen)?;
                }
            }
        }
    }
    Ok(())
}

/// Declare a struct whose record schema is derived from its fields.
///
/// `pub struct Name in "namespace" { .. }` sets the namespace explicitly;
/// without `in`, the declaring module path is used.
#[macro_export]
macro_rules! describable {
    (
        @define [$ns:expr]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::binding::reflect::Describable for $name {
            const NAME: &'static str = stringify!($name);

            fn namespace() -> ::std::option::Option<::std::string::String> {
                $crate::binding::reflect::namespace_or_module($ns, module_path!())
            }

            fn describe() -> ::std::result::Result<::std::vec::Vec<$crate::schema::Field>, $crate::SchemaError> {
                Ok(vec![$(
                    $crate::schema::Field::new(
                        $crate::binding::field_name(stringify!($field)),
                        <$ty as $crate::binding::FieldType>::field_schema()?,
                    )
                ),*])
            }

            fn schema() -> ::std::result::Result<
                &'static ::std::sync::Arc<$crate::schema::RecordSchema>,
                $crate::SchemaError,
            > {
                static SCHEMA: ::std::sync::OnceLock<
                    ::std::result::Result<::std::sync::Arc<$crate::schema::RecordSchema>, $crate::SchemaError>,
                > = ::std::sync::OnceLock::new();

                SCHEMA
                    .get_or_init(|| {
                        <Self as $crate::binding::reflect::Describable>::derive_schema().map(::std::sync::Arc::new)
                    })
                    .as_ref()
                    .map_err(Clone::clone)
            }
        }

        $crate::__record_binding!(
            $name,
            <$name as $crate::binding::reflect::Describable>::schema(),
            $crate::binding::Binding::Introspected,
            { $($field : $ty),* }
        );
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $ns:literal { $($body:tt)* }
    ) => {
        $crate::describable!(@define [Some($ns)] $(#[$meta])* $vis struct $name { $($body)* });
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($body:tt)* }
    ) => {
        $crate::describable!(@define [None] $(#[$meta])* $vis struct $name { $($body)* });
    };
}
