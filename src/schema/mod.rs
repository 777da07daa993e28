//! # Concrete Schemas
//!
//! Typed record definitions instantiating the generic codec, one module per
//! schema family. Each type implements [`WireRecord`](crate::protocol::codec::WireRecord)
//! (records) or [`WireVariant`](crate::protocol::codec::WireVariant) (sum types).
//!
//! Layouts and dispatch tables are built on first use and cached for the life
//! of the process; [`registry`] assembles all of them into the schema set whose
//! hash is exchanged during the handshake.
//!
//! ## Dispatch Tables
//! | Id | Hierarchy | Type ids |
//! |----|-----------|----------|
//! | 1 | [`ParamValue`] | String=1, Int=2, Bool=3, Double=4 |
//! | 2 | [`Selector`] | AoeCircle=1, Raycast=2 |

use crate::core::value::{Record, Value};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::registry::SchemaRegistry;
use once_cell::sync::OnceCell;

/// Declare a one-byte wire enum with explicit discriminants `0..n`.
///
/// Generates the enum, its [`EnumDescriptor`](crate::core::layout::EnumDescriptor),
/// and a checked `TryFrom<u8>`.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            /// Every variant in discriminant order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire descriptor used in record layouts
            pub const fn descriptor() -> $crate::core::layout::EnumDescriptor {
                $crate::core::layout::EnumDescriptor::new(stringify!($name), Self::ALL.len() as u8)
            }

            /// Wire discriminant
            pub const fn value(self) -> u8 {
                self as u8
            }
        }

        impl ::std::convert::TryFrom<u8> for $name {
            type Error = $crate::error::ProtocolError;

            fn try_from(raw: u8) -> ::std::result::Result<Self, Self::Error> {
                match raw {
                    $($value => Ok($name::$variant),)+
                    _ => Err($crate::error::ProtocolError::InvalidEnumValue {
                        position: 0,
                        value: raw,
                        variant_count: Self::ALL.len() as u8,
                    }),
                }
            }
        }
    };
}

pub mod hitbox;
pub mod id_chain;
pub mod interaction;
pub mod item_category;
pub mod param;
pub mod selector;
pub mod vector;

pub use hitbox::Hitbox;
pub use id_chain::IdChain;
pub use interaction::{InteractionConfig, InteractionTarget};
pub use item_category::ItemCategory;
pub use param::ParamValue;
pub use selector::Selector;
pub use vector::Vector3f;

use crate::core::layout::DispatchTableId;
use crate::protocol::codec::WireRecord;

/// Dispatch table of [`ParamValue`]
pub const PARAM_VALUE_TABLE: DispatchTableId = DispatchTableId(1);

/// Dispatch table of [`Selector`]
pub const SELECTOR_TABLE: DispatchTableId = DispatchTableId(2);

/// Schema set of every record in this module, built once
pub fn registry() -> Result<&'static SchemaRegistry> {
    static REGISTRY: OnceCell<SchemaRegistry> = OnceCell::new();
    REGISTRY.get_or_try_init(|| {
        SchemaRegistry::builder()
            .layout(Vector3f::layout()?.clone())
            .layout(Hitbox::layout()?.clone())
            .layout(IdChain::layout()?.clone())
            .layout(ItemCategory::layout()?.clone())
            .layout(InteractionConfig::layout()?.clone())
            .table(param::table()?)
            .table(selector::table()?)
            .build()
    })
}

/// Value of a required field, converted with `get`
pub(crate) fn required<'a, T>(
    record: &'a Record,
    name: &str,
    get: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<T> {
    get(record.require(name)?).ok_or_else(|| wrong_shape(record, name))
}

/// Value of a nullable field, converted with `get` when present
pub(crate) fn optional<'a, T>(
    record: &'a Record,
    name: &str,
    get: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<Option<T>> {
    record
        .get(name)
        .map(|value| get(value).ok_or_else(|| wrong_shape(record, name)))
        .transpose()
}

pub(crate) fn wrong_shape(record: &Record, name: &str) -> ProtocolError {
    ProtocolError::SchemaMismatch(format!(
        "{}.{name}: {}",
        record.layout().name(),
        constants::ERR_WRONG_SHAPE
    ))
}
