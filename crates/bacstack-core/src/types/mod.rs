/// Generates a `Copy` enum over a numeric code with a catch-all variant for
/// values outside the named set, plus `const` conversions in both directions.
macro_rules! numbered_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($repr:ty) via $to:ident / $from:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)*
        }
        fallback $fallback:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis enum $name {
            $($(#[$vmeta])* $variant,)*
            $fallback($repr),
        }

        impl $name {
            pub const fn $to(self) -> $repr {
                match self {
                    $(Self::$variant => $value,)*
                    Self::$fallback(v) => v,
                }
            }

            pub const fn $from(value: $repr) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    v => Self::$fallback(v),
                }
            }
        }
    };
}

pub mod any_value;
pub mod bit_string;
pub mod data_value;
pub mod date_time;
pub mod enums;
pub mod object_id;
pub mod object_type;
pub mod property_id;

pub use any_value::AnyValue;
pub use bit_string::BitString;
pub use data_value::DataValue;
pub use date_time::{Date, Time};
pub use enums::{
    AbortReason, ErrorClass, ErrorCode, MaxApdu, MaxSegments, RejectReason, Segmentation,
};
pub use object_id::ObjectId;
pub use object_type::ObjectType;
pub use property_id::PropertyId;
