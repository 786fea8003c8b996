//! Integers narrower than their storage type, such as the 24-bit record id.


use std::fmt;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PartIntError<T> {
    value: T,
    bit_count: u32,
}
impl<T: fmt::Display> fmt::Display for PartIntError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {} does not fit into {} bits", self.value, self.bit_count)
    }
}
impl<T: fmt::Display + fmt::Debug> std::error::Error for PartIntError<T> {
}

macro_rules! define_part_int {
    ($name:ident, $base_type:ty, $bit_count:expr) => {
        #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name($base_type);
        impl $name {
            pub const BITS: u32 = $bit_count;
            pub const MAX: Self = Self((1 << $bit_count) - 1);

            pub const fn from_base_type(value: $base_type) -> Option<Self> {
                if value < (1 << $bit_count) {
                    Some(Self(value))
                } else {
                    None
                }
            }

            /// Keeps only the lowest bits of the value.
            pub const fn from_base_type_masked(value: $base_type) -> Self {
                Self(value & Self::MAX.0)
            }

            pub const fn as_base_type(&self) -> $base_type { self.0 }
        }
        impl TryFrom<$base_type> for $name {
            type Error = PartIntError<$base_type>;
            fn try_from(value: $base_type) -> Result<Self, Self::Error> {
                Self::from_base_type(value)
                    .ok_or(PartIntError { value, bit_count: $bit_count })
            }
        }
        impl From<$name> for $base_type {
            fn from(value: $name) -> Self {
                value.0
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        #[cfg(feature = "serde")]
        impl<'d> serde::Deserialize<'d> for $name {
            fn deserialize<D: serde::Deserializer<'d>>(deserializer: D) -> Result<Self, D::Error> {
                use serde::de::Error as _;

                let base_value = <$base_type>::deserialize(deserializer)?;
                Self::from_base_type(base_value)
                    .ok_or_else(|| D::Error::custom("out-of-range value"))
            }
        }
    };
}

define_part_int!(U4, u8, 4);
define_part_int!(U24, u32, 24);
