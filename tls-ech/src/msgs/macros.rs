/// Defines a TLS registry enum over an unsigned wire type.
///
/// Every listed variant maps to exactly one value; any other value read off
/// the wire is kept as `Unknown(value)` so that it re-encodes unchanged.
macro_rules! enum_builder {
    (
        $(#[doc = $comment:literal])*
        #[repr($uint:ty)]
        $(#[$attr:meta])*
        $enum_vis:vis enum $enum_name:ident
        {
          $( $(#[$variant_attr:meta])* $variant:ident => $value:literal ),* $(,)?
        }
    ) => {
        $(#[doc = $comment])*
        $(#[$attr])*
        #[non_exhaustive]
        #[derive(PartialEq, Eq, Clone, Copy, Hash)]
        $enum_vis enum $enum_name {
            $( $(#[$variant_attr])* #[allow(missing_docs)] $variant, )*
            /// A value this crate has no name for.
            Unknown($uint),
        }

        impl $enum_name {
            // NOTE(allow) generated irrespective if there are callers
            #[allow(dead_code)]
            $enum_vis fn to_array(self) -> [u8; core::mem::size_of::<$uint>()] {
                <$uint>::from(self).to_be_bytes()
            }

            // NOTE(allow) generated irrespective if there are callers
            #[allow(dead_code)]
            $enum_vis fn as_str(&self) -> Option<&'static str> {
                match self {
                    $( Self::$variant => Some(stringify!($variant)), )*
                    Self::Unknown(_) => None,
                }
            }
        }

        impl crate::msgs::codec::Codec<'_> for $enum_name {
            fn encode(&self, bytes: &mut alloc::vec::Vec<u8>) {
                crate::msgs::codec::Codec::encode(&<$uint>::from(*self), bytes);
            }

            fn read(
                r: &mut crate::msgs::codec::Reader<'_>,
            ) -> Result<Self, crate::error::InvalidMessage> {
                match <$uint as crate::msgs::codec::Codec>::read(r) {
                    Ok(x) => Ok(Self::from(x)),
                    Err(_) => Err(crate::error::InvalidMessage::MissingData(stringify!(
                        $enum_name
                    ))),
                }
            }
        }

        impl From<$uint> for $enum_name {
            fn from(x: $uint) -> Self {
                match x {
                    $( $value => Self::$variant, )*
                    x => Self::Unknown(x),
                }
            }
        }

        impl From<$enum_name> for $uint {
            fn from(value: $enum_name) -> Self {
                match value {
                    $( $enum_name::$variant => $value, )*
                    $enum_name::Unknown(x) => x,
                }
            }
        }

        impl core::fmt::Debug for $enum_name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self.as_str() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}(0x{:x?})", stringify!($enum_name), <$uint>::from(*self)),
                }
            }
        }
    };
}
