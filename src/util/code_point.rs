/// Defines an enum over a protocol code point field.
///
/// Assigned values get a named variant. Anything else is kept with its raw
/// value so it can be logged and written back unchanged: `Unassigned` for
/// values in the given range, which a peer may legitimately send, and
/// `Invalid` for values outside it, which no conforming peer sends.
///
/// ```rust
/// use picostack_rs::code_point_enum;
///
/// code_point_enum! {
///     /// ICMP message types
///     IcmpType: u8 {
///         EchoReply = 0,
///         EchoRequest = 8,
///     },
///     unassigned 1..=127
/// }
///
/// assert_eq!(IcmpType::from(8u8), IcmpType::EchoRequest);
/// assert_eq!(IcmpType::from(42u8), IcmpType::Unassigned(42));
/// assert_eq!(IcmpType::from(200u8), IcmpType::Invalid(200));
/// assert!(IcmpType::from(42u8).is_unassigned());
/// assert_eq!(IcmpType::EchoReply.name(), Some("EchoReply"));
/// assert_eq!(u8::from(IcmpType::Invalid(200)), 200);
/// assert_eq!(IcmpType::Unassigned(42).to_string(), "unassigned(42)");
/// ```
#[macro_export]
macro_rules! code_point_enum {
    (
        $(#[$doc:meta])*
        $name:ident: $unit:ty { $($variant:ident = $value:expr,)+ },
        unassigned $range:expr
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Value in the unassigned range
            Unassigned($unit),
            /// Value outside every defined range
            Invalid($unit),
        }

        impl $name {
            /// Name of an assigned code point
            pub fn name(&self) -> Option<&'static str> {
                match self {
                    $($name::$variant => Some(stringify!($variant)),)+
                    _ => None,
                }
            }

            pub fn is_unassigned(&self) -> bool {
                matches!(self, $name::Unassigned(_))
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $name::Unassigned(v) => write!(f, "unassigned({})", v),
                    $name::Invalid(v) => write!(f, "invalid({})", v),
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl From<$name> for $unit {
            fn from(code: $name) -> Self {
                match code {
                    $($name::$variant => $value,)+
                    $name::Unassigned(v) | $name::Invalid(v) => v,
                }
            }
        }

        impl From<$unit> for $name {
            fn from(raw: $unit) -> Self {
                $(
                    if raw == $value {
                        return $name::$variant;
                    }
                )+
                if ($range).contains(&raw) {
                    $name::Unassigned(raw)
                } else {
                    $name::Invalid(raw)
                }
            }
        }
    };
}
