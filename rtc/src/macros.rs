/// Implements `From<&str>` and `Display` for a fieldless enum from a single
/// table of its W3C string values.
///
/// The enum must have an `Unspecified` variant. Strings outside the table
/// parse to it, and it prints as `Unspecified`.
macro_rules! string_values {
    ($ty:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $ty {
            fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unspecified => $crate::peer_connection::state::UNSPECIFIED_STR,
                }
            }
        }

        impl From<&str> for $ty {
            fn from(raw: &str) -> Self {
                match raw {
                    $($value => Self::$variant,)+
                    _ => Self::Unspecified,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Asserts that every `(value, string)` pair survives `Display` and
/// `From<&str>` unchanged.
#[cfg(test)]
macro_rules! assert_string_values {
    ($ty:ident, [$(($variant:ident, $value:literal)),+ $(,)?]) => {
        $(
            assert_eq!($ty::$variant.to_string(), $value);
            assert_eq!($ty::from($value), $ty::$variant, "parsing {:?}", $value);
        )+
        assert_eq!($ty::Unspecified.to_string(), "Unspecified");
        assert_eq!($ty::from("Unspecified"), $ty::Unspecified);
        assert_eq!($ty::from("no-such-value"), $ty::Unspecified);
    };
}
