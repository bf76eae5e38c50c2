/// Declares a name enum for manager headers and events.
///
/// Each variant has the spelling current Asterisk emits, optionally followed
/// by `|`-separated names older releases used for the same thing. `FromStr`
/// accepts any of them, ignoring ASCII case; `as_str()` and `Display` always
/// give the current one.
///
/// ```ignore
/// define_wire_enum! {
///     error_type: ParseThingError,
///     pub enum Thing {
///         ActionId => "ActionID",
///         DialBegin => "DialBegin" | "Dial",
///     }
/// }
/// ```
macro_rules! define_wire_enum {
    (
        error_type: $Err:ident,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal $(| $legacy:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$Name] = &[ $( $Name::$variant, )+ ];

            /// Current wire spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }

            /// Names older Asterisk releases used instead of [`as_str`](Self::as_str).
            pub fn legacy_names(&self) -> &'static [&'static str] {
                match self {
                    $( $Name::$variant => &[ $( $legacy, )* ], )+
                }
            }

            fn matches_name(&self, s: &str) -> bool {
                s.eq_ignore_ascii_case(self.as_str())
                    || self
                        .legacy_names()
                        .iter()
                        .any(|old| s.eq_ignore_ascii_case(old))
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.matches_name(s))
                    .ok_or_else(|| $Err(s.to_string()))
            }
        }
    };
}
