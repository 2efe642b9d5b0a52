/// Implements `Identifiable`, `Timestamped` and `Entity` for a model that
/// carries `id`, `created_at` and `updated_at` fields.
///
/// Usage:
///   impl_entity!(Ministry, "ministries", "Ministry");
#[macro_export]
macro_rules! impl_entity {
    ($name:ident, $table:literal, $type_name:literal) => {
        impl ::mwp_core::traits::Identifiable for $name {
            fn id(&self) -> ::mwp_core::traits::Id {
                self.id
            }
        }

        impl ::mwp_core::traits::Timestamped for $name {
            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }
        }

        impl ::mwp_core::traits::Entity for $name {
            const TABLE_NAME: &'static str = $table;
            const TYPE_NAME: &'static str = $type_name;
        }
    };
}

/// Generates the text surface of a closed enumeration:
/// - `ALL` with every variant in declaration order
/// - `as_str()` returning the stored SCREAMING_SNAKE form
/// - `Display`
/// - `FromStr`, failing with a validation error on `$field`
///
/// Serde and sqlx renames are declared on the enum itself and must agree with
/// the strings given here.
#[macro_export]
macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::mwp_core::error::MwpError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(::mwp_core::error::MwpError::invalid(
                        $field,
                        format!("'{}' is not one of {}", other, [$($text),+].join(", ")),
                    )),
                }
            }
        }
    };
}
