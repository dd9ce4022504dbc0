//! Typed property binding.
//!
//! Resources opt into declarative configuration by implementing
//! [`Configurable`], normally through `#[derive(Configurable)]`, which builds
//! the name → setter table at compile time. Values are converted with
//! [`FromPropertyValue`].

use std::path::PathBuf;

use termbank_config::PropertyValue;

/// Why a single property could not be applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("unknown property")]
    Unknown,

    #[error("expected {expected}, got {found} `{value}`")]
    Type {
        expected: &'static str,
        found: &'static str,
        value: String,
    },

    #[error("value rejected: {0}")]
    Rejected(String),
}

impl PropertyError {
    fn mismatch(expected: &'static str, value: &PropertyValue) -> Self {
        PropertyError::Type {
            expected,
            found: value.type_name(),
            value: value.to_string(),
        }
    }
}

/// An object whose properties can be assigned by name.
pub trait Configurable {
    /// Names accepted by [`set_property`](Self::set_property), in field order.
    fn property_names(&self) -> &'static [&'static str];

    /// Assign one property.
    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError>;
}

/// Conversion from a declarative property value.
pub trait FromPropertyValue: Sized {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError>;
}

impl FromPropertyValue for String {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
        Ok(value.as_text().into_owned())
    }
}

impl FromPropertyValue for PathBuf {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
        match value {
            PropertyValue::String(s) => Ok(PathBuf::from(s)),
            other => Err(PropertyError::mismatch("path", other)),
        }
    }
}

impl FromPropertyValue for bool {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
        value
            .as_bool()
            .ok_or_else(|| PropertyError::mismatch("boolean", value))
    }
}

impl FromPropertyValue for f64 {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
        value
            .as_f64()
            .ok_or_else(|| PropertyError::mismatch("float", value))
    }
}

macro_rules! integer_property {
    ($($ty:ty),*) => {
        $(
            impl FromPropertyValue for $ty {
                fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
                    let wide = value
                        .as_i64()
                        .ok_or_else(|| PropertyError::mismatch("integer", value))?;
                    <$ty>::try_from(wide).map_err(|_| PropertyError::Rejected(format!(
                        "{wide} is out of range for {}",
                        stringify!($ty)
                    )))
                }
            }
        )*
    };
}

integer_property!(i32, i64, u16, u32, u64, usize);

impl<T: FromPropertyValue> FromPropertyValue for Option<T> {
    fn from_property(value: &PropertyValue) -> Result<Self, PropertyError> {
        T::from_property(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_accepts_any_scalar() {
        assert_eq!(String::from_property(&PropertyValue::from(12i64)).unwrap(), "12");
        assert_eq!(String::from_property(&PropertyValue::from("x")).unwrap(), "x");
    }

    #[test]
    fn test_integer_from_string_and_range() {
        assert_eq!(u64::from_property(&PropertyValue::from("100")).unwrap(), 100);
        assert!(matches!(
            u16::from_property(&PropertyValue::from(70_000i64)),
            Err(PropertyError::Rejected(_))
        ));
        assert!(matches!(
            u32::from_property(&PropertyValue::from(-1i64)),
            Err(PropertyError::Rejected(_))
        ));
    }

    #[test]
    fn test_type_mismatch_reports_found_type() {
        let err = bool::from_property(&PropertyValue::from(1.5)).unwrap_err();
        assert_eq!(
            err,
            PropertyError::Type {
                expected: "boolean",
                found: "float",
                value: "1.5".to_string(),
            }
        );
    }

    #[test]
    fn test_path_requires_string() {
        assert!(PathBuf::from_property(&PropertyValue::from(true)).is_err());
        assert_eq!(
            PathBuf::from_property(&PropertyValue::from("/tmp/x")).unwrap(),
            PathBuf::from("/tmp/x")
        );
    }
}
