//! Attribute values stored at one radial node.
//!
//! A model fixes one [`DataType`] globally; every node then carries one
//! [`Data`] holding a value per attribute in that kind. Caller-defined kinds
//! are plugged in through the [`CustomData`] trait.

use crate::error::{GeoTessError, Result};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Storage kind of every attribute value in a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Double,
    Float,
    Long,
    Int,
    Short,
    Byte,
    /// Caller-registered kind; the type name travels in the metadata.
    Custom,
}

impl DataType {
    /// Parse one of the built-in names. Anything else is a custom type name.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "DOUBLE" => Self::Double,
            "FLOAT" => Self::Float,
            "LONG" => Self::Long,
            "INT" => Self::Int,
            "SHORT" => Self::Short,
            "BYTE" => Self::Byte,
            _ => Self::Custom,
        }
    }

    /// Name as written into model files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::Long => "LONG",
            Self::Int => "INT",
            Self::Short => "SHORT",
            Self::Byte => "BYTE",
            Self::Custom => "CUSTOM",
        }
    }

    /// Bytes per attribute value in the binary format (0 for custom kinds).
    pub fn size_of(&self) -> usize {
        match self {
            Self::Double | Self::Long => 8,
            Self::Float | Self::Int => 4,
            Self::Short => 2,
            Self::Byte => 1,
            Self::Custom => 0,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A caller-defined data kind.
///
/// Implementations are immutable once built; models share them through `Arc`.
pub trait CustomData: Debug + Send + Sync {
    /// Name under which the matching codec is registered.
    fn type_name(&self) -> &str;

    /// Number of numeric attribute values exposed.
    fn len(&self) -> usize {
        1
    }

    /// Numeric view of attribute `attr`. Kinds with no numeric meaning return NaN.
    fn value(&self, _attr: usize) -> f64 {
        f64::NAN
    }

    /// Content equality against another custom value.
    fn eq_data(&self, other: &dyn CustomData) -> bool;

    /// Stable content hash.
    fn content_hash(&self) -> u64;

    fn as_any(&self) -> &dyn Any;
}

/// Values of every attribute at one radial node.
#[derive(Debug, Clone)]
pub enum Data {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I64(Vec<i64>),
    I32(Vec<i32>),
    I16(Vec<i16>),
    I8(Vec<i8>),
    Custom(Arc<dyn CustomData>),
}

macro_rules! each_numeric {
    ($data:expr, $v:ident => $body:expr, $custom:ident => $other:expr) => {
        match $data {
            Data::F64($v) => $body,
            Data::F32($v) => $body,
            Data::I64($v) => $body,
            Data::I32($v) => $body,
            Data::I16($v) => $body,
            Data::I8($v) => $body,
            Data::Custom($custom) => $other,
        }
    };
}

impl Data {
    /// Build a value of `data_type` from doubles. Fails when a value does not
    /// fit the target kind or the kind is custom.
    pub fn from_f64(data_type: DataType, values: &[f64]) -> Result<Self> {
        fn cast<T: NumCast>(values: &[f64]) -> Result<Vec<T>> {
            values
                .iter()
                .map(|&v| {
                    T::from(v).ok_or_else(|| {
                        GeoTessError::invalid_argument(format!("value {} out of range", v))
                    })
                })
                .collect()
        }

        Ok(match data_type {
            DataType::Double => Data::F64(values.to_vec()),
            DataType::Float => Data::F32(cast(values)?),
            DataType::Long => Data::I64(cast(values)?),
            DataType::Int => Data::I32(cast(values)?),
            DataType::Short => Data::I16(cast(values)?),
            DataType::Byte => Data::I8(cast(values)?),
            DataType::Custom => {
                return Err(GeoTessError::invalid_argument(
                    "custom data cannot be built from numeric values",
                ))
            }
        })
    }

    /// `n` zero values of `data_type` (NaN for floating kinds).
    pub fn missing(data_type: DataType, n: usize) -> Result<Self> {
        match data_type {
            DataType::Double | DataType::Float => Self::from_f64(data_type, &vec![f64::NAN; n]),
            _ => Self::from_f64(data_type, &vec![0.0; n]),
        }
    }

    /// Kind of the values held.
    pub fn data_type(&self) -> DataType {
        match self {
            Data::F64(_) => DataType::Double,
            Data::F32(_) => DataType::Float,
            Data::I64(_) => DataType::Long,
            Data::I32(_) => DataType::Int,
            Data::I16(_) => DataType::Short,
            Data::I8(_) => DataType::Byte,
            Data::Custom(_) => DataType::Custom,
        }
    }

    /// Type name as written into model files.
    pub fn type_name(&self) -> &str {
        match self {
            Data::Custom(c) => c.type_name(),
            other => other.data_type().as_str(),
        }
    }

    /// Number of attribute values.
    pub fn len(&self) -> usize {
        each_numeric!(self, v => v.len(), c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attribute value as a double. Out-of-range indexes return NaN.
    pub fn value(&self, attr: usize) -> f64 {
        match self {
            Data::F64(v) => v.get(attr).copied().unwrap_or(f64::NAN),
            Data::F32(v) => v.get(attr).map(|&x| x as f64).unwrap_or(f64::NAN),
            Data::I64(v) => v.get(attr).map(|&x| x as f64).unwrap_or(f64::NAN),
            Data::I32(v) => v.get(attr).map(|&x| x as f64).unwrap_or(f64::NAN),
            Data::I16(v) => v.get(attr).map(|&x| x as f64).unwrap_or(f64::NAN),
            Data::I8(v) => v.get(attr).map(|&x| x as f64).unwrap_or(f64::NAN),
            Data::Custom(c) => {
                if attr < c.len() {
                    c.value(attr)
                } else {
                    f64::NAN
                }
            }
        }
    }

    /// All attribute values as doubles.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    /// Overwrite attribute `attr`, converting to the stored kind.
    pub fn set_value(&mut self, attr: usize, value: f64) -> Result<()> {
        fn put<T: NumCast>(v: &mut [T], attr: usize, value: f64) -> Result<()> {
            let n = v.len();
            let slot = v.get_mut(attr).ok_or_else(|| {
                GeoTessError::invalid_argument(format!("attribute {} >= {}", attr, n))
            })?;
            *slot = T::from(value).ok_or_else(|| {
                GeoTessError::invalid_argument(format!("value {} out of range", value))
            })?;
            Ok(())
        }

        match self {
            Data::F64(v) => put(v, attr, value),
            Data::F32(v) => put(v, attr, value),
            Data::I64(v) => put(v, attr, value),
            Data::I32(v) => put(v, attr, value),
            Data::I16(v) => put(v, attr, value),
            Data::I8(v) => put(v, attr, value),
            Data::Custom(c) => Err(GeoTessError::invalid_argument(format!(
                "custom data {} is read-only",
                c.type_name()
            ))),
        }
    }

    /// Whether attribute `attr` is NaN (always false for integer kinds).
    pub fn is_nan(&self, attr: usize) -> bool {
        self.value(attr).is_nan()
    }

    /// Downcast a custom value.
    pub fn custom<T: 'static>(&self) -> Option<&T> {
        match self {
            Data::Custom(c) => c.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

fn same_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::F64(a), Data::F64(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_f64(*x, *y))
            }
            (Data::F32(a), Data::F32(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| same_f64(*x as f64, *y as f64))
            }
            (Data::I64(a), Data::I64(b)) => a == b,
            (Data::I32(a), Data::I32(b)) => a == b,
            (Data::I16(a), Data::I16(b)) => a == b,
            (Data::I8(a), Data::I8(b)) => a == b,
            (Data::Custom(a), Data::Custom(b)) => {
                a.type_name() == b.type_name() && a.eq_data(b.as_ref())
            }
            _ => false,
        }
    }
}

impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Data::F64(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Data::F32(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Data::I64(v) => v.hash(state),
            Data::I32(v) => v.hash(state),
            Data::I16(v) => v.hash(state),
            Data::I8(v) => v.hash(state),
            Data::Custom(c) => {
                c.type_name().hash(state);
                c.content_hash().hash(state);
            }
        }
    }
}

impl std::fmt::Display for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = each_numeric!(
            self,
            v => v.iter().map(|x| x.to_string()).collect(),
            c => vec![format!("<{}>", c.type_name())]
        );
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(d: &Data) -> u64 {
        let mut h = DefaultHasher::new();
        d.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_data_type_names() {
        for dt in [
            DataType::Double,
            DataType::Float,
            DataType::Long,
            DataType::Int,
            DataType::Short,
            DataType::Byte,
        ] {
            assert_eq!(DataType::from_str(dt.as_str()), dt);
        }
        assert_eq!(DataType::from_str("GridNodeData"), DataType::Custom);
        assert_eq!(DataType::Short.size_of(), 2);
    }

    #[test]
    fn test_from_f64_casts() {
        let d = Data::from_f64(DataType::Short, &[1.0, -7.0]).unwrap();
        assert_eq!(d, Data::I16(vec![1, -7]));
        assert_eq!(d.value(1), -7.0);
        assert!(d.value(2).is_nan());

        let err = Data::from_f64(DataType::Byte, &[300.0]).unwrap_err();
        assert!(matches!(err, GeoTessError::InvalidArgument(_)));
    }

    #[test]
    fn test_set_value() {
        let mut d = Data::from_f64(DataType::Float, &[1.5, 2.5]).unwrap();
        d.set_value(0, 8.25).unwrap();
        assert_eq!(d.value(0), 8.25);
        assert!(d.set_value(5, 1.0).is_err());
    }

    #[test]
    fn test_equality_and_hash() {
        let a = Data::F64(vec![1.0, f64::NAN]);
        let b = Data::F64(vec![1.0, f64::NAN]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = Data::F32(vec![1.0, f32::NAN]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing() {
        let d = Data::missing(DataType::Double, 3).unwrap();
        assert!(d.is_nan(0) && d.is_nan(2));
        let d = Data::missing(DataType::Int, 2).unwrap();
        assert_eq!(d, Data::I32(vec![0, 0]));
    }

    #[test]
    fn test_display() {
        let d = Data::I32(vec![1, 2, 3]);
        assert_eq!(d.to_string(), "1 2 3");
    }
}
