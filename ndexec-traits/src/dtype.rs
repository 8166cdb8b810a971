//! Runtime element type tags.

use std::fmt;
use std::str::FromStr;

/// Element kind stored by an array.
///
/// The ten numeric kinds form the full dispatch catalog; `Utf8` marks
/// string arrays, which only support construction, copies and reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Bool,
    Int8,
    UInt8,
    Int16,
    Int32,
    Int64,
    Half,
    BFloat16,
    Float,
    Double,
    Utf8,
}

/// Restricted families an operation may draw an operand type from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Every numeric kind (bool included).
    Numeric,
    /// Floating-point kinds.
    Float,
    /// The boolean kind.
    Bool,
    /// The 64-bit signed integer kind.
    Long,
}

impl DataType {
    pub const NUMERIC: [DataType; 10] = [
        DataType::Bool,
        DataType::Int8,
        DataType::UInt8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Half,
        DataType::BFloat16,
        DataType::Float,
        DataType::Double,
    ];

    pub const FLOAT: [DataType; 4] = [
        DataType::Half,
        DataType::BFloat16,
        DataType::Float,
        DataType::Double,
    ];

    pub const BOOL: [DataType; 1] = [DataType::Bool];

    pub const LONG: [DataType; 1] = [DataType::Int64];

    /// Size of one element in bytes, `None` for variable-width strings.
    pub fn size_of(self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 => Some(1),
            DataType::Int16 | DataType::Half | DataType::BFloat16 => Some(2),
            DataType::Int32 | DataType::Float => Some(4),
            DataType::Int64 | DataType::Double => Some(8),
            DataType::Utf8 => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Half | DataType::BFloat16 | DataType::Float | DataType::Double
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::UInt8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_bool(self) -> bool {
        self == DataType::Bool
    }

    pub fn is_string(self) -> bool {
        self == DataType::Utf8
    }

    pub fn is_numeric(self) -> bool {
        !self.is_string()
    }

    /// Whether this kind belongs to `family`.
    pub fn in_family(self, family: TypeFamily) -> bool {
        family.members().contains(&self)
    }

    /// Ordering used when two kinds of the same class meet; wider wins.
    fn width_rank(self) -> u8 {
        match self {
            DataType::Bool => 0,
            DataType::UInt8 => 1,
            DataType::Int8 => 2,
            DataType::Int16 => 3,
            DataType::Int32 => 4,
            DataType::Int64 => 5,
            DataType::Half => 6,
            DataType::BFloat16 => 7,
            DataType::Float => 8,
            DataType::Double => 9,
            DataType::Utf8 => 10,
        }
    }

    /// Result kind of a pairwise operation between `self` and `other`.
    ///
    /// Equal kinds are kept. A floating kind beats any integer kind, and
    /// between two kinds of the same class the wider one is picked.
    pub fn pairwise_result(self, other: DataType) -> DataType {
        if self == other {
            return self;
        }
        match (self.is_float(), other.is_float()) {
            (true, false) => self,
            (false, true) => other,
            _ => {
                if self.width_rank() >= other.width_rank() {
                    self
                } else {
                    other
                }
            }
        }
    }

    /// `self` when it is floating point, `default` otherwise.
    pub fn floating_or(self, default: DataType) -> DataType {
        if self.is_float() {
            self
        } else {
            default
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Half => "half",
            DataType::BFloat16 => "bfloat16",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Utf8 => "utf8",
        }
    }
}

impl TypeFamily {
    pub fn members(self) -> &'static [DataType] {
        match self {
            TypeFamily::Numeric => &DataType::NUMERIC,
            TypeFamily::Float => &DataType::FLOAT,
            TypeFamily::Bool => &DataType::BOOL,
            TypeFamily::Long => &DataType::LONG,
        }
    }

    pub fn contains(self, dtype: DataType) -> bool {
        dtype.in_family(self)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeFamily::Numeric => "numeric",
            TypeFamily::Float => "float",
            TypeFamily::Bool => "bool",
            TypeFamily::Long => "long",
        };
        f.write_str(name)
    }
}

/// Error returned when a type name cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseDataTypeError(pub String);

impl fmt::Display for ParseDataTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data type `{}`", self.0)
    }
}

impl std::error::Error for ParseDataTypeError {}

impl FromStr for DataType {
    type Err = ParseDataTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s.to_ascii_lowercase().as_str() {
            "bool" => DataType::Bool,
            "int8" | "i8" => DataType::Int8,
            "uint8" | "u8" => DataType::UInt8,
            "int16" | "i16" => DataType::Int16,
            "int32" | "i32" => DataType::Int32,
            "int64" | "i64" | "long" => DataType::Int64,
            "half" | "f16" | "float16" => DataType::Half,
            "bfloat16" | "bf16" => DataType::BFloat16,
            "float" | "f32" | "float32" => DataType::Float,
            "double" | "f64" | "float64" => DataType::Double,
            "utf8" | "string" => DataType::Utf8,
            _ => return Err(ParseDataTypeError(s.to_string())),
        };
        Ok(dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::Bool.size_of(), Some(1));
        assert_eq!(DataType::BFloat16.size_of(), Some(2));
        assert_eq!(DataType::Float.size_of(), Some(4));
        assert_eq!(DataType::Int64.size_of(), Some(8));
        assert_eq!(DataType::Utf8.size_of(), None);
    }

    #[test]
    fn test_families() {
        assert_eq!(TypeFamily::Numeric.members().len(), 10);
        assert!(!TypeFamily::Numeric.contains(DataType::Utf8));
        for dt in DataType::FLOAT {
            assert!(dt.is_float());
            assert!(dt.in_family(TypeFamily::Float));
        }
        assert!(DataType::Int64.in_family(TypeFamily::Long));
        assert!(!DataType::Int32.in_family(TypeFamily::Long));
        assert!(DataType::Bool.in_family(TypeFamily::Bool));
    }

    #[test]
    fn test_pairwise_result() {
        assert_eq!(DataType::Float.pairwise_result(DataType::Float), DataType::Float);
        assert_eq!(DataType::Float.pairwise_result(DataType::Double), DataType::Double);
        assert_eq!(DataType::Int64.pairwise_result(DataType::Half), DataType::Half);
        assert_eq!(DataType::Int8.pairwise_result(DataType::Int32), DataType::Int32);
        assert_eq!(DataType::Bool.pairwise_result(DataType::UInt8), DataType::UInt8);
    }

    #[test]
    fn test_floating_or() {
        assert_eq!(DataType::Int32.floating_or(DataType::Float), DataType::Float);
        assert_eq!(DataType::Half.floating_or(DataType::Float), DataType::Half);
    }

    #[test]
    fn test_parse_roundtrip_names() {
        for dt in DataType::NUMERIC {
            assert_eq!(dt.name().parse::<DataType>(), Ok(dt));
        }
        assert!("complex64".parse::<DataType>().is_err());
    }
}
