/// Scalar element kinds understood by the backend.
///
/// This is the closed tag set a finished graph may mention; anything else
/// is rejected by `ValidatePass` before hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Reference-sized opaque value (functions, records, code, cells).
    Addr,
}

impl DType {
    pub fn is_signed_int(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, DType::U8 | DType::U16 | DType::U32 | DType::U64)
    }

    pub fn is_int(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_int() || self.is_float()
    }

    /// Width in bits; `Void` is zero and `Addr` is pointer-sized.
    pub fn bits(self) -> u32 {
        match self {
            DType::Void => 0,
            DType::Bool => 1,
            DType::I8 | DType::U8 => 8,
            DType::I16 | DType::U16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::U64 | DType::F64 | DType::Addr => 64,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DType::Void => "void",
            DType::Bool => "bool",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Addr => "addr",
        };
        f.write_str(s)
    }
}

/// The element type carried by every instruction result and block parameter.
///
/// `lanes` is the vector width; scalars have one lane. Only widths 1..=4 may
/// reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaseType {
    pub dtype: DType,
    pub lanes: u8,
}

impl BaseType {
    pub const VOID: BaseType = BaseType::scalar(DType::Void);
    pub const BOOL: BaseType = BaseType::scalar(DType::Bool);
    pub const I32: BaseType = BaseType::scalar(DType::I32);
    pub const I64: BaseType = BaseType::scalar(DType::I64);
    pub const F64: BaseType = BaseType::scalar(DType::F64);
    pub const ADDR: BaseType = BaseType::scalar(DType::Addr);

    pub const fn scalar(dtype: DType) -> Self {
        Self { dtype, lanes: 1 }
    }

    pub const fn vector(dtype: DType, lanes: u8) -> Self {
        Self { dtype, lanes }
    }

    pub fn is_bool(&self) -> bool {
        self.dtype == DType::Bool
    }

    pub fn is_int(&self) -> bool {
        self.dtype.is_int()
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype.is_numeric()
    }

    /// Integers narrower than 32 bits are widened before arithmetic.
    pub fn promoted(&self) -> Option<BaseType> {
        let dtype = match self.dtype {
            DType::I8 | DType::I16 => DType::I32,
            DType::U8 | DType::U16 => DType::U32,
            _ => return None,
        };
        Some(BaseType { dtype, lanes: self.lanes })
    }

    /// True if this type is in the fixed set accepted downstream.
    pub fn is_lowerable(&self) -> bool {
        (1..=4).contains(&self.lanes)
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lanes == 1 {
            write!(f, "{}", self.dtype)
        } else {
            write!(f, "{}x{}", self.dtype, self.lanes)
        }
    }
}

/// The payload of a literal constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LitValue {
    Bool(bool),
    /// Integers of any width, stored sign- or zero-extended to 64 bits.
    Int(i64),
    Float(f64),
}

/// A typed literal. Literals never live in a block; they appear directly as
/// instruction and terminator operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Literal {
    pub value: LitValue,
    pub ty: BaseType,
}

impl Literal {
    pub fn bool(b: bool) -> Self {
        Self { value: LitValue::Bool(b), ty: BaseType::BOOL }
    }

    pub fn int(v: i64, dtype: DType) -> Self {
        Self { value: LitValue::Int(v), ty: BaseType::scalar(dtype) }
    }

    pub fn i32(v: i32) -> Self {
        Self::int(v as i64, DType::I32)
    }

    pub fn f64(v: f64) -> Self {
        Self { value: LitValue::Float(v), ty: BaseType::F64 }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            LitValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            LitValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            LitValue::Bool(b) => write!(f, "{}", b),
            LitValue::Int(v) => write!(f, "{}:{}", v, self.ty),
            LitValue::Float(v) => write!(f, "{}:{}", v, self.ty),
        }
    }
}
