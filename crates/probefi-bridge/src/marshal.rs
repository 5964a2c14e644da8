//! Mapping between C declarations, native ABI types and host values.
//!
//! [`NativeType`] is the closed set of types the invocation engine can pass
//! by value. [`Value`] is what callers hand in and get back; it is coerced to
//! the declared parameter type before a call, with the same wrapping and
//! truncating conversions a C cast would perform.

use std::ffi::c_void;
use std::fmt;
use std::mem::size_of;
use std::os::raw::{c_char, c_int, c_long, c_uint, c_ulong};

use crate::csig::{CSignature, CType};
use crate::error::{BridgeError, Result};

/// Maximum number of parameters the invocation engine dispatches.
pub const MAX_ARITY: usize = 3;

/// ABI-level type of an argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
    Bool,
    /// C `int`.
    Int,
    /// C `unsigned int`.
    UInt,
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
    Pointer,
}

impl NativeType {
    /// Map a C type to the native type it is passed as.
    pub fn from_ctype(ct: &CType) -> Result<Self> {
        Ok(match ct {
            CType::Void => NativeType::Void,
            CType::Bool => NativeType::Bool,
            CType::Char => plain_char(),
            CType::SignedChar | CType::Int8 => NativeType::I8,
            CType::UnsignedChar | CType::UInt8 => NativeType::U8,
            CType::Short | CType::Int16 => NativeType::I16,
            CType::UnsignedShort | CType::UInt16 => NativeType::U16,
            CType::Int => NativeType::Int,
            CType::UnsignedInt => NativeType::UInt,
            CType::Int32 => NativeType::I32,
            CType::UInt32 => NativeType::U32,
            CType::Long => signed_of_size(size_of::<c_long>()),
            CType::UnsignedLong => unsigned_of_size(size_of::<c_ulong>()),
            CType::LongLong | CType::Int64 => NativeType::I64,
            CType::UnsignedLongLong | CType::UInt64 => NativeType::U64,
            CType::SizeT | CType::UIntPtr => unsigned_of_size(size_of::<usize>()),
            CType::IntPtr => signed_of_size(size_of::<isize>()),
            CType::Float => NativeType::F32,
            CType::Double => NativeType::F64,
            CType::Pointer(_) => NativeType::Pointer,
            CType::Const(inner) => NativeType::from_ctype(inner)?,
            CType::LongDouble | CType::Struct(_) => {
                return Err(BridgeError::UnsupportedType {
                    ctype: ct.to_string(),
                })
            }
        })
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            NativeType::Void | NativeType::Bool | NativeType::F32 | NativeType::F64 | NativeType::Pointer
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, NativeType::F32 | NativeType::F64)
    }
}

/// Plain `char` follows the platform: unsigned on ARM Linux, for one.
fn plain_char() -> NativeType {
    if c_char::MIN == 0 {
        NativeType::U8
    } else {
        NativeType::I8
    }
}

fn signed_of_size(bytes: usize) -> NativeType {
    if bytes == 8 {
        NativeType::I64
    } else {
        NativeType::I32
    }
}

fn unsigned_of_size(bytes: usize) -> NativeType {
    if bytes == 8 {
        NativeType::U64
    } else {
        NativeType::U32
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NativeType::Void => "void",
            NativeType::Bool => "bool",
            NativeType::Int => "int",
            NativeType::UInt => "uint",
            NativeType::I8 => "i8",
            NativeType::I16 => "i16",
            NativeType::I32 => "i32",
            NativeType::I64 => "i64",
            NativeType::U8 => "u8",
            NativeType::U16 => "u16",
            NativeType::U32 => "u32",
            NativeType::U64 => "u64",
            NativeType::F32 => "f32",
            NativeType::F64 => "f64",
            NativeType::Pointer => "pointer",
        };
        f.write_str(s)
    }
}

/// Lowered call signature: the native types of the return value and each
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSignature {
    pub name: String,
    pub ret: NativeType,
    pub params: Vec<NativeType>,
}

impl NativeSignature {
    /// Lower a parsed C declaration.
    pub fn from_csig(sig: &CSignature) -> Result<Self> {
        if sig.is_variadic {
            return Err(BridgeError::Variadic {
                function: sig.name.clone(),
            });
        }
        let mut params = Vec::with_capacity(sig.parameters.len());
        for ct in sig.parameter_types() {
            if ct.is_void() {
                return Err(BridgeError::IllegalVoidParameter {
                    function: sig.name.clone(),
                });
            }
            params.push(NativeType::from_ctype(ct)?);
        }
        if params.len() > MAX_ARITY {
            return Err(BridgeError::TooManyParameters {
                function: sig.name.clone(),
                count: params.len(),
                max: MAX_ARITY,
            });
        }
        Ok(NativeSignature {
            name: sig.name.clone(),
            ret: NativeType::from_ctype(&sig.return_type)?,
            params,
        })
    }

    /// Parse and lower a C declaration in one step.
    pub fn parse(declaration: &str) -> Result<Self> {
        Self::from_csig(&CSignature::parse(declaration)?)
    }
}

/// A host-side value crossing the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(c_int),
    UInt(c_uint),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Pointer(*mut c_void),
    /// Host bytes, passed as a pointer to a temporary copy.
    Bytes(Vec<u8>),
    /// Host string, passed as a pointer to a temporary NUL-terminated copy.
    Str(String),
}

// A `Value::Pointer` is an address the caller vouches for; the bridge never
// dereferences it.
unsafe impl Send for Value {}
unsafe impl Sync for Value {}

/// Numeric view of a scalar used as the pivot for coercions.
enum Num {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Value {
    /// The native type this value is passed as, or `None` for host-only
    /// values that need marshalling first.
    pub fn native_type(&self) -> Option<NativeType> {
        Some(match self {
            Value::Void => NativeType::Void,
            Value::Bool(_) => NativeType::Bool,
            Value::Int(_) => NativeType::Int,
            Value::UInt(_) => NativeType::UInt,
            Value::I8(_) => NativeType::I8,
            Value::I16(_) => NativeType::I16,
            Value::I32(_) => NativeType::I32,
            Value::I64(_) => NativeType::I64,
            Value::U8(_) => NativeType::U8,
            Value::U16(_) => NativeType::U16,
            Value::U32(_) => NativeType::U32,
            Value::U64(_) => NativeType::U64,
            Value::F32(_) => NativeType::F32,
            Value::F64(_) => NativeType::F64,
            Value::Pointer(_) => NativeType::Pointer,
            Value::Bytes(_) | Value::Str(_) => return None,
        })
    }

    fn num(&self) -> Option<Num> {
        Some(match *self {
            Value::Bool(b) => Num::Unsigned(b as u64),
            Value::Int(v) => Num::Signed(v as i64),
            Value::UInt(v) => Num::Unsigned(v as u64),
            Value::I8(v) => Num::Signed(v as i64),
            Value::I16(v) => Num::Signed(v as i64),
            Value::I32(v) => Num::Signed(v as i64),
            Value::I64(v) => Num::Signed(v),
            Value::U8(v) => Num::Unsigned(v as u64),
            Value::U16(v) => Num::Unsigned(v as u64),
            Value::U32(v) => Num::Unsigned(v as u64),
            Value::U64(v) => Num::Unsigned(v),
            Value::F32(v) => Num::Float(v as f64),
            Value::F64(v) => Num::Float(v),
            _ => return None,
        })
    }

    /// Convert this value to `ty` the way a C cast would: integers wrap or
    /// truncate, floats round, any nonzero number is `true`.
    ///
    /// `Bytes` and `Str` only coerce to [`NativeType::Pointer`] and stay
    /// host-side until the call marshals them.
    pub fn coerce(&self, ty: NativeType) -> Result<Value> {
        if self.native_type() == Some(ty) {
            return Ok(self.clone());
        }
        match (self, ty) {
            (Value::Bytes(_) | Value::Str(_), NativeType::Pointer) => return Ok(self.clone()),
            (_, NativeType::Void) | (Value::Void, _) => {
                return Err(BridgeError::marshal(format!("cannot convert {self} to {ty}")))
            }
            (Value::Pointer(p), t) if t.is_integer() => {
                return Ok(from_num(Num::Unsigned(*p as usize as u64), t))
            }
            _ => {}
        }
        match (self.num(), ty) {
            (Some(Num::Unsigned(v)), NativeType::Pointer) => {
                Ok(Value::Pointer(v as usize as *mut c_void))
            }
            (Some(Num::Signed(v)), NativeType::Pointer) => {
                Ok(Value::Pointer(v as isize as *mut c_void))
            }
            (Some(n), ty) if ty != NativeType::Pointer => Ok(from_num(n, ty)),
            _ => Err(BridgeError::marshal(format!("cannot convert {self} to {ty}"))),
        }
    }

    /// Parse command-line or suite text as a value of `ty`.
    ///
    /// Integers accept decimal or `0x` hex and wrap into the target width;
    /// pointer parameters take the text itself as a C string.
    pub fn parse_as(text: &str, ty: NativeType) -> Result<Value> {
        let text = text.trim();
        let bad = || BridgeError::marshal(format!("cannot parse '{text}' as {ty}"));
        match ty {
            NativeType::Void => Err(bad()),
            NativeType::Pointer => Ok(Value::Str(text.to_string())),
            NativeType::Bool => match text {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(bad()),
            },
            NativeType::F32 | NativeType::F64 => {
                let v: f64 = match text.to_ascii_lowercase().as_str() {
                    "nan" => f64::NAN,
                    "inf" | "+inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    other => other.parse().map_err(|_| bad())?,
                };
                Ok(from_num(Num::Float(v), ty))
            }
            _ => {
                let (negative, digits) = match text.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, text.strip_prefix('+').unwrap_or(text)),
                };
                let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => digits.parse::<u64>(),
                }
                .map_err(|_| bad())?;
                let n = if negative {
                    Num::Signed((magnitude as i64).wrapping_neg())
                } else {
                    Num::Unsigned(magnitude)
                };
                Ok(from_num(n, ty))
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.num()? {
            Num::Signed(v) => Some(v as f64),
            Num::Unsigned(v) => Some(v as f64),
            Num::Float(v) => Some(v),
        }
    }
}

fn from_num(n: Num, ty: NativeType) -> Value {
    macro_rules! cast {
        ($t:ty) => {
            match n {
                Num::Signed(v) => v as $t,
                Num::Unsigned(v) => v as $t,
                Num::Float(v) => v as $t,
            }
        };
    }
    match ty {
        NativeType::Bool => Value::Bool(match n {
            Num::Signed(v) => v != 0,
            Num::Unsigned(v) => v != 0,
            Num::Float(v) => v != 0.0,
        }),
        NativeType::Int => Value::Int(cast!(c_int)),
        NativeType::UInt => Value::UInt(cast!(c_uint)),
        NativeType::I8 => Value::I8(cast!(i8)),
        NativeType::I16 => Value::I16(cast!(i16)),
        NativeType::I32 => Value::I32(cast!(i32)),
        NativeType::I64 => Value::I64(cast!(i64)),
        NativeType::U8 => Value::U8(cast!(u8)),
        NativeType::U16 => Value::U16(cast!(u16)),
        NativeType::U32 => Value::U32(cast!(u32)),
        NativeType::U64 => Value::U64(cast!(u64)),
        NativeType::F32 => Value::F32(cast!(f32)),
        NativeType::F64 => Value::F64(cast!(f64)),
        NativeType::Pointer => Value::Pointer(cast!(usize) as *mut c_void),
        NativeType::Void => Value::Void,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Pointer(p) => write!(f, "{p:p}"),
            Value::Bytes(b) => write!(f, "{}", b.escape_ascii()),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! scalar_conversions {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }

            impl TryFrom<Value> for $t {
                type Error = BridgeError;

                fn try_from(v: Value) -> Result<Self> {
                    match v {
                        Value::$variant(x) => Ok(x),
                        other => Err(BridgeError::marshal(format!(
                            "expected {} result, got {other:?}",
                            stringify!($variant)
                        ))),
                    }
                }
            }
        )*
    };
}

// `c_int`/`c_uint` alias `i32`/`u32`, so native `int` values are built with
// `Value::Int` / `Value::UInt` directly.
scalar_conversions! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}
