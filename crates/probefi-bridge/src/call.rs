//! Invocation engine.
//!
//! Calls a C-ABI code pointer with lowered scalar arguments. The concrete
//! `unsafe extern "C" fn(A, B, C) -> R` type is picked by nested dispatch:
//! each argument's runtime type selects a generic instantiation, and the
//! innermost step matches on the return type. The compiler therefore emits
//! an ordinary typed call for every combination, with the platform's exact
//! rules for register class, sign and zero extension.

use std::ffi::c_void;
use std::mem::{size_of, transmute_copy};
use std::os::raw::{c_int, c_uint};

use crate::error::{BridgeError, Result};
use crate::marshal::{NativeType, Value, MAX_ARITY};

/// Address of a C-ABI function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePtr(*const c_void);

// A code address is immutable for as long as its library stays loaded,
// which borrowers of the library guarantee.
unsafe impl Send for CodePtr {}
unsafe impl Sync for CodePtr {}

impl CodePtr {
    /// Wrap a raw function address. Returns `None` for null.
    pub fn new(ptr: *const c_void) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(CodePtr(ptr))
        }
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0
    }

    /// Reinterpret as a typed function pointer.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type matching the
    /// function at this address.
    unsafe fn as_fn<F: Copy>(self) -> F {
        debug_assert_eq!(size_of::<F>(), size_of::<*const c_void>());
        transmute_copy::<*const c_void, F>(&self.0)
    }
}

/// Bind the payload of a lowered scalar `Value` to `$x` and evaluate `$body`
/// with it; each arm instantiates `$body` at a different type.
macro_rules! with_arg {
    ($value:expr, $x:ident => $body:expr) => {
        match *$value {
            Value::Bool($x) => $body,
            Value::Int($x) => $body,
            Value::UInt($x) => $body,
            Value::I8($x) => $body,
            Value::I16($x) => $body,
            Value::I32($x) => $body,
            Value::I64($x) => $body,
            Value::U8($x) => $body,
            Value::U16($x) => $body,
            Value::U32($x) => $body,
            Value::U64($x) => $body,
            Value::F32($x) => $body,
            Value::F64($x) => $body,
            Value::Pointer($x) => $body,
            ref other => {
                return Err(BridgeError::marshal(format!(
                    "argument {other} is not a lowered scalar"
                )))
            }
        }
    };
}

/// Call through `$code` as `fn($($t),*) -> <ret>` and wrap the result.
macro_rules! call_returning {
    ($code:expr, $ret:expr; $($a:ident : $t:ty),*) => {
        match $ret {
            NativeType::Void => {
                let f: unsafe extern "C" fn($($t),*) = $code.as_fn();
                f($($a),*);
                Value::Void
            }
            NativeType::Bool => Value::Bool($code.as_fn::<unsafe extern "C" fn($($t),*) -> bool>()($($a),*)),
            NativeType::Int => Value::Int($code.as_fn::<unsafe extern "C" fn($($t),*) -> c_int>()($($a),*)),
            NativeType::UInt => Value::UInt($code.as_fn::<unsafe extern "C" fn($($t),*) -> c_uint>()($($a),*)),
            NativeType::I8 => Value::I8($code.as_fn::<unsafe extern "C" fn($($t),*) -> i8>()($($a),*)),
            NativeType::I16 => Value::I16($code.as_fn::<unsafe extern "C" fn($($t),*) -> i16>()($($a),*)),
            NativeType::I32 => Value::I32($code.as_fn::<unsafe extern "C" fn($($t),*) -> i32>()($($a),*)),
            NativeType::I64 => Value::I64($code.as_fn::<unsafe extern "C" fn($($t),*) -> i64>()($($a),*)),
            NativeType::U8 => Value::U8($code.as_fn::<unsafe extern "C" fn($($t),*) -> u8>()($($a),*)),
            NativeType::U16 => Value::U16($code.as_fn::<unsafe extern "C" fn($($t),*) -> u16>()($($a),*)),
            NativeType::U32 => Value::U32($code.as_fn::<unsafe extern "C" fn($($t),*) -> u32>()($($a),*)),
            NativeType::U64 => Value::U64($code.as_fn::<unsafe extern "C" fn($($t),*) -> u64>()($($a),*)),
            NativeType::F32 => Value::F32($code.as_fn::<unsafe extern "C" fn($($t),*) -> f32>()($($a),*)),
            NativeType::F64 => Value::F64($code.as_fn::<unsafe extern "C" fn($($t),*) -> f64>()($($a),*)),
            NativeType::Pointer => Value::Pointer($code.as_fn::<unsafe extern "C" fn($($t),*) -> *mut c_void>()($($a),*)),
        }
    };
}

/// Call `code` with `args`, returning a value of type `ret`.
///
/// Arguments must already be coerced to the callee's parameter types; host
/// values (`Bytes`, `Str`) must already be lowered to `Pointer`.
///
/// # Safety
///
/// `code` must point to a function whose C signature is exactly
/// `ret (typeof args[0], ...)`, and every pointer argument must satisfy
/// that function's preconditions.
pub unsafe fn invoke(code: CodePtr, ret: NativeType, args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(call0(code, ret)),
        [a] => with_arg!(a, x => Ok(call1(code, ret, x))),
        [a, b] => with_arg!(a, x => stage2(code, ret, x, b)),
        [a, b, c] => with_arg!(a, x => stage3(code, ret, x, b, c)),
        _ => Err(BridgeError::marshal(format!(
            "{} arguments exceed the maximum of {MAX_ARITY}",
            args.len()
        ))),
    }
}

unsafe fn call0(code: CodePtr, ret: NativeType) -> Value {
    call_returning!(code, ret;)
}

unsafe fn call1<A: Copy>(code: CodePtr, ret: NativeType, a: A) -> Value {
    call_returning!(code, ret; a: A)
}

unsafe fn call2<A: Copy, B: Copy>(code: CodePtr, ret: NativeType, a: A, b: B) -> Value {
    call_returning!(code, ret; a: A, b: B)
}

unsafe fn call3<A: Copy, B: Copy, C: Copy>(code: CodePtr, ret: NativeType, a: A, b: B, c: C) -> Value {
    call_returning!(code, ret; a: A, b: B, c: C)
}

unsafe fn stage2<A: Copy>(code: CodePtr, ret: NativeType, a: A, b: &Value) -> Result<Value> {
    with_arg!(b, y => Ok(call2(code, ret, a, y)))
}

unsafe fn stage3<A: Copy>(code: CodePtr, ret: NativeType, a: A, b: &Value, c: &Value) -> Result<Value> {
    with_arg!(b, y => stage3_last(code, ret, a, y, c))
}

unsafe fn stage3_last<A: Copy, B: Copy>(
    code: CodePtr,
    ret: NativeType,
    a: A,
    b: B,
    c: &Value,
) -> Result<Value> {
    with_arg!(c, z => Ok(call3(code, ret, a, b, z)))
}
