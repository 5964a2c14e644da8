//! Imported foreign functions.

use std::ffi::{c_void, CString};
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_char;
use std::sync::Arc;

use tracing::trace;

use crate::buffer::OwnedBuffer;
use crate::call::{invoke, CodePtr};
use crate::error::{BridgeError, Result};
use crate::marshal::{NativeSignature, NativeType, Value};

/// A function bound to a native signature.
///
/// The lifetime ties the function to the library it was imported from, so
/// it cannot be called after that library is unloaded.
#[derive(Clone)]
pub struct ForeignFunction<'lib> {
    signature: Arc<NativeSignature>,
    code: CodePtr,
    _library: PhantomData<&'lib ()>,
}

/// Host memory that must stay alive while a call is in flight.
enum Lowered {
    CStr(CString),
    Bytes(Vec<u8>),
}

impl<'lib> ForeignFunction<'lib> {
    /// Bind `code` to `signature`.
    ///
    /// # Safety
    ///
    /// `code` must be a function with exactly this signature, and must stay
    /// valid for `'lib`.
    pub unsafe fn from_raw(signature: Arc<NativeSignature>, code: CodePtr) -> Self {
        ForeignFunction {
            signature,
            code,
            _library: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &NativeSignature {
        &self.signature
    }

    pub fn address(&self) -> *const c_void {
        self.code.as_ptr()
    }

    /// Call the function.
    ///
    /// Each argument is converted to its declared parameter type first.
    /// Strings are passed as NUL-terminated copies and byte vectors as
    /// plain copies; both are freed when the call returns. Pointer values
    /// are passed through unchanged and must satisfy the callee.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let sig = &*self.signature;
        if args.len() != sig.params.len() {
            return Err(BridgeError::ArgumentCount {
                function: sig.name.clone(),
                expected: sig.params.len(),
                got: args.len(),
            });
        }

        let mut keep_alive = Vec::new();
        let mut lowered = Vec::with_capacity(args.len());
        for (arg, &ty) in args.iter().zip(&sig.params) {
            let value = match arg.coerce(ty)? {
                Value::Str(s) => {
                    let c = CString::new(s).map_err(|e| {
                        BridgeError::marshal(format!("string argument to '{}': {e}", sig.name))
                    })?;
                    let ptr = c.as_ptr() as *mut c_void;
                    keep_alive.push(Lowered::CStr(c));
                    Value::Pointer(ptr)
                }
                Value::Bytes(b) => {
                    let ptr = b.as_ptr() as *mut c_void;
                    keep_alive.push(Lowered::Bytes(b));
                    Value::Pointer(ptr)
                }
                other => other,
            };
            lowered.push(value);
        }

        trace!(function = %sig.name, args = ?lowered, "calling");
        let result = unsafe { invoke(self.code, sig.ret, &lowered) };
        drop(keep_alive);
        let result = result?;
        trace!(function = %sig.name, result = %result, "returned");
        Ok(result)
    }

    /// Call a pointer-returning function and take ownership of `len` bytes
    /// at the returned address. The block is released when the
    /// [`OwnedBuffer`] is dropped.
    ///
    /// # Safety
    ///
    /// A non-null result must be a block from the C allocator that the
    /// caller now owns, at least `len` bytes long.
    pub unsafe fn call_buffer(&self, args: &[Value], len: usize) -> Result<OwnedBuffer> {
        if self.signature.ret != NativeType::Pointer {
            return Err(BridgeError::marshal(format!(
                "'{}' returns {}, not a pointer",
                self.signature.name, self.signature.ret
            )));
        }
        let ptr = match self.call(args)? {
            Value::Pointer(p) => p,
            other => {
                return Err(BridgeError::marshal(format!(
                    "'{}' returned {other:?} for a pointer",
                    self.signature.name
                )))
            }
        };
        OwnedBuffer::from_raw(ptr, len).ok_or_else(|| BridgeError::NullReturn {
            function: self.signature.name.clone(),
        })
    }

    /// Call a function returning `char*` and read it as a C string. The
    /// string is released with `free` afterwards.
    ///
    /// # Safety
    ///
    /// A non-null result must be a NUL-terminated string allocated by the
    /// C allocator, owned by the caller from then on. Calling it requires
    /// an `unsafe` block:
    ///
    /// ```compile_fail
    /// use probefi_bridge::{SymbolSource, SymbolTable};
    ///
    /// fn name(table: &SymbolTable) -> probefi_bridge::Result<String> {
    ///     let f = unsafe { table.import("char* name(void)")? };
    ///     f.call_string(&[])
    /// }
    /// ```
    pub unsafe fn call_string(&self, args: &[Value]) -> Result<String> {
        let ptr = match self.call(args)? {
            Value::Pointer(p) if !p.is_null() => p as *mut c_char,
            Value::Pointer(_) => {
                return Err(BridgeError::NullReturn {
                    function: self.signature.name.clone(),
                })
            }
            other => {
                return Err(BridgeError::marshal(format!(
                    "'{}' returned {other:?} for a string",
                    self.signature.name
                )))
            }
        };
        let len = libc::strlen(ptr);
        let owned = OwnedBuffer::from_raw(ptr as *mut c_void, len).ok_or_else(|| {
            BridgeError::NullReturn {
                function: self.signature.name.clone(),
            }
        })?;
        Ok(String::from_utf8_lossy(owned.as_bytes()).into_owned())
    }
}

impl fmt::Debug for ForeignFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignFunction")
            .field("name", &self.signature.name)
            .field("ret", &self.signature.ret)
            .field("params", &self.signature.params)
            .field("address", &self.code.as_ptr())
            .finish()
    }
}
