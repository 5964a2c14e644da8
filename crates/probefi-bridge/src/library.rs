//! Shared library loading and symbol resolution.
//!
//! A [`Library`] wraps a `dlopen` handle with two caches: resolved symbol
//! addresses and lowered signatures. Both are guarded by a mutex, so one
//! library can be imported from and called into from many threads.
//! [`SymbolTable`] resolves names to code already linked into the process.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::call::CodePtr;
use crate::error::{BridgeError, Result};
use crate::function::ForeignFunction;
use crate::marshal::NativeSignature;

/// Symbol binding and visibility flags for `dlopen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindMode(u8);

impl BindMode {
    /// Resolve symbols on first call.
    pub const LAZY: BindMode = BindMode(0b0001);
    /// Resolve every symbol at load time.
    pub const NOW: BindMode = BindMode(0b0010);
    /// Keep symbols out of the global namespace.
    pub const LOCAL: BindMode = BindMode(0b0100);
    /// Make symbols available to subsequently loaded libraries.
    pub const GLOBAL: BindMode = BindMode(0b1000);

    /// `NOW` wins when both binding flags are set; neither means lazy.
    pub fn is_now(self) -> bool {
        self.0 & Self::NOW.0 != 0
    }

    pub fn is_global(self) -> bool {
        self.0 & Self::GLOBAL.0 != 0
    }

    #[cfg(unix)]
    fn dlopen_flags(self) -> std::os::raw::c_int {
        use libloading::os::unix::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};
        let binding = if self.is_now() { RTLD_NOW } else { RTLD_LAZY };
        let visibility = if self.is_global() { RTLD_GLOBAL } else { RTLD_LOCAL };
        binding | visibility
    }
}

impl Default for BindMode {
    fn default() -> Self {
        BindMode::NOW | BindMode::LOCAL
    }
}

impl BitOr for BindMode {
    type Output = BindMode;

    fn bitor(self, rhs: BindMode) -> BindMode {
        BindMode(self.0 | rhs.0)
    }
}

impl fmt::Display for BindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = if self.is_now() { "now" } else { "lazy" };
        let visibility = if self.is_global() { "global" } else { "local" };
        write!(f, "{binding}|{visibility}")
    }
}

/// Anything that can resolve a symbol name to a C-ABI code address.
///
/// Imports are provided on top of [`resolve`](SymbolSource::resolve), so a
/// loaded [`Library`] and an in-process [`SymbolTable`] are used the same way.
pub trait SymbolSource {
    /// Name of the source, used in diagnostics.
    fn label(&self) -> &str;

    /// Look up the address of `symbol`.
    fn resolve(&self, symbol: &str) -> Result<CodePtr>;

    /// Parse and lower a C declaration. Sources may cache the result.
    fn lower(&self, declaration: &str) -> Result<Arc<NativeSignature>> {
        Ok(Arc::new(NativeSignature::parse(declaration)?))
    }

    /// Bind the function named by `declaration`.
    ///
    /// # Safety
    ///
    /// The declaration must match the definition of the symbol it names.
    /// Calling through a mismatched signature is undefined behavior.
    unsafe fn import(&self, declaration: &str) -> Result<ForeignFunction<'_>> {
        let signature = self.lower(declaration)?;
        let code = self.resolve(&signature.name)?;
        Ok(ForeignFunction::from_raw(signature, code))
    }

    /// Bind `symbol` using a declaration that may carry a different name.
    ///
    /// # Safety
    ///
    /// As for [`import`](SymbolSource::import), with the declaration
    /// matching the definition of `symbol`.
    unsafe fn import_as(&self, symbol: &str, declaration: &str) -> Result<ForeignFunction<'_>> {
        let signature = self.lower(declaration)?;
        let code = self.resolve(symbol)?;
        Ok(ForeignFunction::from_raw(signature, code))
    }
}

/// A dynamically loaded shared object.
pub struct Library {
    inner: libloading::Library,
    path: PathBuf,
    mode: BindMode,
    symbols: Mutex<HashMap<String, CodePtr>>,
    signatures: Mutex<HashMap<String, Arc<NativeSignature>>>,
}

impl Library {
    /// Load a library by path or by name.
    ///
    /// A name containing a path separator is opened as given. Anything else
    /// is searched for in the library path and the system directories, as
    /// `name`, `libname.so` and `libname.so.<version>`.
    pub fn open(name: &str, mode: BindMode) -> Result<Self> {
        let path = if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            PathBuf::from(name)
        } else {
            find_library(name).ok_or_else(|| BridgeError::LibraryNotFound {
                name: name.to_string(),
            })?
        };
        debug!(name, path = %path.display(), %mode, "opening library");
        let inner = load(&path, mode).map_err(|source| BridgeError::LibraryLoad {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "library loaded");
        Ok(Library {
            inner,
            path,
            mode,
            symbols: Mutex::new(HashMap::new()),
            signatures: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> BindMode {
        self.mode
    }

    /// Resolve `name`, consulting the cache first.
    pub fn symbol(&self, name: &str) -> Result<CodePtr> {
        let mut symbols = self.symbols.lock();
        if let Some(code) = symbols.get(name) {
            trace!(symbol = name, "symbol cache hit");
            return Ok(*code);
        }
        let not_found = || BridgeError::SymbolNotFound {
            name: name.to_string(),
            library: self.path.display().to_string(),
        };
        let address = unsafe {
            self.inner
                .get::<unsafe extern "C" fn()>(name.as_bytes())
                .map(|sym| *sym as *const c_void)
                .map_err(|_| not_found())?
        };
        let code = CodePtr::new(address).ok_or_else(not_found)?;
        debug!(symbol = name, address = ?code.as_ptr(), "resolved symbol");
        symbols.insert(name.to_string(), code);
        Ok(code)
    }

    /// Unload the library. Dropping it has the same effect, minus the
    /// error report.
    pub fn close(self) -> Result<()> {
        debug!(path = %self.path.display(), "closing library");
        let path = self.path;
        self.inner
            .close()
            .map_err(|source| BridgeError::LibraryClose { path, source })
    }
}

impl SymbolSource for Library {
    fn label(&self) -> &str {
        self.path.to_str().unwrap_or("<non-utf8 path>")
    }

    fn resolve(&self, symbol: &str) -> Result<CodePtr> {
        self.symbol(symbol)
    }

    fn lower(&self, declaration: &str) -> Result<Arc<NativeSignature>> {
        let key = declaration.trim();
        let mut signatures = self.signatures.lock();
        if let Some(sig) = signatures.get(key) {
            return Ok(Arc::clone(sig));
        }
        let sig = Arc::new(NativeSignature::parse(key)?);
        signatures.insert(key.to_string(), Arc::clone(&sig));
        Ok(sig)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("cached_symbols", &self.symbols.lock().len())
            .finish()
    }
}

#[cfg(unix)]
fn load(path: &Path, mode: BindMode) -> std::result::Result<libloading::Library, libloading::Error> {
    unsafe { libloading::os::unix::Library::open(Some(path), mode.dlopen_flags()).map(Into::into) }
}

#[cfg(not(unix))]
fn load(path: &Path, _mode: BindMode) -> std::result::Result<libloading::Library, libloading::Error> {
    unsafe { libloading::Library::new(path) }
}

/// Code linked into the current process, addressed by name.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    label: String,
    entries: HashMap<String, CodePtr>,
}

impl SymbolTable {
    pub fn new(label: impl Into<String>) -> Self {
        SymbolTable {
            label: label.into(),
            entries: HashMap::new(),
        }
    }

    /// Register `address` under `name`. Null addresses are ignored.
    pub fn insert(&mut self, name: impl Into<String>, address: *const c_void) {
        if let Some(code) = CodePtr::new(address) {
            self.entries.insert(name.into(), code);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SymbolSource for SymbolTable {
    fn label(&self) -> &str {
        &self.label
    }

    fn resolve(&self, symbol: &str) -> Result<CodePtr> {
        self.entries
            .get(symbol)
            .copied()
            .ok_or_else(|| BridgeError::SymbolNotFound {
                name: symbol.to_string(),
                library: self.label.clone(),
            })
    }
}

/// Directories searched for libraries given by name.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for var in ["LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH"] {
        if let Some(value) = std::env::var_os(var) {
            dirs.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
    }
    let multiarch = format!("{}-linux-gnu", std::env::consts::ARCH);
    for base in ["/lib", "/usr/lib", "/usr/local/lib"] {
        dirs.push(Path::new(base).join(&multiarch));
        dirs.push(PathBuf::from(base));
        dirs.push(PathBuf::from(format!("{base}64")));
    }
    dirs.retain(|d| d.is_dir());
    dirs.dedup();
    dirs
}

/// Find a shared object named `name` without loading it.
pub fn find_library(name: &str) -> Option<PathBuf> {
    let dirs = search_dirs();
    let found = find_in(name, &dirs);
    match &found {
        Some(path) => debug!(name, path = %path.display(), "library resolved"),
        None => debug!(name, searched = dirs.len(), "library not found"),
    }
    found
}

fn find_in(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let prefix = std::env::consts::DLL_PREFIX;
    let suffix = std::env::consts::DLL_SUFFIX;
    let mut stems = vec![name.to_string()];
    if !name.starts_with(prefix) {
        stems.insert(0, format!("{prefix}{name}"));
    }
    for dir in dirs {
        for stem in &stems {
            if stem.contains(suffix) && is_shared_object(&dir.join(stem)) {
                return Some(dir.join(stem));
            }
            let unversioned = dir.join(format!("{stem}{suffix}"));
            if is_shared_object(&unversioned) {
                return Some(unversioned);
            }
            if let Some(versioned) = versioned_candidate(dir, &format!("{stem}{suffix}.")) {
                return Some(versioned);
            }
        }
    }
    None
}

/// The lowest-sorting `<stem>.so.<version>` in `dir` that is a real
/// shared object.
fn versioned_candidate(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches.into_iter().find(|p| is_shared_object(p))
}

/// True for files that start with an object-file magic number. Linker
/// scripts such as glibc's `libc.so` are rejected.
fn is_shared_object(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    let read = File::open(path).and_then(|mut f| f.read_exact(&mut magic));
    if read.is_err() {
        return false;
    }
    if cfg!(target_os = "macos") {
        matches!(
            u32::from_le_bytes(magic),
            0xfeed_facf | 0xfeed_face | 0xcafe_babe | 0xbeba_feca
        ) || matches!(u32::from_be_bytes(magic), 0xfeed_facf | 0xfeed_face)
    } else if cfg!(windows) {
        magic.starts_with(b"MZ")
    } else {
        magic == *b"\x7fELF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fake_elf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(b"\x7fELF\x02\x01\x01\0").unwrap();
        path
    }

    #[test]
    fn bind_mode_flags() {
        let mode = BindMode::NOW | BindMode::GLOBAL;
        assert!(mode.is_now());
        assert!(mode.is_global());
        assert!(!BindMode::LAZY.is_now());
        assert!(!BindMode::default().is_global());
        assert!((BindMode::LAZY | BindMode::NOW).is_now());
        assert_eq!(BindMode::default().to_string(), "now|local");
        assert_eq!((BindMode::LAZY | BindMode::GLOBAL).to_string(), "lazy|global");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn search_skips_linker_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libfoo.so"), "GROUP ( libfoo.so.1 )").unwrap();
        let real = fake_elf(dir.path(), "libfoo.so.1");
        let found = find_in("foo", &[dir.path().to_path_buf()]);
        assert_eq!(found, Some(real.clone()));
        assert_eq!(find_in("libfoo", &[dir.path().to_path_buf()]), Some(real));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn search_prefers_unversioned_object() {
        let dir = tempfile::tempdir().unwrap();
        let plain = fake_elf(dir.path(), "libbar.so");
        fake_elf(dir.path(), "libbar.so.2");
        assert_eq!(find_in("bar", &[dir.path().to_path_buf()]), Some(plain));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn search_accepts_full_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_elf(dir.path(), "libbaz.so.7");
        assert_eq!(find_in("libbaz.so.7", &[dir.path().to_path_buf()]), Some(path));
    }

    #[test]
    fn unknown_library_is_not_found() {
        let err = Library::open("123probefi_missing", BindMode::NOW).unwrap_err();
        assert!(matches!(err, BridgeError::LibraryNotFound { .. }));
    }

    #[test]
    fn bad_path_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libnot_really.so");
        std::fs::write(&path, "not an object").unwrap();
        let err = Library::open(path.to_str().unwrap(), BindMode::NOW).unwrap_err();
        assert!(matches!(err, BridgeError::LibraryLoad { .. }));
    }

    extern "C" fn answer() -> i32 {
        42
    }

    #[test]
    fn symbol_table_resolves_registered_names() {
        let mut table = SymbolTable::new("in-process");
        table.insert("answer", answer as *const c_void);
        table.insert("nothing", std::ptr::null());
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("answer").unwrap().as_ptr(), answer as *const c_void);
        let err = table.resolve("missing").unwrap_err();
        assert_eq!(err.to_string(), "symbol 'missing' not found in 'in-process'");
    }

    #[test]
    fn symbol_table_imports() {
        let mut table = SymbolTable::new("in-process");
        table.insert("answer", answer as *const c_void);
        let f = unsafe { table.import("int32_t answer(void)") }.unwrap();
        assert_eq!(f.call(&[]).unwrap(), crate::Value::I32(42));
        let g = unsafe { table.import_as("answer", "int32_t other(void)") }.unwrap();
        assert_eq!(g.name(), "other");
        assert_eq!(g.call(&[]).unwrap(), crate::Value::I32(42));
    }
}
