//! Signature-driven foreign function bridge.
//!
//! Loads shared libraries, binds their functions from C declarations and
//! calls them with host values, converting arguments and results at the
//! boundary. Oracle suites run known-answer calls through the bridge to
//! check it against a library whose behavior is fixed.
//!
//! ## Modules
//!
//! - [`csig`]: C function signature parser
//! - [`marshal`]: native types, call signatures and host values
//! - [`call`]: typed invocation of C-ABI code pointers
//! - [`library`]: library search, loading and symbol caches
//! - [`function`]: imported functions and argument lowering
//! - [`buffer`]: caller-owned memory returned by foreign code
//! - [`declaration`]: oracle suite file parsing
//! - [`oracle`]: running suites and reporting results

pub mod buffer;
pub mod call;
pub mod csig;
pub mod declaration;
pub mod error;
pub mod function;
pub mod library;
pub mod marshal;
pub mod oracle;

// Re-export key types for convenience
pub use buffer::OwnedBuffer;
pub use call::CodePtr;
pub use csig::{CSignature, CType};
pub use declaration::{ProbeCase, ProbeSuite};
pub use error::{BridgeError, Result};
pub use function::ForeignFunction;
pub use library::{BindMode, Library, SymbolSource, SymbolTable};
pub use marshal::{NativeSignature, NativeType, Value, MAX_ARITY};
pub use oracle::{run_suite, CaseOutcome, SuiteReport};
