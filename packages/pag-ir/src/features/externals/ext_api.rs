//! External-call effect table
//!
//! Library calls are modelled by a fixed set of effect kinds; each emits a
//! synthetic edge pattern that soundly over-approximates the callee's pointer
//! behavior. Unknown external functions classify as `Unknown` and flow through
//! the blackhole, the soundness escape hatch.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Side-effect summary of an external function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtEffect {
    /// Return value points to a fresh heap object
    Alloc,
    /// Result aliases the first argument (realloc family)
    Realloc,
    /// No pointer effect at all
    NoEffect,
    /// Flattened per-field copy from arg1 into arg0, capped by arg2
    Memcpy,
    /// Store the value operand into every field of the destination
    Memset,
    /// Result aliases argument `k`
    RetArg(usize),
    /// Nothing is known; absorb through the blackhole
    Unknown,
}

static EXT_TABLE: Lazy<FxHashMap<&'static str, ExtEffect>> = Lazy::new(|| {
    use ExtEffect::*;
    let entries: &[(&str, ExtEffect)] = &[
        // Heap allocation
        ("malloc", Alloc),
        ("calloc", Alloc),
        ("valloc", Alloc),
        ("aligned_alloc", Alloc),
        ("memalign", Alloc),
        ("strdup", Alloc),
        ("strndup", Alloc),
        ("getenv", Alloc),
        ("_Znwm", Alloc),  // operator new(unsigned long)
        ("_Znam", Alloc),  // operator new[](unsigned long)
        ("_Znwj", Alloc),
        ("_Znaj", Alloc),
        // Resize: result aliases the incoming buffer
        ("realloc", Realloc),
        ("reallocf", Realloc),
        // Field-wise copies
        ("memcpy", Memcpy),
        ("memmove", Memcpy),
        ("strcpy", Memcpy),
        ("strncpy", Memcpy),
        ("strcat", Memcpy),
        ("strncat", Memcpy),
        // Field-wise fill
        ("memset", Memset),
        ("bzero", Memset),
        // Result points into an argument
        ("strchr", RetArg(0)),
        ("strrchr", RetArg(0)),
        ("strstr", RetArg(0)),
        ("strtok", RetArg(0)),
        ("index", RetArg(0)),
        ("rindex", RetArg(0)),
        ("gets", RetArg(0)),
        ("fgets", RetArg(0)),
        // Pointer-free libc surface
        ("free", NoEffect),
        ("_ZdlPv", NoEffect), // operator delete
        ("_ZdaPv", NoEffect),
        ("printf", NoEffect),
        ("fprintf", NoEffect),
        ("sprintf", NoEffect),
        ("snprintf", NoEffect),
        ("puts", NoEffect),
        ("putchar", NoEffect),
        ("strlen", NoEffect),
        ("strcmp", NoEffect),
        ("strncmp", NoEffect),
        ("memcmp", NoEffect),
        ("atoi", NoEffect),
        ("atol", NoEffect),
        ("exit", NoEffect),
        ("abort", NoEffect),
        ("abs", NoEffect),
        ("fclose", NoEffect),
        ("fflush", NoEffect),
        ("close", NoEffect),
        ("write", NoEffect),
        ("read", NoEffect),
    ];
    entries.iter().copied().collect()
});

/// Classifier from callee symbol to effect kind
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtApi;

impl ExtApi {
    pub fn new() -> Self {
        Self
    }

    /// Classify a callee symbol. `None` means the name is not in the table;
    /// for a declared-only callee the builder treats that as `Unknown`.
    pub fn classify(&self, name: &str) -> Option<ExtEffect> {
        if let Some(effect) = EXT_TABLE.get(name) {
            return Some(*effect);
        }
        // Compiler-synthesized intrinsics carry a type suffix
        if name.starts_with("llvm.memcpy") || name.starts_with("llvm.memmove") {
            return Some(ExtEffect::Memcpy);
        }
        if name.starts_with("llvm.memset") {
            return Some(ExtEffect::Memset);
        }
        if name.starts_with("llvm.dbg") || name.starts_with("llvm.lifetime") {
            return Some(ExtEffect::NoEffect);
        }
        None
    }

    /// True if the name allocates a fresh heap object
    #[inline]
    pub fn is_alloc(&self, name: &str) -> bool {
        matches!(self.classify(name), Some(ExtEffect::Alloc))
    }
}
