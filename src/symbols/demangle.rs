/// Demangler demangles GCC/LLVM C++ and Rust symbol names.
///
/// Demangling is the inverse process of mangling (encoding of each unique
/// function and parameter list combination into a unique name for the linker).
/// JIT runtimes writing perf maps sometimes emit the mangled form.
#[derive(Debug, Clone, Default)]
pub struct Demangler {
    keep_hash: bool,
}

impl Demangler {
    /// If keep_hash is set, Rust symbols keep their trailing `::h<hash>`.
    pub fn new(keep_hash: bool) -> Self {
        Self { keep_hash }
    }

    // Returns the human-readable C++ or Rust name. If the symbol is not
    // mangled, or demangling fails, it is returned unchanged.
    pub fn demangle(&self, sys_name: &str) -> String {
        if let Ok(demangled) = rustc_demangle::try_demangle(sys_name) {
            return if self.keep_hash {
                demangled.to_string()
            } else {
                format!("{:#}", demangled)
            };
        }

        if let Ok(symbol) = cpp_demangle::Symbol::new(sys_name) {
            return symbol.to_string();
        }

        sys_name.to_string()
    }
}
