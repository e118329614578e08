//! Emitted JavaScript and the per-fragment metadata produced alongside it

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::program::{MethodId, Range, SourceInfoId, TypeId};

/// An identifier in the emitted JavaScript
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsName {
    /// Unique identifier used to look the name up
    pub ident: String,
    /// The (possibly obfuscated) identifier that appears in the output
    pub short_ident: String,
}

impl JsName {
    pub fn new(ident: impl Into<String>, short_ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            short_ident: short_ident.into(),
        }
    }
}

/// Size of a fragment broken down by the names that account for it
#[derive(Debug, Clone, Default)]
pub struct SizeBreakdown {
    /// Total size of the fragment in bytes
    pub size: usize,
    /// Bytes attributed to each emitted name, in code generator order
    pub sizes: IndexMap<JsName, usize>,
}

/// What an emitted name stands for in the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTarget {
    Method(MethodId),
    Type(TypeId),
}

/// Resolves emitted names back to the program
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    targets: FxHashMap<String, NameTarget>,
    string_literals: FxHashMap<String, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_method(&mut self, ident: impl Into<String>, method: MethodId) {
        self.targets.insert(ident.into(), NameTarget::Method(method));
    }

    pub fn map_type(&mut self, ident: impl Into<String>, ty: TypeId) {
        self.targets.insert(ident.into(), NameTarget::Type(ty));
    }

    /// Record that `ident` is a variable holding an interned string literal
    pub fn map_string_literal(&mut self, ident: impl Into<String>, value: impl Into<String>) {
        self.string_literals.insert(ident.into(), value.into());
    }

    pub fn target(&self, name: &JsName) -> Option<NameTarget> {
        self.targets.get(&name.ident).copied()
    }

    pub fn string_literal(&self, name: &JsName) -> Option<&str> {
        self.string_literals.get(&name.ident).map(String::as_str)
    }
}

/// One chunk of emitted output
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub js: String,
    /// Ranges of `js` and the provenance of each; ranges may nest and repeat
    pub ranges: Vec<(Range, SourceInfoId)>,
    pub sizes: SizeBreakdown,
}

/// Everything the code generator produced for one permutation
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub fragments: Vec<Fragment>,
    pub names: NameIndex,
}
