//! Program graph handed over by the compiler
//!
//! Declarations live in flat arenas and are addressed by small integer handles,
//! so the reporting code never relies on object identity. The call graph is a
//! petgraph directed graph over method handles.

mod builder;
mod range;
mod source_info;

use anyhow::{Result, anyhow};
pub use builder::ProgramBuilder;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};
pub use range::Range;
pub use source_info::{Axis, Correlation, Mutation, Origin, SourceInfo, SourceInfoId};

macro_rules! decl_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            /// Returns the underlying u32 value
            #[inline]
            pub const fn as_u32(&self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

decl_id!(
    /// Handle to a class or interface declaration
    TypeId
);
decl_id!(
    /// Handle to a method declaration
    MethodId
);
decl_id!(
    /// Handle to a field declaration
    FieldId
);

/// A class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// Fully qualified name, e.g. `com.example.Foo`
    pub name: String,
    pub superclass: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub js_name: Option<String>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            js_name: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, superclass: TypeId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn with_js_name(mut self, js_name: impl Into<String>) -> Self {
        self.js_name = Some(js_name.into());
        self
    }
}

/// A method, or a synthetic global function when it has no enclosing type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub enclosing_type: Option<TypeId>,
    /// Signature names of the parameters before any optimization, e.g. `I`
    pub original_param_types: Vec<String>,
    /// Signature name of the return type before any optimization, e.g. `V`
    pub original_return_type: String,
    /// Methods this one directly overrides
    pub overrides: Vec<MethodId>,
    pub js_name: Option<String>,
    pub js_aliases: Vec<String>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, enclosing_type: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            enclosing_type,
            original_param_types: Vec::new(),
            original_return_type: "V".to_owned(),
            overrides: Vec::new(),
            js_name: None,
            js_aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.original_param_types = params.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.original_return_type = return_type.into();
        self
    }

    #[must_use]
    pub fn overriding(mut self, method: MethodId) -> Self {
        self.overrides.push(method);
        self
    }

    #[must_use]
    pub fn with_js_name(mut self, js_name: impl Into<String>) -> Self {
        self.js_name = Some(js_name.into());
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.js_aliases.push(alias.into());
        self
    }
}

/// A field of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub enclosing_type: TypeId,
    pub js_name: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, enclosing_type: TypeId) -> Self {
        Self {
            name: name.into(),
            enclosing_type,
            js_name: None,
        }
    }

    #[must_use]
    pub fn with_js_name(mut self, js_name: impl Into<String>) -> Self {
        self.js_name = Some(js_name.into());
        self
    }
}

/// A code-splitting point, identified by its number and a source description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPoint {
    pub id: u32,
    pub location: String,
    /// Methods first reached when this split point loads
    pub entry_methods: Vec<MethodId>,
}

/// The compiled program as seen by the report writers
#[derive(Debug)]
pub struct Program {
    types: Vec<TypeDecl>,
    methods: Vec<MethodDecl>,
    fields: Vec<FieldDecl>,
    source_infos: Vec<SourceInfo>,
    entry_methods: Vec<MethodId>,
    split_points: Vec<SplitPoint>,
    initial_load_sequence: Vec<u32>,
    /// Call/reference graph; node weights are the calling method handles
    call_graph: DiGraph<MethodId, ()>,
    /// Node of each method in `call_graph`, indexed by `MethodId`
    method_nodes: Vec<NodeIndex>,
}

impl Program {
    pub fn type_decl(&self, id: TypeId) -> Result<&TypeDecl> {
        self.types
            .get(id.index())
            .ok_or_else(|| anyhow!("Type {:?} is not declared in this program", id))
    }

    pub fn method_decl(&self, id: MethodId) -> Result<&MethodDecl> {
        self.methods
            .get(id.index())
            .ok_or_else(|| anyhow!("Method {:?} is not declared in this program", id))
    }

    pub fn field_decl(&self, id: FieldId) -> Result<&FieldDecl> {
        self.fields
            .get(id.index())
            .ok_or_else(|| anyhow!("Field {:?} is not declared in this program", id))
    }

    pub fn source_info(&self, id: SourceInfoId) -> Result<&SourceInfo> {
        self.source_infos
            .get(id.index())
            .ok_or_else(|| anyhow!("Source info {:?} is not registered in this program", id))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Entry methods in the order the compiler supplied them
    pub fn entry_methods(&self) -> &[MethodId] {
        &self.entry_methods
    }

    pub fn split_points(&self) -> &[SplitPoint] {
        &self.split_points
    }

    pub fn initial_load_sequence(&self) -> &[u32] {
        &self.initial_load_sequence
    }

    /// Methods called from `method`, in the order the calls were declared
    pub fn callees(&self, method: MethodId) -> Vec<MethodId> {
        let Some(&node) = self.method_nodes.get(method.index()) else {
            return Vec::new();
        };
        // petgraph lists neighbors most recently added first
        let mut callees: Vec<MethodId> = self
            .call_graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|callee| self.call_graph[callee])
            .collect();
        callees.reverse();
        callees
    }

    /// `Type::name`, or just `name` for a method without an enclosing type
    pub fn readable_method_name(&self, method: MethodId) -> Result<String> {
        let decl = self.method_decl(method)?;
        match decl.enclosing_type {
            Some(ty) => Ok(format!("{}::{}", self.type_decl(ty)?.name, decl.name)),
            None => Ok(decl.name.clone()),
        }
    }

    /// `Type::name(params)return` using the original, pre-optimization signature
    pub fn method_signature(&self, method: MethodId) -> Result<String> {
        let decl = self.method_decl(method)?;
        let mut signature = self.readable_method_name(method)?;
        signature.push('(');
        for param in &decl.original_param_types {
            signature.push_str(param);
        }
        signature.push(')');
        signature.push_str(&decl.original_return_type);
        Ok(signature)
    }
}
