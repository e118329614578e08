use anyhow::{Result, bail};
use log::debug;
use petgraph::graph::DiGraph;

use super::{
    Correlation, FieldDecl, FieldId, MethodDecl, MethodId, Program, SourceInfo, SourceInfoId,
    SplitPoint, TypeDecl, TypeId,
};

/// Incrementally assembles a [`Program`]
///
/// Handles are handed out as declarations are added; `build` checks that every
/// handle referenced anywhere points at a declaration of this builder.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    types: Vec<TypeDecl>,
    methods: Vec<MethodDecl>,
    fields: Vec<FieldDecl>,
    source_infos: Vec<SourceInfo>,
    calls: Vec<(MethodId, MethodId)>,
    entry_methods: Vec<MethodId>,
    split_points: Vec<SplitPoint>,
    initial_load_sequence: Vec<u32>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, decl: TypeDecl) -> TypeId {
        let id = TypeId::new(self.types.len() as u32);
        self.types.push(decl);
        id
    }

    /// Replace a type declaration, e.g. to wire up a hierarchy after all types exist
    pub fn type_mut(&mut self, id: TypeId) -> Option<&mut TypeDecl> {
        self.types.get_mut(id.index())
    }

    pub fn add_method(&mut self, decl: MethodDecl) -> MethodId {
        let id = MethodId::new(self.methods.len() as u32);
        self.methods.push(decl);
        id
    }

    pub fn add_field(&mut self, decl: FieldDecl) -> FieldId {
        let id = FieldId::new(self.fields.len() as u32);
        self.fields.push(decl);
        id
    }

    pub fn add_source_info(&mut self, info: SourceInfo) -> SourceInfoId {
        let id = SourceInfoId::new(self.source_infos.len() as u32);
        self.source_infos.push(info);
        id
    }

    /// Record that `caller` references `callee`
    pub fn add_call(&mut self, caller: MethodId, callee: MethodId) {
        self.calls.push((caller, callee));
    }

    pub fn add_entry_method(&mut self, method: MethodId) {
        self.entry_methods.push(method);
    }

    pub fn add_split_point(
        &mut self,
        id: u32,
        location: impl Into<String>,
        entry_methods: impl IntoIterator<Item = MethodId>,
    ) {
        self.split_points.push(SplitPoint {
            id,
            location: location.into(),
            entry_methods: entry_methods.into_iter().collect(),
        });
    }

    pub fn push_initial_load(&mut self, split_point: u32) {
        self.initial_load_sequence.push(split_point);
    }

    pub fn build(self) -> Result<Program> {
        self.validate()?;

        let mut call_graph = DiGraph::with_capacity(self.methods.len(), self.calls.len());
        let method_nodes: Vec<_> = (0..self.methods.len())
            .map(|idx| call_graph.add_node(MethodId::new(idx as u32)))
            .collect();
        for (caller, callee) in &self.calls {
            call_graph.add_edge(method_nodes[caller.index()], method_nodes[callee.index()], ());
        }

        debug!(
            "Built program with {} types, {} methods, {} fields, {} call edges",
            self.types.len(),
            self.methods.len(),
            self.fields.len(),
            self.calls.len()
        );

        Ok(Program {
            types: self.types,
            methods: self.methods,
            fields: self.fields,
            source_infos: self.source_infos,
            entry_methods: self.entry_methods,
            split_points: self.split_points,
            initial_load_sequence: self.initial_load_sequence,
            call_graph,
            method_nodes,
        })
    }

    fn validate(&self) -> Result<()> {
        let type_ok = |id: TypeId| id.index() < self.types.len();
        let method_ok = |id: MethodId| id.index() < self.methods.len();
        let field_ok = |id: FieldId| id.index() < self.fields.len();

        for decl in &self.types {
            let dangling = decl
                .superclass
                .iter()
                .chain(&decl.interfaces)
                .find(|id| !type_ok(**id));
            if let Some(id) = dangling {
                bail!("Type '{}' references undeclared type {:?}", decl.name, id);
            }
        }

        for decl in &self.methods {
            if let Some(ty) = decl.enclosing_type
                && !type_ok(ty)
            {
                bail!(
                    "Method '{}' is enclosed by undeclared type {:?}",
                    decl.name,
                    ty
                );
            }
            if let Some(id) = decl.overrides.iter().find(|id| !method_ok(**id)) {
                bail!("Method '{}' overrides undeclared method {:?}", decl.name, id);
            }
        }

        for decl in &self.fields {
            if !type_ok(decl.enclosing_type) {
                bail!(
                    "Field '{}' is enclosed by undeclared type {:?}",
                    decl.name,
                    decl.enclosing_type
                );
            }
        }

        for (idx, info) in self.source_infos.iter().enumerate() {
            for correlation in &info.correlations {
                let valid = match correlation {
                    Correlation::Class(id) => type_ok(*id),
                    Correlation::Field(id) => field_ok(*id),
                    Correlation::Method(id) => method_ok(*id),
                    Correlation::Function(_) | Correlation::Literal(_) | Correlation::Origin(_) => {
                        true
                    }
                };
                if !valid {
                    bail!("Source info #{idx} has a dangling correlation {correlation:?}");
                }
            }
        }

        for (caller, callee) in &self.calls {
            if !method_ok(*caller) || !method_ok(*callee) {
                bail!("Call edge {caller:?} -> {callee:?} references an undeclared method");
            }
        }

        if let Some(id) = self.entry_methods.iter().find(|id| !method_ok(**id)) {
            bail!("Entry method {id:?} is not declared");
        }

        for split_point in &self.split_points {
            if let Some(id) = split_point.entry_methods.iter().find(|id| !method_ok(**id)) {
                bail!(
                    "Split point {} enters undeclared method {:?}",
                    split_point.id,
                    id
                );
            }
        }

        if let Some(id) = self
            .initial_load_sequence
            .iter()
            .find(|id| !self.split_points.iter().any(|sp| sp.id == **id))
        {
            bail!("Initial load sequence names unknown split point {id}");
        }

        Ok(())
    }
}
