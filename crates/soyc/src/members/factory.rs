use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{Context, Result, anyhow};
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{ClassMember, FieldMember, MethodMember, lock};
use crate::program::{FieldId, MethodId, Program, TypeId};

/// Canonicalizing cache from declarations to members
///
/// One factory serves one reporting run. Each declaration handle maps to a
/// single member instance for the factory's lifetime; dropping the factory
/// releases the links between members so cyclic dependency edges are freed.
#[derive(Debug)]
pub struct MemberFactory<'p> {
    program: &'p Program,
    classes: Mutex<FxHashMap<TypeId, Arc<ClassMember>>>,
    fields: Mutex<FxHashMap<FieldId, Arc<FieldMember>>>,
    methods: Mutex<FxHashMap<MethodId, Arc<MethodMember>>>,
}

impl<'p> MemberFactory<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            classes: Mutex::default(),
            fields: Mutex::default(),
            methods: Mutex::default(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// The canonical member for a type, created on first request
    ///
    /// A new class starts without fields or methods; those are added by
    /// whichever analysis first observes them.
    pub fn class(&self, id: TypeId) -> Result<Arc<ClassMember>> {
        let mut classes = lock(&self.classes);
        if let Some(class) = classes.get(&id) {
            return Ok(Arc::clone(class));
        }

        let decl = self
            .program
            .type_decl(id)
            .context("Cannot create a class member")?;
        trace!("Canonicalizing class {}", decl.name);
        let class = Arc::new(ClassMember::new(id, decl.name.clone(), decl.js_name.clone()));
        classes.insert(id, Arc::clone(&class));
        Ok(class)
    }

    /// The canonical member for a field; its enclosing class is canonicalized too
    pub fn field(&self, id: FieldId) -> Result<Arc<FieldMember>> {
        if let Some(field) = lock(&self.fields).get(&id) {
            return Ok(Arc::clone(field));
        }

        let decl = self
            .program
            .field_decl(id)
            .context("Cannot create a field member")?;
        let enclosing = self.class(decl.enclosing_type).with_context(|| {
            format!("Cannot resolve the enclosing type of field '{}'", decl.name)
        })?;
        let field = Arc::new(FieldMember::new(
            id,
            decl.name.clone(),
            decl.js_name.clone(),
            &enclosing,
        ));
        Ok(Arc::clone(lock(&self.fields).entry(id).or_insert(field)))
    }

    /// The canonical member for a method; its enclosing class is canonicalized too
    ///
    /// Methods without an enclosing type (synthetic global functions) cannot
    /// be members and are reported as an error.
    pub fn method(&self, id: MethodId) -> Result<Arc<MethodMember>> {
        if let Some(method) = lock(&self.methods).get(&id) {
            return Ok(Arc::clone(method));
        }

        let decl = self
            .program
            .method_decl(id)
            .context("Cannot create a method member")?;
        let enclosing_type = decl.enclosing_type.ok_or_else(|| {
            anyhow!(
                "Method '{}' has no enclosing type and cannot be canonicalized",
                decl.name
            )
        })?;
        let enclosing = self.class(enclosing_type).with_context(|| {
            format!("Cannot resolve the enclosing type of method '{}'", decl.name)
        })?;
        let method = Arc::new(MethodMember::new(
            id,
            decl.name.clone(),
            self.program.method_signature(id)?,
            decl.js_name.clone(),
            decl.js_aliases.iter().cloned().collect(),
            &enclosing,
        ));
        Ok(Arc::clone(lock(&self.methods).entry(id).or_insert(method)))
    }

    /// Every class canonicalized so far, sorted by source name
    pub fn classes(&self) -> Vec<Arc<ClassMember>> {
        let mut classes: Vec<_> = lock(&self.classes).values().cloned().collect();
        classes.sort_by(|a, b| a.source_name().cmp(b.source_name()));
        classes
    }

    pub fn class_count(&self) -> usize {
        lock(&self.classes).len()
    }

    pub fn method_count(&self) -> usize {
        lock(&self.methods).len()
    }

    pub fn field_count(&self) -> usize {
        lock(&self.fields).len()
    }

    /// Transitive closure over superclasses and interfaces, excluding `start`
    pub(super) fn supertypes_of(&self, start: TypeId) -> Result<Vec<Arc<ClassMember>>> {
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut worklist = VecDeque::new();
        self.enqueue_supertypes(start, &mut worklist)?;

        let mut found = BTreeMap::new();
        while let Some(ty) = worklist.pop_front() {
            if !seen.insert(ty) {
                continue;
            }
            let class = self.class(ty)?;
            found.insert(class.source_name().to_owned(), class);
            self.enqueue_supertypes(ty, &mut worklist)?;
        }

        Ok(found.into_values().collect())
    }

    fn enqueue_supertypes(&self, ty: TypeId, worklist: &mut VecDeque<TypeId>) -> Result<()> {
        let decl = self.program.type_decl(ty)?;
        worklist.extend(decl.superclass);
        worklist.extend(decl.interfaces.iter().copied());
        Ok(())
    }

    /// Direct overrides of a method, sorted by source name
    pub(super) fn overridden_methods_of(&self, method: MethodId) -> Result<Vec<Arc<MethodMember>>> {
        let decl = self.program.method_decl(method)?;
        let mut found = BTreeMap::new();
        for &overridden in &decl.overrides {
            if overridden == method {
                continue;
            }
            let member = self.method(overridden).with_context(|| {
                format!("Cannot resolve a method overridden by '{}'", decl.name)
            })?;
            found.insert(member.source_name().to_owned(), member);
        }
        Ok(found.into_values().collect())
    }
}

impl Drop for MemberFactory<'_> {
    fn drop(&mut self) {
        let classes = self.classes.get_mut().unwrap_or_else(PoisonError::into_inner);
        for class in classes.values() {
            class.release();
        }
        let methods = self.methods.get_mut().unwrap_or_else(PoisonError::into_inner);
        for method in methods.values() {
            method.release();
        }
    }
}
