use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use anyhow::Result;

use super::{FieldMember, HasDependencies, Member, MemberFactory, MethodMember, lock};
use crate::program::TypeId;

/// A class or interface
#[derive(Debug)]
pub struct ClassMember {
    type_id: TypeId,
    source_name: String,
    package: String,
    js_name: Option<String>,
    fields: Mutex<BTreeMap<String, Arc<FieldMember>>>,
    methods: Mutex<BTreeMap<String, Arc<MethodMember>>>,
    dependencies: Mutex<BTreeSet<Member>>,
    /// Supertypes, computed on first request and then shared
    overrides: Mutex<Option<Arc<[Arc<ClassMember>]>>>,
}

impl ClassMember {
    pub(super) fn new(type_id: TypeId, source_name: String, js_name: Option<String>) -> Self {
        let package = source_name
            .rfind('.')
            .map(|idx| source_name[..idx].to_owned())
            .unwrap_or_default();
        Self {
            type_id,
            source_name,
            package,
            js_name,
            fields: Mutex::default(),
            methods: Mutex::default(),
            dependencies: Mutex::default(),
            overrides: Mutex::default(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Package portion of the source name; empty for the default package
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Name without its package
    pub fn simple_name(&self) -> &str {
        if self.package.is_empty() {
            &self.source_name
        } else {
            &self.source_name[self.package.len() + 1..]
        }
    }

    pub fn js_name(&self) -> Option<&str> {
        self.js_name.as_deref()
    }

    pub fn add_field(&self, field: Arc<FieldMember>) {
        lock(&self.fields)
            .entry(field.source_name().to_owned())
            .or_insert(field);
    }

    pub fn add_method(&self, method: Arc<MethodMember>) {
        lock(&self.methods)
            .entry(method.source_name().to_owned())
            .or_insert(method);
    }

    /// Fields observed so far, sorted by source name
    pub fn fields(&self) -> Vec<Arc<FieldMember>> {
        lock(&self.fields).values().cloned().collect()
    }

    /// Methods observed so far, sorted by source name
    pub fn methods(&self) -> Vec<Arc<MethodMember>> {
        lock(&self.methods).values().cloned().collect()
    }

    /// Every superclass and implemented interface, transitively, excluding this class
    ///
    /// Computed once per instance; concurrent callers wait for the first
    /// computation and then share its result.
    pub fn overrides(&self, factory: &MemberFactory<'_>) -> Result<Arc<[Arc<Self>]>> {
        let mut cached = lock(&self.overrides);
        if let Some(overrides) = cached.as_ref() {
            return Ok(Arc::clone(overrides));
        }
        let computed: Arc<[Arc<Self>]> = factory.supertypes_of(self.type_id)?.into();
        *cached = Some(Arc::clone(&computed));
        Ok(computed)
    }

    /// Drop every reference this class holds to other members
    pub(super) fn release(&self) {
        lock(&self.fields).clear();
        lock(&self.methods).clear();
        lock(&self.dependencies).clear();
        lock(&self.overrides).take();
    }
}

impl HasDependencies for ClassMember {
    fn add_dependency(&self, dependency: Member) -> bool {
        lock(&self.dependencies).insert(dependency)
    }

    fn dependencies(&self) -> Vec<Member> {
        lock(&self.dependencies).iter().cloned().collect()
    }
}
