use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, Weak},
};

use anyhow::Result;

use super::{ClassMember, HasDependencies, Member, MemberFactory, lock};
use crate::program::MethodId;

/// A method, owned by its enclosing [`ClassMember`]
#[derive(Debug)]
pub struct MethodMember {
    method_id: MethodId,
    name: String,
    source_name: String,
    js_name: Option<String>,
    js_aliases: BTreeSet<String>,
    enclosing: Weak<ClassMember>,
    dependencies: Mutex<BTreeSet<Member>>,
    overrides: Mutex<Option<Arc<[Arc<MethodMember>]>>>,
}

impl MethodMember {
    pub(super) fn new(
        method_id: MethodId,
        name: String,
        source_name: String,
        js_name: Option<String>,
        js_aliases: BTreeSet<String>,
        enclosing: &Arc<ClassMember>,
    ) -> Self {
        Self {
            method_id,
            name,
            source_name,
            js_name,
            js_aliases,
            enclosing: Arc::downgrade(enclosing),
            dependencies: Mutex::default(),
            overrides: Mutex::default(),
        }
    }

    pub fn method_id(&self) -> MethodId {
        self.method_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Type::name(params)return`
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn js_name(&self) -> Option<&str> {
        self.js_name.as_deref()
    }

    /// Other emitted names this method is known by
    pub fn js_aliases(&self) -> &BTreeSet<String> {
        &self.js_aliases
    }

    pub fn enclosing(&self) -> Option<Arc<ClassMember>> {
        self.enclosing.upgrade()
    }

    /// Methods this one directly overrides, sorted by source name
    pub fn overrides(&self, factory: &MemberFactory<'_>) -> Result<Arc<[Arc<Self>]>> {
        let mut cached = lock(&self.overrides);
        if let Some(overrides) = cached.as_ref() {
            return Ok(Arc::clone(overrides));
        }
        let computed: Arc<[Arc<Self>]> = factory.overridden_methods_of(self.method_id)?.into();
        *cached = Some(Arc::clone(&computed));
        Ok(computed)
    }

    pub(super) fn release(&self) {
        lock(&self.dependencies).clear();
        lock(&self.overrides).take();
    }
}

impl HasDependencies for MethodMember {
    fn add_dependency(&self, dependency: Member) -> bool {
        lock(&self.dependencies).insert(dependency)
    }

    fn dependencies(&self) -> Vec<Member> {
        lock(&self.dependencies).iter().cloned().collect()
    }
}
