use std::sync::{Arc, Weak};

use super::ClassMember;
use crate::program::FieldId;

/// A field, owned by its enclosing [`ClassMember`]
#[derive(Debug)]
pub struct FieldMember {
    field_id: FieldId,
    name: String,
    source_name: String,
    js_name: Option<String>,
    enclosing: Weak<ClassMember>,
}

impl FieldMember {
    pub(super) fn new(
        field_id: FieldId,
        name: String,
        js_name: Option<String>,
        enclosing: &Arc<ClassMember>,
    ) -> Self {
        Self {
            field_id,
            source_name: format!("{}::{}", enclosing.source_name(), name),
            name,
            js_name,
            enclosing: Arc::downgrade(enclosing),
        }
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Type::field`
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn js_name(&self) -> Option<&str> {
        self.js_name.as_deref()
    }

    /// The owning class; `None` once the factory that created it is gone
    pub fn enclosing(&self) -> Option<Arc<ClassMember>> {
        self.enclosing.upgrade()
    }
}
