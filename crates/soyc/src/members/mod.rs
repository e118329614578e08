//! Canonical handles to program declarations
//!
//! Every class, field and method that shows up in a report is represented by
//! exactly one member instance per reporting run, handed out by the
//! [`MemberFactory`]. Classes own their fields and methods; fields and methods
//! point back at their class through a weak reference.

mod class;
mod factory;
mod field;
mod method;

use std::{
    cmp::Ordering,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub use class::ClassMember;
pub use factory::MemberFactory;
pub use field::FieldMember;
pub use method::MethodMember;

/// The three kinds of declaration a member can stand for, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Class,
    Field,
    Method,
}

/// A canonical class, field or method
#[derive(Debug, Clone)]
pub enum Member {
    Class(Arc<ClassMember>),
    Field(Arc<FieldMember>),
    Method(Arc<MethodMember>),
}

impl Member {
    pub fn kind(&self) -> MemberKind {
        match self {
            Self::Class(_) => MemberKind::Class,
            Self::Field(_) => MemberKind::Field,
            Self::Method(_) => MemberKind::Method,
        }
    }

    /// Fully qualified name; methods include their erased signature
    pub fn source_name(&self) -> &str {
        match self {
            Self::Class(class) => class.source_name(),
            Self::Field(field) => field.source_name(),
            Self::Method(method) => method.source_name(),
        }
    }

    pub fn js_name(&self) -> Option<&str> {
        match self {
            Self::Class(class) => class.js_name(),
            Self::Field(field) => field.js_name(),
            Self::Method(method) => method.js_name(),
        }
    }

    /// Ordering for mixed collections: classes, then fields, then methods
    pub fn cmp_by_kind(&self, other: &Self) -> Ordering {
        self.kind()
            .cmp(&other.kind())
            .then_with(|| self.source_name().cmp(other.source_name()))
    }

    /// Whether both handles point at the very same canonical instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (Self::Field(a), Self::Field(b)) => Arc::ptr_eq(a, b),
            (Self::Method(a), Self::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Members are ordered and deduplicated by source name; the kind only breaks
// ties so the order stays total.
impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source_name()
            .cmp(other.source_name())
            .then_with(|| self.kind().cmp(&other.kind()))
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Member {}

impl From<Arc<ClassMember>> for Member {
    fn from(class: Arc<ClassMember>) -> Self {
        Self::Class(class)
    }
}

impl From<Arc<FieldMember>> for Member {
    fn from(field: Arc<FieldMember>) -> Self {
        Self::Field(field)
    }
}

impl From<Arc<MethodMember>> for Member {
    fn from(method: Arc<MethodMember>) -> Self {
        Self::Method(method)
    }
}

/// Members that record which other members they depend on
pub trait HasDependencies {
    /// Add an edge from this member to a prerequisite; returns false if it was already known
    fn add_dependency(&self, dependency: Member) -> bool;

    /// Prerequisites, sorted by source name
    fn dependencies(&self) -> Vec<Member>;
}

/// Lock a member's interior state, ignoring poisoning: every critical
/// section only inserts into or reads from a collection.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
