//! Provenance records attached to ranges of emitted output

use super::{FieldId, MethodId, TypeId};

/// Handle to a [`SourceInfo`] stored in a [`super::Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceInfoId(u32);

impl SourceInfoId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A physical source location: file and 1-based line number
///
/// Ordered by location, then line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    location: String,
    line_number: u32,
}

impl Origin {
    pub fn new(location: impl Into<String>, line_number: u32) -> Self {
        Self {
            location: location.into(),
            line_number,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }
}

/// A typed link from a source-info record to something in the program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Correlation {
    Class(TypeId),
    Field(FieldId),
    Method(MethodId),
    /// A JavaScript function with no program-level declaration
    Function(String),
    /// A compile-time literal, carrying its human readable description
    Literal(String),
    Origin(Origin),
}

impl Correlation {
    pub fn axis(&self) -> Axis {
        match self {
            Self::Class(_) => Axis::Class,
            Self::Field(_) => Axis::Field,
            Self::Method(_) => Axis::Method,
            Self::Function(_) => Axis::Function,
            Self::Literal(_) => Axis::Literal,
            Self::Origin(_) => Axis::Origin,
        }
    }
}

/// The kind of thing a [`Correlation`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Class,
    Field,
    Method,
    Function,
    Literal,
    Origin,
}

/// An AST rewrite that contributed to a range of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub description: String,
    pub caller: String,
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.description, self.caller)
    }
}

/// Provenance token for a range of generated output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// Where the originating code lives, if known
    pub origin: Option<Origin>,
    pub correlations: Vec<Correlation>,
    pub mutations: Vec<Mutation>,
}

impl SourceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(location: impl Into<String>, line_number: u32) -> Self {
        Self {
            origin: Some(Origin::new(location, line_number)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlations.push(correlation);
        self
    }

    #[must_use]
    pub fn with_mutation(mut self, description: impl Into<String>, caller: impl Into<String>) -> Self {
        self.mutations.push(Mutation {
            description: description.into(),
            caller: caller.into(),
        });
        self
    }

    /// The first correlation on the given axis
    pub fn primary_correlation(&self, axis: Axis) -> Option<&Correlation> {
        self.correlations.iter().find(|c| c.axis() == axis)
    }
}
