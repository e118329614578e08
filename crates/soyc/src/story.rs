//! Attributed slices of emitted output

use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{members::Member, program::Origin};

/// Dense identifier of a [`Story`], assigned in the order source infos are first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoryId(u32);

impl StoryId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "story{}", self.0)
    }
}

/// Attribution shared by every slice cut from the same source info
#[derive(Debug)]
struct StoryData {
    id: StoryId,
    literal_type: Option<String>,
    members: BTreeSet<Member>,
    origins: BTreeSet<Origin>,
    mutations: Vec<String>,
}

/// One element of the partition of a fragment's output
///
/// Stories are equal when their ids are. A shadow copy made with
/// [`Story::shadow`] shares the attribution of the original and only differs
/// in where the slice lies: its fragment and its length.
#[derive(Debug, Clone)]
pub struct Story {
    data: Arc<StoryData>,
    fragment: usize,
    length: usize,
}

impl Story {
    pub fn new(
        id: StoryId,
        fragment: usize,
        length: usize,
        literal_type: Option<String>,
        members: BTreeSet<Member>,
        origins: BTreeSet<Origin>,
        mutations: Vec<String>,
    ) -> Self {
        Self {
            data: Arc::new(StoryData {
                id,
                literal_type,
                members,
                origins,
                mutations,
            }),
            fragment,
            length,
        }
    }

    /// Shadow copy with the same attribution for a slice of `length` bytes in `fragment`
    #[must_use]
    pub fn shadow(&self, fragment: usize, length: usize) -> Self {
        Self {
            data: Arc::clone(&self.data),
            fragment,
            length,
        }
    }

    pub fn id(&self) -> StoryId {
        self.data.id
    }

    /// Fragment this slice was cut from
    pub fn fragment(&self) -> usize {
        self.fragment
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn literal_type(&self) -> Option<&str> {
        self.data.literal_type.as_deref()
    }

    /// Correlated members, sorted by source name
    pub fn members(&self) -> &BTreeSet<Member> {
        &self.data.members
    }

    pub fn origins(&self) -> &BTreeSet<Origin> {
        &self.data.origins
    }

    /// Rewrites that shaped this output, formatted as `description by caller`
    pub fn mutations(&self) -> &[String] {
        &self.data.mutations
    }
}

impl PartialEq for Story {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Story {}

impl Hash for Story {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
