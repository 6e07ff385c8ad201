//! Resources, verbs and the statement that ties them together.
//!
//! A [`CapabilityStatement`] answers one question: may the holder perform
//! `verb` on `resource`? Both sides are closed enums so a misspelled check is a
//! compile error rather than a silent deny.
//!
//! ```
//! use access::{CapabilityStatement, Resource, Verb, Verbs};
//!
//! let mut statement = CapabilityStatement::empty();
//! statement.grant(Resource::Client, Verbs::READ | Verbs::LIST);
//!
//! assert!(statement.can(Resource::Client, Verb::Read));
//! assert!(!statement.can(Resource::Client, Verb::Delete));
//! assert!(!statement.can(Resource::Payment, Verb::Read));
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    User,
    Client,
    Coach,
    Payment,
    Product,
    ActivityPeriod,
    GracePeriod,
    Testimonial,
    Onboarding,
    Offboarding,
    Settings,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::User,
        Resource::Client,
        Resource::Coach,
        Resource::Payment,
        Resource::Product,
        Resource::ActivityPeriod,
        Resource::GracePeriod,
        Resource::Testimonial,
        Resource::Onboarding,
        Resource::Offboarding,
        Resource::Settings,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Create, Verb::Read, Verb::Update, Verb::Delete, Verb::List];

    pub fn flag(self) -> Verbs {
        match self {
            Verb::Create => Verbs::CREATE,
            Verb::Read => Verbs::READ,
            Verb::Update => Verbs::UPDATE,
            Verb::Delete => Verbs::DELETE,
            Verb::List => Verbs::LIST,
        }
    }
}

bitflags! {
    /// Set of verbs granted on a single resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Verbs: u8 {
        const CREATE = 0b0000_0001;
        const READ   = 0b0000_0010;
        const UPDATE = 0b0000_0100;
        const DELETE = 0b0000_1000;
        const LIST   = 0b0001_0000;
    }
}

impl Verbs {
    /// Look but don't touch.
    pub const VIEW: Self = Self::READ.union(Self::LIST);

    /// Everything except delete.
    pub const EDIT: Self = Self::VIEW.union(Self::CREATE).union(Self::UPDATE);

    pub const ALL: Self = Self::EDIT.union(Self::DELETE);

    pub fn verbs(self) -> Vec<Verb> {
        Verb::ALL
            .into_iter()
            .filter(|verb| self.contains(verb.flag()))
            .collect()
    }
}

impl From<Verb> for Verbs {
    fn from(verb: Verb) -> Self {
        verb.flag()
    }
}

/// Resource to verb-set mapping held by one role.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityStatement {
    grants: BTreeMap<Resource, Verbs>,
}

impl CapabilityStatement {
    /// A statement that grants nothing. Used for requests without a session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds `verbs` on `resource`, keeping anything already granted.
    pub fn grant(&mut self, resource: Resource, verbs: Verbs) {
        if verbs.is_empty() {
            return;
        }

        *self.grants.entry(resource).or_default() |= verbs;
    }

    pub fn verbs_on(&self, resource: Resource) -> Verbs {
        self.grants.get(&resource).copied().unwrap_or_default()
    }

    pub fn can(&self, resource: Resource, verb: Verb) -> bool {
        self.verbs_on(resource).contains(verb.flag())
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

/// Free-function form of [`CapabilityStatement::can`].
pub fn can(statement: &CapabilityStatement, resource: Resource, verb: Verb) -> bool {
    statement.can(resource, verb)
}

impl Serialize for CapabilityStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.grants.len()))?;
        for (resource, verbs) in &self.grants {
            map.serialize_entry(resource, &verbs.verbs())?;
        }
        map.end()
    }
}
