use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff and client roles known to the CRM.
///
/// Wire names are camelCase, matching what the auth provider stores on the
/// user record (`premiereCoach`, `csManager`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    User,
    Coach,
    PremiereCoach,
    /// Chief product officer.
    Cpo,
    CsManager,
    CsRep,
    /// Client success coordinator.
    Csc,
    Finance,
    BillingAdmin,
    SalesRep,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Admin,
        Role::User,
        Role::Coach,
        Role::PremiereCoach,
        Role::Cpo,
        Role::CsManager,
        Role::CsRep,
        Role::Csc,
        Role::Finance,
        Role::BillingAdmin,
        Role::SalesRep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Coach => "coach",
            Role::PremiereCoach => "premiereCoach",
            Role::Cpo => "cpo",
            Role::CsManager => "csManager",
            Role::CsRep => "csRep",
            Role::Csc => "csc",
            Role::Finance => "finance",
            Role::BillingAdmin => "billingAdmin",
            Role::SalesRep => "salesRep",
        }
    }

    /// Parses a wire name. Unknown names yield `None`; callers decide the
    /// fallback.
    pub fn from_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.name() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
