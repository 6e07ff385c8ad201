//! The role capability matrix.
//!
//! Every grant the CRM knows about lives in [`TABLE`], one row per
//! `(role, resource)` pair. The table is folded into a [`CapabilityMatrix`]
//! once per process and never mutated afterwards. Roles without rows, and raw
//! role names that don't parse, get the `user` statement.

use std::{collections::HashMap, sync::LazyLock};

use crate::{
    CapabilityStatement, Resource, Role,
    Resource::{
        ActivityPeriod, Client, Coach, GracePeriod, Offboarding, Onboarding, Payment, Product,
        Settings, Testimonial, User,
    },
    Verbs,
};

const VIEW: Verbs = Verbs::VIEW;
const EDIT: Verbs = Verbs::EDIT;
const ALL: Verbs = Verbs::ALL;
const CREATE_VIEW: Verbs = Verbs::CREATE.union(Verbs::VIEW);
const UPDATE_VIEW: Verbs = Verbs::UPDATE.union(Verbs::VIEW);

pub type Row = (Role, &'static [(Resource, Verbs)]);

pub const TABLE: &[Row] = &[
    (
        Role::Admin,
        &[
            (User, ALL),
            (Client, ALL),
            (Coach, ALL),
            (Payment, ALL),
            (Product, ALL),
            (ActivityPeriod, ALL),
            (GracePeriod, ALL),
            (Testimonial, ALL),
            (Onboarding, ALL),
            (Offboarding, ALL),
            (Settings, ALL),
        ],
    ),
    (Role::User, &[(Client, VIEW), (Coach, VIEW)]),
    (
        Role::Coach,
        &[
            (Client, UPDATE_VIEW),
            (Coach, VIEW),
            (ActivityPeriod, VIEW),
            (GracePeriod, VIEW),
            (Testimonial, EDIT),
            (Onboarding, VIEW),
        ],
    ),
    (
        Role::PremiereCoach,
        &[
            (Client, EDIT),
            (Coach, VIEW),
            (ActivityPeriod, VIEW),
            (GracePeriod, VIEW),
            (Testimonial, ALL),
            (Onboarding, UPDATE_VIEW),
            (Offboarding, VIEW),
        ],
    ),
    (
        Role::Cpo,
        &[
            (User, VIEW),
            (Client, UPDATE_VIEW),
            (Coach, ALL),
            (Payment, VIEW),
            (Product, ALL),
            (ActivityPeriod, ALL),
            (GracePeriod, UPDATE_VIEW),
            (Testimonial, ALL),
            (Onboarding, ALL),
            (Offboarding, ALL),
            (Settings, UPDATE_VIEW),
        ],
    ),
    (
        Role::CsManager,
        &[
            (User, VIEW),
            (Client, ALL),
            (Coach, UPDATE_VIEW),
            (Payment, VIEW),
            (Product, VIEW),
            (ActivityPeriod, ALL),
            (GracePeriod, ALL),
            (Testimonial, ALL),
            (Onboarding, ALL),
            (Offboarding, ALL),
        ],
    ),
    (
        Role::CsRep,
        &[
            (Client, EDIT),
            (Coach, VIEW),
            (Product, VIEW),
            (ActivityPeriod, EDIT),
            (GracePeriod, UPDATE_VIEW),
            (Testimonial, CREATE_VIEW),
            (Onboarding, EDIT),
            (Offboarding, EDIT),
        ],
    ),
    (
        Role::Csc,
        &[
            (Client, UPDATE_VIEW),
            (Coach, VIEW),
            (ActivityPeriod, VIEW),
            (GracePeriod, VIEW),
            (Testimonial, VIEW),
            (Onboarding, UPDATE_VIEW),
            (Offboarding, UPDATE_VIEW),
        ],
    ),
    (
        Role::Finance,
        &[
            (Client, VIEW),
            (Payment, EDIT),
            (Product, VIEW),
            (ActivityPeriod, VIEW),
        ],
    ),
    (
        Role::BillingAdmin,
        &[
            (Client, UPDATE_VIEW),
            (Payment, ALL),
            (Product, UPDATE_VIEW),
            (ActivityPeriod, VIEW),
            (GracePeriod, VIEW),
        ],
    ),
    (
        Role::SalesRep,
        &[
            (Client, CREATE_VIEW),
            (Coach, VIEW),
            (Payment, CREATE_VIEW),
            (Product, VIEW),
        ],
    ),
];

static MATRIX: LazyLock<CapabilityMatrix> = LazyLock::new(|| CapabilityMatrix::from_table(TABLE));

/// Immutable role -> statement lookup.
#[derive(Debug, Clone)]
pub struct CapabilityMatrix {
    statements: HashMap<Role, CapabilityStatement>,
    fallback: CapabilityStatement,
}

impl CapabilityMatrix {
    /// Folds rows into statements. Duplicate `(role, resource)` rows union.
    pub fn from_table(table: &[Row]) -> Self {
        let mut statements: HashMap<Role, CapabilityStatement> = HashMap::new();

        for (role, grants) in table {
            let statement = statements.entry(*role).or_default();
            for (resource, verbs) in grants.iter() {
                statement.grant(*resource, *verbs);
            }
        }

        let fallback = statements.get(&Role::User).cloned().unwrap_or_default();

        Self {
            statements,
            fallback,
        }
    }

    /// The shared, process-wide matrix built from [`TABLE`].
    pub fn global() -> &'static CapabilityMatrix {
        &MATRIX
    }

    pub fn statement_for(&self, role: Role) -> &CapabilityStatement {
        self.statements.get(&role).unwrap_or(&self.fallback)
    }

    pub fn statement_for_name(&self, name: &str) -> &CapabilityStatement {
        match Role::from_name(name) {
            Some(role) => self.statement_for(role),
            None => &self.fallback,
        }
    }

    pub fn is_defined(&self, role: Role) -> bool {
        self.statements.contains_key(&role)
    }
}

pub fn statement_for(role: Role) -> &'static CapabilityStatement {
    MATRIX.statement_for(role)
}

pub fn statement_for_name(name: &str) -> &'static CapabilityStatement {
    MATRIX.statement_for_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Verb, can};

    fn granted_in_table(table: &[Row], role: Role, resource: Resource, verb: Verb) -> bool {
        table
            .iter()
            .filter(|(row_role, _)| *row_role == role)
            .flat_map(|(_, grants)| grants.iter())
            .any(|(row_resource, verbs)| *row_resource == resource && verbs.contains(verb.flag()))
    }

    #[test]
    fn every_role_resource_verb_matches_table() {
        let mut checked = 0;

        for role in Role::ALL {
            let statement = statement_for(role);
            for resource in Resource::ALL {
                for verb in Verb::ALL {
                    assert_eq!(
                        can(statement, resource, verb),
                        granted_in_table(TABLE, role, resource, verb),
                        "{role} {resource:?} {verb:?}"
                    );
                    checked += 1;
                }
            }
        }

        assert_eq!(checked, Role::ALL.len() * Resource::ALL.len() * Verb::ALL.len());
    }

    #[test]
    fn every_role_has_rows() {
        for role in Role::ALL {
            assert!(CapabilityMatrix::global().is_defined(role), "{role}");
        }
    }

    #[test]
    fn unknown_names_get_user_statement() {
        let user = statement_for(Role::User);

        for name in ["", "owner", "ADMIN", "superAdmin", "cs_rep"] {
            assert_eq!(statement_for_name(name), user, "{name:?}");
        }
        assert_eq!(statement_for_name("csRep"), statement_for(Role::CsRep));
    }

    #[test]
    fn undefined_roles_fall_back_to_user() {
        let table: &[Row] = &[
            (Role::User, &[(Client, VIEW)]),
            (Role::Admin, &[(Settings, ALL)]),
        ];
        let matrix = CapabilityMatrix::from_table(table);

        for role in Role::ALL {
            if matrix.is_defined(role) {
                continue;
            }
            assert_eq!(matrix.statement_for(role), matrix.statement_for(Role::User), "{role}");
        }
        assert!(matrix.statement_for(Role::Admin).can(Settings, Verb::Delete));
    }

    #[test]
    fn missing_user_row_means_empty_fallback() {
        let table: &[Row] = &[(Role::Finance, &[(Payment, ALL)])];
        let matrix = CapabilityMatrix::from_table(table);

        assert!(matrix.statement_for(Role::Coach).is_empty());
        assert!(matrix.statement_for_name("nobody").is_empty());
    }

    #[test]
    fn duplicate_rows_union() {
        let table: &[Row] = &[
            (Role::Csc, &[(Client, Verbs::READ)]),
            (Role::Csc, &[(Client, Verbs::UPDATE)]),
        ];
        let matrix = CapabilityMatrix::from_table(table);

        assert_eq!(
            matrix.statement_for(Role::Csc).verbs_on(Client),
            Verbs::READ | Verbs::UPDATE
        );
    }

    #[test]
    fn only_admins_delete_users() {
        for role in Role::ALL {
            assert_eq!(
                statement_for(role).can(User, Verb::Delete),
                role == Role::Admin,
                "{role}"
            );
        }
    }
}
