//! Which cached data a write makes stale.
//!
//! Two sources feed the invalidation set of a [`Mutation`]:
//!
//! - the curated table in [`Mutation::invalidates`], kept by hand next to the
//!   backend's derived-data rules (balances from transactions, budget spend,
//!   analytics rollups, ...);
//! - the dependency graph in [`derived`], traversed from the resources the
//!   mutation writes.
//!
//! [`Mutation::invalidation_set`] is the union of both, so a relationship
//! added to the graph is honoured even before the table catches up.
use std::collections::{BTreeSet, VecDeque};

use api_types::Resource;

use crate::keys::{KeyFactory, QueryKey};

/// Resources whose backend data is computed from `resource`.
pub fn derived(resource: Resource) -> &'static [Resource] {
    use Resource::*;

    match resource {
        Transactions => &[Accounts, Budgets, Analytics, Reports],
        Accounts => &[Analytics],
        Budgets => &[Analytics],
        Bills => &[Notifications, Analytics],
        Goals => &[Analytics],
        Categories => &[Budgets, Analytics],
        // Base currency drives every aggregated view.
        Users => &[Analytics],
        Merchants | Notifications | Reports | Analytics => &[],
    }
}

/// `resource` plus everything transitively derived from it.
pub fn dependents_closure(resource: Resource) -> BTreeSet<Resource> {
    let mut seen = BTreeSet::from([resource]);
    let mut queue = VecDeque::from([resource]);
    while let Some(next) = queue.pop_front() {
        for &dependent in derived(next) {
            if seen.insert(dependent) {
                queue.push_back(dependent);
            }
        }
    }
    seen
}

/// A write issued through the edge proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    Create(Resource),
    Update(Resource),
    Delete(Resource),
    ImportTransactions,
    PayBill,
    ContributeGoal,
    MarkNotificationRead,
    MarkAllNotificationsRead,
}

impl Mutation {
    /// Hand-curated list of resources whose root key must be invalidated
    /// after this mutation succeeds.
    pub fn invalidates(&self) -> &'static [Resource] {
        use Mutation::*;
        use Resource::*;

        match self {
            Create(Accounts) | Update(Accounts) => &[Accounts, Analytics],
            // Deleting an account drops or moves its transactions.
            Delete(Accounts) => &[Accounts, Transactions, Analytics, Budgets],
            Create(Transactions) | Update(Transactions) | Delete(Transactions)
            | ImportTransactions => &[Transactions, Accounts, Analytics, Budgets, Reports],
            Create(Budgets) | Update(Budgets) | Delete(Budgets) => &[Budgets, Analytics],
            Create(Bills) | Update(Bills) | Delete(Bills) => &[Bills, Notifications, Analytics],
            PayBill => &[
                Bills,
                Transactions,
                Accounts,
                Analytics,
                Budgets,
                Reports,
                Notifications,
            ],
            Create(Goals) | Update(Goals) | Delete(Goals) => &[Goals, Analytics],
            ContributeGoal => &[Goals, Transactions, Accounts, Analytics, Budgets, Reports],
            Create(Categories) | Update(Categories) | Delete(Categories) => {
                &[Categories, Transactions, Budgets, Analytics]
            }
            Create(Merchants) | Update(Merchants) | Delete(Merchants) => &[Merchants, Transactions],
            Create(Notifications)
            | Update(Notifications)
            | Delete(Notifications)
            | MarkNotificationRead
            | MarkAllNotificationsRead => &[Notifications],
            Create(Reports) | Update(Reports) | Delete(Reports) => &[Reports],
            Create(Analytics) | Update(Analytics) | Delete(Analytics) => &[Analytics],
            Create(Users) | Update(Users) | Delete(Users) => &[Users, Analytics],
        }
    }

    /// Resources the backend writes directly when handling this mutation.
    pub fn writes(&self) -> Vec<Resource> {
        match self {
            Self::Create(resource) | Self::Update(resource) | Self::Delete(resource) => {
                vec![*resource]
            }
            Self::ImportTransactions => vec![Resource::Transactions],
            Self::PayBill => vec![Resource::Bills, Resource::Transactions],
            Self::ContributeGoal => vec![Resource::Goals, Resource::Transactions],
            Self::MarkNotificationRead | Self::MarkAllNotificationsRead => {
                vec![Resource::Notifications]
            }
        }
    }

    /// Curated list plus the dependency closure of [`Mutation::writes`].
    pub fn invalidation_set(&self) -> BTreeSet<Resource> {
        let mut set: BTreeSet<Resource> = self.invalidates().iter().copied().collect();
        for resource in self.writes() {
            set.extend(dependents_closure(resource));
        }
        set
    }

    /// Root keys to invalidate, one per resource in the invalidation set.
    pub fn invalidation_keys(&self) -> Vec<QueryKey> {
        self.invalidation_set()
            .into_iter()
            .map(|resource| resource.keys().all())
            .collect()
    }

    /// Maps a proxied request onto the mutation it performs.
    ///
    /// `path` is the backend path (`/accounts/42`, optionally with a query
    /// string). Reads and paths outside a known resource yield `None`.
    pub fn classify(method: &str, path: &str) -> Option<Mutation> {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (first, rest) = segments.split_first()?;
        let resource: Resource = first.parse().ok()?;

        let mutation = match (method, resource, rest) {
            ("GET" | "HEAD" | "OPTIONS", _, _) => return None,
            ("POST", Resource::Transactions, ["import"]) => Self::ImportTransactions,
            ("POST", Resource::Bills, [_, "pay"]) => Self::PayBill,
            ("POST", Resource::Goals, [_, "contribute"]) => Self::ContributeGoal,
            ("POST" | "PATCH" | "PUT", Resource::Notifications, ["read-all"]) => {
                Self::MarkAllNotificationsRead
            }
            ("POST" | "PATCH" | "PUT", Resource::Notifications, [_, "read"]) => {
                Self::MarkNotificationRead
            }
            ("POST", resource, []) => Self::Create(resource),
            // Sub-actions such as `POST /reports/7/regenerate`.
            ("POST", resource, _) => Self::Update(resource),
            ("PATCH" | "PUT", resource, _) => Self::Update(resource),
            ("DELETE", resource, _) => Self::Delete(resource),
            _ => return None,
        };
        Some(mutation)
    }
}
