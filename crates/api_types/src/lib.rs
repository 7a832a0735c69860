use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use resource::Resource;

pub mod resource {
    use std::{fmt, str::FromStr};

    const READ_WRITE: &[&str] = &["GET", "POST", "PATCH", "PUT", "DELETE"];

    /// A named backend entity exposed under `/api/internal/<resource>`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Resource {
        Accounts,
        Transactions,
        Budgets,
        Bills,
        Goals,
        Categories,
        Merchants,
        Notifications,
        Reports,
        Analytics,
        Users,
    }

    impl Resource {
        pub const ALL: [Resource; 11] = [
            Self::Accounts,
            Self::Transactions,
            Self::Budgets,
            Self::Bills,
            Self::Goals,
            Self::Categories,
            Self::Merchants,
            Self::Notifications,
            Self::Reports,
            Self::Analytics,
            Self::Users,
        ];

        /// Path segment used both by the edge routes and by the backend.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Accounts => "accounts",
                Self::Transactions => "transactions",
                Self::Budgets => "budgets",
                Self::Bills => "bills",
                Self::Goals => "goals",
                Self::Categories => "categories",
                Self::Merchants => "merchants",
                Self::Notifications => "notifications",
                Self::Reports => "reports",
                Self::Analytics => "analytics",
                Self::Users => "users",
            }
        }

        /// HTTP methods the edge routes accept for this resource.
        pub fn methods(self) -> &'static [&'static str] {
            match self {
                Self::Accounts
                | Self::Transactions
                | Self::Budgets
                | Self::Bills
                | Self::Goals
                | Self::Categories => READ_WRITE,
                Self::Merchants | Self::Notifications => &["GET", "POST", "PATCH", "DELETE"],
                Self::Reports => &["GET", "POST", "DELETE"],
                Self::Analytics => &["GET"],
                Self::Users => &["GET", "PATCH", "PUT"],
            }
        }

        pub fn allows(self, method: &str) -> bool {
            self.methods().contains(&method)
        }
    }

    impl fmt::Display for Resource {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UnknownResource(pub String);

    impl fmt::Display for UnknownResource {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "unknown resource \"{}\"", self.0)
        }
    }

    impl std::error::Error for UnknownResource {}

    impl FromStr for Resource {
        type Err = UnknownResource;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::ALL
                .into_iter()
                .find(|resource| resource.as_str() == s)
                .ok_or_else(|| UnknownResource(s.to_string()))
        }
    }
}

pub mod envelope {
    use super::*;

    /// Error code the edge proxy uses for every transport failure.
    pub const PROXY_ERROR: &str = "PROXY_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ErrorBody {
        pub message: String,
        pub code: String,
    }

    /// Response wrapper shared by the backend and the edge proxy.
    ///
    /// `data` is always serialized, as `null` on failures.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Envelope<T> {
        pub success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<ErrorBody>,
        pub data: Option<T>,
    }

    impl<T> Envelope<T> {
        pub fn ok(data: T) -> Self {
            Self {
                success: true,
                error: None,
                data: Some(data),
            }
        }

        pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
            Self {
                success: false,
                error: Some(ErrorBody {
                    message: message.into(),
                    code: code.into(),
                }),
                data: None,
            }
        }
    }
}

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountType {
        Checking,
        Savings,
        CreditCard,
        Cash,
        Investment,
        Loan,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Account {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub account_type: AccountType,
        pub currency: String,
        pub balance_minor: i64,
        #[serde(default)]
        pub is_archived: bool,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    /// Request body for creating an account.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AccountNew {
        pub name: String,
        #[serde(rename = "type")]
        pub account_type: AccountType,
        pub currency: String,
        /// Opening balance, defaults to zero on the backend.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub initial_balance_minor: Option<i64>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionType {
        Income,
        Expense,
        Transfer,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Transaction {
        pub id: String,
        pub account_id: String,
        #[serde(rename = "type")]
        pub transaction_type: TransactionType,
        /// Always positive; the type carries the sign.
        pub amount_minor: i64,
        pub currency: String,
        pub description: Option<String>,
        pub category_id: Option<String>,
        pub merchant_id: Option<String>,
        /// Counterpart account for transfers.
        pub transfer_account_id: Option<String>,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionNew {
        pub account_id: String,
        #[serde(rename = "type")]
        pub transaction_type: TransactionType,
        pub amount_minor: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub transfer_account_id: Option<String>,
        pub occurred_at: DateTime<Utc>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BudgetPeriod {
        Weekly,
        Monthly,
        Yearly,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Budget {
        pub id: String,
        pub name: String,
        pub category_id: Option<String>,
        pub period: BudgetPeriod,
        pub limit_minor: i64,
        /// Derived by the backend from the period's transactions.
        pub spent_minor: i64,
        pub currency: String,
        pub start_date: NaiveDate,
    }
}

pub mod bill {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BillStatus {
        Upcoming,
        Due,
        Overdue,
        Paid,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Bill {
        pub id: String,
        pub name: String,
        pub amount_minor: i64,
        pub currency: String,
        pub due_date: NaiveDate,
        pub status: BillStatus,
        pub account_id: Option<String>,
        #[serde(default)]
        pub recurring: bool,
    }
}

pub mod goal {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GoalStatus {
        Active,
        Completed,
        Paused,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Goal {
        pub id: String,
        pub name: String,
        pub target_minor: i64,
        pub saved_minor: i64,
        pub currency: String,
        pub deadline: Option<NaiveDate>,
        pub status: GoalStatus,
    }
}

pub mod category {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum CategoryKind {
        Income,
        Expense,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Category {
        pub id: String,
        pub name: String,
        pub kind: CategoryKind,
        pub parent_id: Option<String>,
        pub color: Option<String>,
    }
}

pub mod merchant {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Merchant {
        pub id: String,
        pub name: String,
        pub default_category_id: Option<String>,
    }
}

pub mod notification {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum NotificationKind {
        BillDue,
        BudgetExceeded,
        GoalReached,
        LowBalance,
        System,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Notification {
        pub id: String,
        pub kind: NotificationKind,
        pub title: String,
        pub message: String,
        pub read: bool,
        pub created_at: DateTime<Utc>,
    }
}

pub mod report {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ReportStatus {
        Pending,
        Ready,
        Failed,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Report {
        pub id: String,
        pub name: String,
        pub status: ReportStatus,
        pub period_start: NaiveDate,
        pub period_end: NaiveDate,
        pub created_at: DateTime<Utc>,
    }
}

pub mod user {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct User {
        pub id: String,
        pub email: String,
        pub name: Option<String>,
        /// ISO currency code used for aggregated views.
        pub base_currency: String,
        pub locale: Option<String>,
    }
}
