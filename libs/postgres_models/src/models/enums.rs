use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stored or submitted string that is not a member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed enumeration persisted as a text column.
///
/// The text form is used for serde, `Display`/`FromStr` and the diesel codec,
/// so an unknown value is rejected wherever it crosses a boundary.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, AsExpression, FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse()?)
            }
        }
    };
}

text_enum! {
    Category {
        Housing => "Housing",
        BillsUtilities => "Bills & Utilities",
        FoodDining => "Food & Dining",
        Transport => "Transport",
        Investment => "Investment",
        Shopping => "Shopping",
        Leisure => "Leisure",
        HealthCare => "Health Care",
        SocialGiving => "Social & Giving",
        DebtCc => "Debt & CC",
        Income => "Income",
        Uncategorized => "Uncategorized",
    }
}

text_enum! {
    SubCategory {
        Rent => "Rent",
        Maintenance => "Maintenance",
        HomeImprovement => "Home Improvement",
        Electricity => "Electricity",
        Water => "Water",
        Internet => "Internet",
        MobileRecharge => "Mobile Recharge",
        Gas => "Gas / LPG",
        Groceries => "Groceries",
        Restaurants => "Restaurants",
        Coffee => "Coffee",
        Delivery => "Delivery",
        Fuel => "Fuel",
        PublicTransport => "Public Transport",
        RideSharing => "Ride Sharing",
        Service => "Service",
        Sip => "SIP",
        MutualFunds => "Mutual Funds",
        FixedDeposit => "Fixed Deposit (FD)",
        RecurringDeposit => "Recurring Deposit (RD)",
        Stocks => "Stocks",
        Clothing => "Clothing",
        Electronics => "Electronics",
        PersonalCare => "Personal Care",
        Travel => "Travel",
        Movies => "Movies",
        Subscriptions => "Subscriptions",
        Hobbies => "Hobbies",
        Medical => "Medical",
        Pharmacy => "Pharmacy",
        Hospital => "Hospital",
        HealthInsurance => "Health Insurance",
        Gift => "Gift",
        Donation => "Donation",
        Charity => "Charity",
        CreditCardPayment => "Credit Card Payment",
        LoanEmi => "Loan EMI",
        P2pLoanOut => "P2P Loan Out",
        Salary => "Salary",
        Freelance => "Freelance",
        Interest => "Interest",
        P2pReceive => "P2P Receive",
        Uncategorized => "Uncategorized",
    }
}

text_enum! {
    TransactionStatus {
        Pending => "PENDING",
        Verified => "VERIFIED",
        Rejected => "REJECTED",
    }
}

text_enum! {
    AccountType {
        Savings => "SAVINGS",
        CreditCard => "CREDIT_CARD",
        Cash => "CASH",
    }
}

text_enum! {
    SyncStatus {
        InProgress => "IN_PROGRESS",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
}

text_enum! {
    TriggerSource {
        Webhook => "WEBHOOK",
        Manual => "MANUAL",
    }
}

impl Category {
    /// Sub-categories a transaction in this category may carry.
    pub fn sub_categories(&self) -> &'static [SubCategory] {
        use SubCategory::*;
        match self {
            Category::Housing => &[Rent, Maintenance, HomeImprovement],
            Category::BillsUtilities => &[Electricity, Water, Internet, MobileRecharge, Gas],
            Category::FoodDining => &[Groceries, Restaurants, Coffee, Delivery],
            Category::Transport => &[Fuel, PublicTransport, RideSharing, Service],
            Category::Investment => &[Sip, MutualFunds, FixedDeposit, RecurringDeposit, Stocks],
            Category::Shopping => &[Clothing, Electronics, PersonalCare],
            Category::Leisure => &[Travel, Movies, Subscriptions, Hobbies],
            Category::HealthCare => &[Medical, Pharmacy, Hospital, HealthInsurance],
            Category::SocialGiving => &[Gift, Donation, Charity],
            Category::DebtCc => &[CreditCardPayment, LoanEmi, P2pLoanOut],
            Category::Income => &[Salary, Freelance, Interest, P2pReceive],
            Category::Uncategorized => &[Uncategorized],
        }
    }

    pub fn allows(&self, sub_category: SubCategory) -> bool {
        self.sub_categories().contains(&sub_category)
    }
}

/// Resolves an untrusted category pair (e.g. from a model response) into a
/// valid one. Anything unknown or mismatched collapses to Uncategorized.
pub fn coerce_category_pair(category: Option<&str>, sub_category: Option<&str>) -> (Category, SubCategory) {
    let category = category.and_then(|c| c.trim().parse::<Category>().ok());
    let sub_category = sub_category.and_then(|s| s.trim().parse::<SubCategory>().ok());

    match (category, sub_category) {
        (Some(category), Some(sub_category)) if category.allows(sub_category) => (category, sub_category),
        _ => (Category::Uncategorized, SubCategory::Uncategorized),
    }
}
