//! Liquidity and investment aggregates over a user's non-rejected transactions.

use postgres_models::models::{to_money, AccountType, Category, CategoryTotal, SubCategory};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sub-categories counted as fixed bills on top of every Bills & Utilities entry.
const FIXED_BILLS: &[SubCategory] = &[SubCategory::Rent, SubCategory::Maintenance, SubCategory::CreditCardPayment];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liquidity {
    pub liquidity: Decimal,
    pub breakdown: LiquidityBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityBreakdown {
    /// Income minus spend from cash and savings accounts.
    pub balance: Decimal,
    pub p2p_in: Decimal,
    pub unbilled_cc: Decimal,
    pub bills: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Investments {
    pub total_investments: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
}

fn sum_where(totals: &[CategoryTotal], keep: impl Fn(&CategoryTotal) -> bool) -> Decimal {
    totals.iter().filter(|t| keep(t)).map(|t| t.total).sum()
}

fn is_bill(total: &CategoryTotal) -> bool {
    total.category == Category::BillsUtilities || FIXED_BILLS.contains(&total.sub_category)
}

/// Bank balance plus peer inflows, minus unbilled card spend and fixed bills.
pub fn liquidity(totals: &[CategoryTotal]) -> Liquidity {
    let total_income = sum_where(totals, |t| t.category == Category::Income);
    let p2p_in = sum_where(totals, |t| {
        t.category == Category::Income && t.sub_category == SubCategory::P2pReceive
    });
    let bank_spend = sum_where(totals, |t| {
        !matches!(t.category, Category::Income | Category::Investment)
            && matches!(t.account_type, AccountType::Savings | AccountType::Cash)
    });
    let unbilled_cc = sum_where(totals, |t| {
        t.category != Category::Income && t.account_type == AccountType::CreditCard
    });
    let bills = sum_where(totals, is_bill);

    let balance = total_income - bank_spend;
    Liquidity {
        liquidity: to_money((balance + p2p_in) - (unbilled_cc + bills)),
        breakdown: LiquidityBreakdown {
            balance: to_money(balance),
            p2p_in: to_money(p2p_in),
            unbilled_cc: to_money(unbilled_cc),
            bills: to_money(bills),
        },
    }
}

/// Investment totals keyed by sub-category display name.
pub fn investments(totals: &[CategoryTotal]) -> Investments {
    let mut breakdown: BTreeMap<String, Decimal> = BTreeMap::new();
    for total in totals.iter().filter(|t| t.category == Category::Investment) {
        *breakdown
            .entry(total.sub_category.as_str().to_string())
            .or_insert(Decimal::ZERO) += total.total;
    }
    let total_investments = to_money(breakdown.values().copied().sum());
    for value in breakdown.values_mut() {
        *value = to_money(*value);
    }

    Investments {
        total_investments,
        breakdown,
    }
}
