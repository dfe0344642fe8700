use serde::{Deserialize, Serialize};

use super::expr::Field;
use super::value::Value;

/// A classification target. Two categories are the same category when their
/// ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Category {}

/// A stored, customer-scoped rule: when `condition_expression` holds for a
/// transaction, the transaction belongs to `category`.
///
/// Only active rules take part in compilation. Records are owned by the rule
/// store; the engine never modifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: i64,
    pub name: String,
    pub condition_expression: String,
    pub priority: i32,
    pub active: bool,
    pub customer_id: String,
    pub category: Option<Category>,
}

impl RuleRecord {
    /// An active rule with the given condition, priority and category.
    pub fn new(
        id: i64,
        customer_id: impl Into<String>,
        condition_expression: impl Into<String>,
        priority: i32,
        category: Category,
    ) -> Self {
        let name = category.name.clone();
        Self {
            id,
            name,
            condition_expression: condition_expression.into(),
            priority,
            active: true,
            customer_id: customer_id.into(),
            category: Some(category),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A transaction to classify. Classification only ever writes `category`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub merchant_type: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Transaction {
    pub fn new(merchant_type: impl Into<String>, amount: f64) -> Self {
        Self {
            merchant_type: Some(merchant_type.into()),
            amount,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Read a field as a condition [`Value`]. Unset strings read as `Null`.
    #[must_use]
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Amount => Value::Number(self.amount),
            Field::Merchant => self.merchant.as_deref().into(),
            Field::MerchantType => self.merchant_type.as_deref().into(),
            Field::Location => self.location.as_deref().into(),
            Field::Category => self.category.as_deref().into(),
        }
    }
}
