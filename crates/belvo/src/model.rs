use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::fields::Fields;

/// Open provider object as returned in a list page.
pub type RawObject = Map<String, Value>;

/// Paginated list envelope. `next` is an absolute URL or `null` on the last
/// page.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<RawObject>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Owner {
    pub id: String,
    pub link: String,
    pub display_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub internal_identification: String,
    pub first_name: String,
    pub last_name: String,
    pub second_last_name: String,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    /// Verbatim provider payload.
    pub raw: RawObject,
}

impl From<RawObject> for Owner {
    fn from(raw: RawObject) -> Self {
        let f = Fields(&raw);

        Owner {
            id: f.string("id"),
            link: f.string("link"),
            display_name: f.string("display_name"),
            email: f.string("email"),
            phone_number: f.string("phone_number"),
            address: f.string("address"),
            internal_identification: f.string("internal_identification"),
            first_name: f.string("first_name"),
            last_name: f.string("last_name"),
            second_last_name: f.string("second_last_name"),
            collected_at: f.timestamp("collected_at"),
            created_at: f.timestamp("created_at"),
            raw,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Institution {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balance {
    pub current: f64,
    pub available: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: String,
    pub link: String,
    pub institution: Option<Institution>,
    pub category: String,
    pub balance_type: String,
    pub ty: String,
    pub name: String,
    pub number: String,
    pub balance: Option<Balance>,
    pub currency: String,
    pub bank_product_id: String,
    pub internal_identification: String,
    pub public_identification_name: String,
    pub public_identification_value: String,
    pub credit_data: Option<RawObject>,
    pub loan_data: Option<RawObject>,
    pub funds_data: Option<RawObject>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub raw: RawObject,
}

impl From<RawObject> for Account {
    fn from(raw: RawObject) -> Self {
        let f = Fields(&raw);

        Account {
            id: f.string("id"),
            link: f.string("link"),
            institution: f.object("institution").map(|i| Institution {
                name: i.string("name"),
                ty: i.string("type"),
            }),
            category: f.string("category"),
            balance_type: f.string("balance_type"),
            ty: f.string("type"),
            name: f.string("name"),
            number: f.string("number"),
            balance: f.object("balance").map(|b| Balance {
                current: b.number("current"),
                available: b.number("available"),
            }),
            currency: f.string("currency"),
            bank_product_id: f.string("bank_product_id"),
            internal_identification: f.string("internal_identification"),
            public_identification_name: f.string("public_identification_name"),
            public_identification_value: f.string("public_identification_value"),
            credit_data: f.owned_object("credit_data"),
            loan_data: f.owned_object("loan_data"),
            funds_data: f.owned_object("funds_data"),
            last_accessed_at: f.timestamp("last_accessed_at"),
            collected_at: f.timestamp("collected_at"),
            created_at: f.timestamp("created_at"),
            raw,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Merchant {
    pub name: String,
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub id: String,
    /// Provider identifier of the owning account.
    pub account: String,
    pub value_date: String,
    pub accounting_date: String,
    pub amount: f64,
    pub balance: f64,
    pub currency: String,
    pub description: String,
    pub observations: String,
    pub merchant: Option<Merchant>,
    pub category: String,
    pub subcategory: String,
    pub reference: String,
    pub ty: String,
    pub status: String,
    pub credit_card_data: Option<RawObject>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub raw: RawObject,
}

impl From<RawObject> for Transaction {
    fn from(raw: RawObject) -> Self {
        let f = Fields(&raw);

        Transaction {
            id: f.string("id"),
            account: f.reference("account"),
            value_date: f.string("value_date"),
            accounting_date: f.string("accounting_date"),
            amount: f.number("amount"),
            balance: f.number("balance"),
            currency: f.string("currency"),
            description: f.string("description"),
            observations: f.string("observations"),
            merchant: f.object("merchant").map(|m| Merchant {
                name: m.string("name"),
                website: m.string("website"),
            }),
            category: f.string("category"),
            subcategory: f.string("subcategory"),
            reference: f.string("reference"),
            ty: f.string("type"),
            status: f.string("status"),
            credit_card_data: f.owned_object("credit_card_data"),
            collected_at: f.timestamp("collected_at"),
            created_at: f.timestamp("created_at"),
            raw,
        }
    }
}
