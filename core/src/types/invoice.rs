use serde::{Deserialize, Serialize};

/// Lifecycle state of a voucher.
///
/// Only meaningful on the way in: lexoffice has no status input field, so
/// `create_invoice` strips it and maps [`VoucherStatus::Open`] to
/// `?finalize=true` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Draft,
    Open,
    Paid,
    PaidOff,
    Voided,
    Transferred,
    SepaDebit,
    #[serde(other)]
    Unknown,
}

/// An invoice as sent to and returned by `/v1/invoices`.
///
/// Required by lexoffice and therefore always serialized: `voucherDate`,
/// `address`, `lineItems`, `totalPrice`, `taxConditions` and
/// `shippingConditions`. An empty `line_items` goes out as `[]`, never
/// `null`; lexoffice reports either as a missing field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Invoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_status: Option<VoucherStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_number: Option<String>,
    pub voucher_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub address: InvoiceAddress,
    pub line_items: Vec<LineItem>,
    pub total_price: TotalPrice,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tax_amounts: Vec<TaxAmount>,
    pub tax_conditions: TaxConditions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_conditions: Option<PaymentConditions>,
    pub shipping_conditions: ShippingConditions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl Invoice {
    pub fn requests_finalize(&self) -> bool {
        self.voucher_status == Some(VoucherStatus::Open)
    }
}

/// Recipient. Either `contact_id` or `name` plus postal fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `custom`, `material`, `service` or `text`.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    /// Absent on `text` items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<UnitPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_item_amount: Option<f64>,
}

impl LineItem {
    pub fn custom(name: impl Into<String>, quantity: f64, unit_name: impl Into<String>, unit_price: UnitPrice) -> Self {
        Self {
            kind: "custom".to_string(),
            name: name.into(),
            quantity: Some(quantity),
            unit_name: Some(unit_name.into()),
            unit_price: Some(unit_price),
            ..Self::default()
        }
    }
}

/// Either `net_amount` or `gross_amount` is given, matching `taxConditions.taxType`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnitPrice {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_amount: Option<f64>,
    pub tax_rate_percentage: f64,
}

impl UnitPrice {
    pub fn net(currency: impl Into<String>, net_amount: f64, tax_rate_percentage: f64) -> Self {
        Self {
            currency: currency.into(),
            net_amount: Some(net_amount),
            gross_amount: None,
            tax_rate_percentage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TotalPrice {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_net_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_gross_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tax_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_discount_absolute: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_discount_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxAmount {
    pub tax_rate_percentage: f64,
    pub tax_amount: f64,
    pub net_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxConditions {
    /// `net`, `gross`, `vatfree`, ...
    pub tax_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_type_note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_term_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_term_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_discount_conditions: Option<PaymentDiscountConditions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentDiscountConditions {
    pub discount_percentage: f64,
    pub discount_range: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_end_date: Option<String>,
    /// `service`, `delivery`, `none`, ...
    pub shipping_type: String,
}
