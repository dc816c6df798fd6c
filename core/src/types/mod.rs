//! DTOs mirroring the lexoffice JSON schemas.
//!
//! # Design
//! Every struct decodes leniently (`#[serde(default)]`): lexoffice omits
//! empty fields freely, and a missing field should read as its zero value
//! rather than fail the whole response. On the way out, optional fields are
//! `Option`s that are skipped when `None`, so an explicit zero is still sent.

mod contact;
mod invoice;

use serde::{Deserialize, Serialize};

pub use contact::{
    Address, Addresses, Company, Contact, ContactPerson, ContactsPage, EmailAddresses, Person,
    PhoneNumbers, Role, Roles, SortOrder,
};
pub use invoice::{
    Invoice, InvoiceAddress, LineItem, PaymentConditions, PaymentDiscountConditions,
    ShippingConditions, TaxAmount, TaxConditions, TotalPrice, UnitPrice, VoucherStatus,
};

/// Returned by create and update calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceReference {
    pub id: String,
    pub resource_uri: String,
    pub created_date: String,
    pub updated_date: String,
    pub version: i64,
}

/// Returned by file uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReference {
    pub id: String,
}
