//! Synchronous client for the lexoffice accounting API.
//!
//! # Overview
//! Covers contacts, invoices and file uploads. Each operation builds an
//! `HttpRequest`, executes it through a pluggable [`Transport`] and decodes
//! the typed response. Failed requests come back as [`ApiError`] values
//! whose text lists every issue lexoffice reported.
//!
//! ```rust,no_run
//! use lexoffice_core::{Contact, LexofficeClient};
//!
//! # fn main() -> Result<(), lexoffice_core::ApiError> {
//! let client = LexofficeClient::from_env()?;
//! let created = client.create_contact(&Contact::person("Inge", "Musterfrau"))?;
//! let contact = client.contact(&created.id)?;
//! # let _ = contact;
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `LexofficeClient` is stateless beyond its immutable `ClientConfig`.
//! - Every operation is split into `build_*` (produces the request) and
//!   `parse_*` (consumes the response), so the I/O boundary is explicit and
//!   both halves are testable without a network.
//! - lexoffice uses two error body shapes. Each resource declares which one
//!   it speaks ([`Resource::error_schema`]).
//! - Rate limits (429) and gateway errors are retried per [`RetryConfig`].

pub mod client;
pub mod config;
pub mod contacts;
pub mod error;
pub mod error_response;
pub mod files;
pub mod http;
pub mod invoices;
pub mod multipart;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::LexofficeClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{ApiError, Issue, Result};
pub use error_response::{ErrorSchema, Resource};
pub use files::FILE_TYPE_VOUCHER;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use retry::{Backoff, RetryConfig};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    Address, Addresses, Company, Contact, ContactPerson, ContactsPage, EmailAddresses,
    FileReference, Invoice, InvoiceAddress, LineItem, PaymentConditions,
    PaymentDiscountConditions, Person, PhoneNumbers, ResourceReference, Role, Roles,
    ShippingConditions, SortOrder, TaxAmount, TaxConditions, TotalPrice, UnitPrice,
    VoucherStatus,
};
