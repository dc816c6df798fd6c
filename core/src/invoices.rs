//! `/v1/invoices` operations.

use crate::client::{parse_json, to_json, LexofficeClient};
use crate::error::Result;
use crate::error_response::{ErrorSchema, Resource};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, JSON_CONTENT_TYPE};
use crate::transport::Transport;
use crate::types::{Invoice, ResourceReference};

const SCHEMA: ErrorSchema = Resource::Invoices.error_schema();

impl<T: Transport> LexofficeClient<T> {
    pub fn build_get_invoice(&self, id: &str) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            &format!("/v1/invoices/{}", urlencoding::encode(id)),
            None,
            JSON_CONTENT_TYPE,
        )
    }

    /// `voucher_status` never reaches the body: `Open` becomes
    /// `?finalize=true`, anything else creates a draft.
    pub fn build_create_invoice(&self, invoice: &Invoice) -> Result<HttpRequest> {
        let path = if invoice.requests_finalize() {
            "/v1/invoices?finalize=true"
        } else {
            "/v1/invoices"
        };
        let outgoing = Invoice {
            voucher_status: None,
            ..invoice.clone()
        };
        Ok(self.request(HttpMethod::Post, path, Some(to_json(&outgoing)?), JSON_CONTENT_TYPE))
    }

    pub fn parse_get_invoice(&self, response: HttpResponse) -> Result<Invoice> {
        parse_json(&response, SCHEMA)
    }

    pub fn parse_create_invoice(&self, response: HttpResponse) -> Result<ResourceReference> {
        parse_json(&response, SCHEMA)
    }

    pub fn invoice(&self, id: &str) -> Result<Invoice> {
        let response = self.dispatch(&self.build_get_invoice(id), SCHEMA)?;
        self.parse_get_invoice(response)
    }

    pub fn create_invoice(&self, invoice: &Invoice) -> Result<ResourceReference> {
        let response = self.dispatch(&self.build_create_invoice(invoice)?, SCHEMA)?;
        self.parse_create_invoice(response)
    }
}
