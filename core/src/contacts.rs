//! `/v1/contacts` operations.

use tracing::debug;

use crate::client::{parse_json, to_json, LexofficeClient};
use crate::error::Result;
use crate::error_response::{ErrorSchema, Resource};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, JSON_CONTENT_TYPE};
use crate::transport::Transport;
use crate::types::{Contact, ContactsPage, ResourceReference};

const SCHEMA: ErrorSchema = Resource::Contacts.error_schema();

impl<T: Transport> LexofficeClient<T> {
    pub fn build_contacts_page(&self, page: u32) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            &format!("/v1/contacts?page={page}"),
            None,
            JSON_CONTENT_TYPE,
        )
    }

    pub fn build_get_contact(&self, id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &contact_path(id), None, JSON_CONTENT_TYPE)
    }

    pub fn build_create_contact(&self, contact: &Contact) -> Result<HttpRequest> {
        Ok(self.request(
            HttpMethod::Post,
            "/v1/contacts/",
            Some(to_json(contact)?),
            JSON_CONTENT_TYPE,
        ))
    }

    /// `contact.version` must match the stored version.
    pub fn build_update_contact(&self, id: &str, contact: &Contact) -> Result<HttpRequest> {
        Ok(self.request(
            HttpMethod::Put,
            &contact_path(id),
            Some(to_json(contact)?),
            JSON_CONTENT_TYPE,
        ))
    }

    pub fn parse_contacts_page(&self, response: HttpResponse) -> Result<ContactsPage> {
        parse_json(&response, SCHEMA)
    }

    pub fn parse_get_contact(&self, response: HttpResponse) -> Result<Contact> {
        parse_json(&response, SCHEMA)
    }

    pub fn parse_create_contact(&self, response: HttpResponse) -> Result<ResourceReference> {
        parse_json(&response, SCHEMA)
    }

    pub fn parse_update_contact(&self, response: HttpResponse) -> Result<ResourceReference> {
        parse_json(&response, SCHEMA)
    }

    /// Every contact, fetched page by page starting at page 0.
    ///
    /// Stops after the page flagged `last` or the last index below
    /// `totalPages`, so a listing of `n` pages costs exactly `n` requests.
    pub fn contacts(&self) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        let mut page = 0;
        loop {
            let decoded = self.contacts_page(page)?;
            let done = decoded.is_final(page);
            contacts.extend(decoded.content);
            if done {
                break;
            }
            page += 1;
        }
        debug!(count = contacts.len(), pages = page + 1, "listed contacts");
        Ok(contacts)
    }

    pub fn contacts_page(&self, page: u32) -> Result<ContactsPage> {
        let response = self.dispatch(&self.build_contacts_page(page), SCHEMA)?;
        self.parse_contacts_page(response)
    }

    pub fn contact(&self, id: &str) -> Result<Contact> {
        let response = self.dispatch(&self.build_get_contact(id), SCHEMA)?;
        self.parse_get_contact(response)
    }

    pub fn create_contact(&self, contact: &Contact) -> Result<ResourceReference> {
        let response = self.dispatch(&self.build_create_contact(contact)?, SCHEMA)?;
        self.parse_create_contact(response)
    }

    pub fn update_contact(&self, id: &str, contact: &Contact) -> Result<ResourceReference> {
        let response = self.dispatch(&self.build_update_contact(id, contact)?, SCHEMA)?;
        self.parse_update_contact(response)
    }
}

fn contact_path(id: &str) -> String {
    format!("/v1/contacts/{}", urlencoding::encode(id))
}
