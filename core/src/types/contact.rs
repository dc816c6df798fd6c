use serde::{Deserialize, Serialize};

/// A lexoffice contact, used both as request body and as decoded response.
///
/// lexoffice requires exactly one of `company` or `person`. `roles` must
/// name at least one role; an empty [`Role`] marks the contact as customer
/// or vendor and lets lexoffice assign the number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Required on update; lexoffice rejects stale versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub roles: Roles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Addresses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_addresses: Option<EmailAddresses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<PhoneNumbers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl Contact {
    /// A private person with the customer role.
    pub fn person(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            roles: Roles::customer(),
            person: Some(Person {
                salutation: None,
                first_name: Some(first_name.into()),
                last_name: last_name.into(),
            }),
            ..Self::default()
        }
    }

    /// A company with the customer role.
    pub fn company(name: impl Into<String>) -> Self {
        Self {
            roles: Roles::customer(),
            company: Some(Company {
                name: name.into(),
                ..Company::default()
            }),
            ..Self::default()
        }
    }

    /// Company name or the person's full name.
    pub fn display_name(&self) -> Option<String> {
        if let Some(company) = &self.company {
            return Some(company.name.clone());
        }
        self.person.as_ref().map(|person| match &person.first_name {
            Some(first) if !first.is_empty() => format!("{first} {}", person.last_name),
            _ => person.last_name.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Role>,
}

impl Roles {
    pub fn customer() -> Self {
        Self {
            customer: Some(Role::default()),
            vendor: None,
        }
    }

    pub fn vendor() -> Self {
        Self {
            customer: None,
            vendor: Some(Role::default()),
        }
    }
}

/// Customer or vendor role. `number` is assigned by lexoffice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_registration_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_tax_free_invoices: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_persons: Vec<ContactPerson>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salutation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salutation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Addresses {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub billing: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shipping: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// ISO 3166 alpha-2.
    pub country_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailAddresses {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub business: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub office: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneNumbers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub business: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub office: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fax: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
}

/// One page of `GET /v1/contacts`. `number` is the zero-based page index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactsPage {
    pub content: Vec<Contact>,
    pub first: bool,
    pub last: bool,
    pub total_pages: u32,
    pub total_elements: u64,
    pub number_of_elements: u32,
    pub size: u32,
    pub number: u32,
    pub sort: Vec<SortOrder>,
}

impl ContactsPage {
    /// `total_pages` is a count, so the final index is `total_pages - 1`.
    pub fn is_final(&self, requested: u32) -> bool {
        self.last || requested.saturating_add(1) >= self.total_pages
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortOrder {
    pub property: String,
    pub direction: String,
    pub ignore_case: bool,
    pub null_handling: String,
    pub ascending: bool,
}
