//! Wire shapes for request bodies and response envelopes.
//!
//! Field names are camelCase on the wire. Request bodies tolerate missing
//! fields (empty/zero defaults) so validation reports the real problem.

use contactbook_core::{Contact, ContactId, Gender, Group, GroupId, ListResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactRequest {
    pub phone_number: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub patronymic: String,
    pub age: u8,
    /// `unknown|male|female`; empty means unknown.
    pub gender: String,
}

impl ContactRequest {
    /// Builds a contact record; `id` is generated when absent.
    ///
    /// Returns the rejected gender label on failure.
    pub fn into_contact(self, id: Option<ContactId>) -> Result<Contact, String> {
        let gender = Gender::parse(&self.gender).ok_or_else(|| {
            format!(
                "gender must be one of unknown|male|female, got `{}`",
                self.gender
            )
        })?;
        let mut contact = match id {
            Some(id) => Contact::with_id(id, &self.phone_number),
            None => Contact::new(&self.phone_number),
        };
        contact.email = self.email.trim().to_lowercase();
        contact.name = self.name.trim().to_string();
        contact.surname = self.surname.trim().to_string();
        contact.patronymic = self.patronymic.trim().to_string();
        contact.age = self.age;
        contact.gender = gender;
        Ok(contact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub id: ContactId,
    pub created_at: i64,
    pub modified_at: i64,
    pub phone_number: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub patronymic: String,
    pub full_name: String,
    pub age: u8,
    pub gender: Gender,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            full_name: contact.full_name(),
            id: contact.id,
            created_at: contact.created_at,
            modified_at: contact.modified_at,
            phone_number: contact.phone_number,
            email: contact.email,
            name: contact.name,
            surname: contact.surname,
            patronymic: contact.patronymic,
            age: contact.age,
            gender: contact.gender,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupRequest {
    pub name: String,
    pub description: String,
}

impl GroupRequest {
    pub fn into_group(self, id: Option<GroupId>) -> Group {
        let mut group = Group::new(self.name.trim(), self.description.trim());
        if let Some(id) = id {
            group.id = id;
        }
        group
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub modified_at: i64,
    pub contact_count: u64,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            created_at: group.created_at,
            modified_at: group.modified_at,
            contact_count: group.contact_count,
        }
    }
}

/// Query-string parameters of list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// e.g. `-age,+surname,name`.
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub list: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn from_result<S>(result: ListResult<S>) -> Self
    where
        T: From<S>,
    {
        Self {
            total: result.total,
            limit: result.limit,
            offset: result.offset,
            list: result.items.into_iter().map(T::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub total: u64,
}

/// Ids affected by a membership call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdsResponse {
    pub list: Vec<Uuid>,
}

/// Error body: `id` matches the `request_id` logged for the failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub id: Uuid,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::{ContactRequest, ContactResponse};
    use contactbook_core::Gender;

    #[test]
    fn contact_request_normalizes_and_rejects_unknown_gender() {
        let request = ContactRequest {
            phone_number: "+7 900 111".to_string(),
            email: " Ivan@Mail.RU ".to_string(),
            name: " Ivan ".to_string(),
            surname: "Petrov".to_string(),
            gender: "MALE".to_string(),
            ..ContactRequest::default()
        };
        let contact = request.into_contact(None).unwrap();
        assert_eq!(contact.phone_number, "7900111");
        assert_eq!(contact.email, "ivan@mail.ru");
        assert_eq!(contact.name, "Ivan");
        assert_eq!(contact.gender, Gender::Male);

        let response = ContactResponse::from(contact);
        assert_eq!(response.full_name, "Petrov Ivan");

        let bad = ContactRequest {
            phone_number: "1".to_string(),
            gender: "robot".to_string(),
            ..ContactRequest::default()
        };
        assert!(bad.into_contact(None).unwrap_err().contains("robot"));
    }

    #[test]
    fn responses_use_camel_case_keys() {
        let contact = ContactRequest {
            phone_number: "1".to_string(),
            ..ContactRequest::default()
        }
        .into_contact(None)
        .unwrap();
        let value = serde_json::to_value(ContactResponse::from(contact)).unwrap();
        assert!(value.get("phoneNumber").is_some());
        assert!(value.get("fullName").is_some());
        assert_eq!(value["gender"], "unknown");
    }
}
