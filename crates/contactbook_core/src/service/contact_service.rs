//! Contact use-case service.
//!
//! # Responsibility
//! - Provide contact create/update/get/list/count/archive APIs.
//! - Turn a missing record on `get` into a not-found error.
//!
//! # Invariants
//! - A create batch is never empty.
//! - Archive cascades into group counts inside the repository transaction.

use super::{ListResult, ServiceError, ServiceResult};
use crate::context::RequestContext;
use crate::model::contact::{Contact, ContactId};
use crate::model::group::GroupId;
use crate::options::StoreOptions;
use crate::repo::contact_repo::ContactRepository;
use crate::repo::query::ListQuery;
use crate::repo::RepoError;

/// Contact service facade over repository implementations.
pub struct ContactService<R: ContactRepository> {
    repo: R,
    options: StoreOptions,
}

impl<R: ContactRepository> ContactService<R> {
    pub fn new(repo: R, options: StoreOptions) -> Self {
        Self {
            repo,
            options: options.sanitized(),
        }
    }

    /// Creates a batch of contacts atomically.
    pub fn create_contacts(
        &self,
        ctx: &RequestContext,
        contacts: &[Contact],
    ) -> ServiceResult<Vec<Contact>> {
        if contacts.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "at least one contact is required".to_string(),
            ));
        }
        Ok(self.repo.create_contacts(ctx, contacts)?)
    }

    /// Replaces every profile field of an active contact.
    pub fn update_contact(&self, ctx: &RequestContext, contact: &Contact) -> ServiceResult<Contact> {
        Ok(self.repo.update_contact(ctx, contact)?)
    }

    pub fn get_contact(&self, ctx: &RequestContext, id: ContactId) -> ServiceResult<Contact> {
        self.repo
            .get_contact(ctx, id)?
            .ok_or(ServiceError::Repo(RepoError::ContactNotFound(id)))
    }

    /// Lists one page of active contacts with the active total.
    pub fn list_contacts(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> ServiceResult<ListResult<Contact>> {
        let page = self.repo.list_contacts(ctx, query)?;
        Ok(ListResult {
            items: page.items,
            total: page.total,
            limit: self.options.normalize_limit(query.limit),
            offset: query.offset,
        })
    }

    pub fn count_contacts(&self, ctx: &RequestContext) -> ServiceResult<u64> {
        Ok(self.repo.count_contacts(ctx)?)
    }

    /// Archives a contact; returns the groups whose count was recomputed.
    pub fn archive_contact(
        &self,
        ctx: &RequestContext,
        id: ContactId,
    ) -> ServiceResult<Vec<GroupId>> {
        Ok(self.repo.archive_contact(ctx, id)?)
    }
}
