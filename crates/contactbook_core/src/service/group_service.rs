//! Group use-case service.
//!
//! # Responsibility
//! - Provide group CRUD APIs.
//! - Expose membership engine operations (bulk create into group, add,
//!   remove, list members) with argument checks.
//!
//! # Invariants
//! - Archival always goes through the membership engine so rows and count
//!   are cleared together.
//! - Batches passed to the engine are never empty.

use super::{ListResult, ServiceError, ServiceResult};
use crate::context::RequestContext;
use crate::model::contact::{Contact, ContactId};
use crate::model::group::{Group, GroupId};
use crate::options::StoreOptions;
use crate::repo::group_repo::GroupRepository;
use crate::repo::membership_repo::MembershipRepository;
use crate::repo::query::ListQuery;
use crate::repo::RepoError;

/// Group service facade composed from group storage and the membership engine.
pub struct GroupService<G: GroupRepository, M: MembershipRepository> {
    groups: G,
    members: M,
    options: StoreOptions,
}

impl<G: GroupRepository, M: MembershipRepository> GroupService<G, M> {
    pub fn new(groups: G, members: M, options: StoreOptions) -> Self {
        Self {
            groups,
            members,
            options: options.sanitized(),
        }
    }

    pub fn create_group(&self, ctx: &RequestContext, group: &Group) -> ServiceResult<Group> {
        Ok(self.groups.create_group(ctx, group)?)
    }

    /// Replaces name and description; the count is left untouched.
    pub fn update_group(&self, ctx: &RequestContext, group: &Group) -> ServiceResult<Group> {
        Ok(self.groups.update_group(ctx, group)?)
    }

    pub fn get_group(&self, ctx: &RequestContext, id: GroupId) -> ServiceResult<Group> {
        self.groups
            .get_group(ctx, id)?
            .ok_or(ServiceError::Repo(RepoError::GroupNotFound(id)))
    }

    pub fn list_groups(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> ServiceResult<ListResult<Group>> {
        let page = self.groups.list_groups(ctx, query)?;
        Ok(ListResult {
            items: page.items,
            total: page.total,
            limit: self.options.normalize_limit(query.limit),
            offset: query.offset,
        })
    }

    pub fn count_groups(&self, ctx: &RequestContext) -> ServiceResult<u64> {
        Ok(self.groups.count_groups(ctx)?)
    }

    /// Archives a group and removes all of its memberships.
    pub fn archive_group(&self, ctx: &RequestContext, id: GroupId) -> ServiceResult<()> {
        Ok(self.members.on_group_archived(ctx, id)?)
    }

    /// Creates contacts and links them to the group in one transaction.
    pub fn create_contacts_into_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contacts: &[Contact],
    ) -> ServiceResult<Vec<Contact>> {
        if contacts.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "at least one contact is required".to_string(),
            ));
        }
        Ok(self
            .members
            .create_contacts_into_group(ctx, group_id, contacts)?)
    }

    /// Links existing contacts; returns only the newly linked ids.
    pub fn add_contacts_to_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_ids: &[ContactId],
    ) -> ServiceResult<Vec<ContactId>> {
        if contact_ids.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "at least one contact id is required".to_string(),
            ));
        }
        Ok(self
            .members
            .add_contacts_to_group(ctx, group_id, contact_ids)?)
    }

    pub fn remove_contact_from_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_id: ContactId,
    ) -> ServiceResult<()> {
        Ok(self
            .members
            .remove_contact_from_group(ctx, group_id, contact_id)?)
    }

    pub fn list_group_members(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
    ) -> ServiceResult<Vec<ContactId>> {
        Ok(self.members.list_group_members(ctx, group_id)?)
    }
}
