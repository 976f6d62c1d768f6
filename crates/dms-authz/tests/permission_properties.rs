// Permission evaluation properties against the in-memory store
use async_trait::async_trait;
use dms_authz::legacy::LegacyRoleAdapter;
use dms_authz::models::{DocumentRecord, Group, GroupStatus, NewGroup, ResourceScope, ResourceType, Role, ScopeRestrictions, User, UserStatus};
use dms_authz::store::{GroupRepository, GroupStore, IdentityStore, MemoryStore, ResourceDirectory, StoreError};
use dms_authz::{Authorizer, AuthzError, Capability, GroupPermissionResolver};
use proptest::prelude::*;
use std::sync::Arc;

fn resolver(store: &Arc<MemoryStore>) -> GroupPermissionResolver {
    GroupPermissionResolver::new(store.clone(), store.clone(), store.clone())
}

async fn store_with_users() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_user(User::new(1, "root", Role::Admin, 1)).await.unwrap();
    store.insert_user(User::new(2, "alice", Role::User, 5).with_department(3)).await.unwrap();
    store.insert_user(User::new(3, "bob", Role::Manager, 5)).await.unwrap();
    store
}

async fn grant(store: &MemoryStore, name: &str, capabilities: &[Capability], scope: ScopeRestrictions, user_id: u64) -> Group {
    let group = store
        .insert_group(NewGroup::named(name).with_permissions(capabilities.iter().copied()).with_scope(scope))
        .await
        .unwrap();
    store.add_membership(group.id, user_id).await.unwrap();
    group
}

#[tokio::test]
async fn test_admin_holds_every_capability_without_groups() {
    let store = store_with_users().await;
    let resolver = resolver(&store);

    for capability in Capability::ALL {
        assert!(resolver.has_permission(1, capability).await.unwrap(), "admin denied {}", capability);
        assert!(resolver.can_access_resource(1, capability, ResourceType::Company, 99).await.unwrap());
    }
}

#[tokio::test]
async fn test_user_without_groups_is_denied_everything() {
    let store = store_with_users().await;
    let resolver = resolver(&store);

    for capability in Capability::ALL {
        assert!(!resolver.has_permission(2, capability).await.unwrap());
        assert!(!resolver.can_access_resource(2, capability, ResourceType::Company, 5).await.unwrap());
    }
}

#[tokio::test]
async fn test_unrestricted_group_dominates_restricted_one() {
    let store = store_with_users().await;
    grant(&store, "Everywhere", &[Capability::ViewReports], ScopeRestrictions::unrestricted(), 2).await;
    grant(&store, "Company five", &[Capability::ViewReports], ScopeRestrictions::unrestricted().with_companies([5]), 2).await;
    let resolver = resolver(&store);

    assert!(resolver.can_access_resource(2, Capability::ViewReports, ResourceType::Company, 5).await.unwrap());
    assert!(resolver.can_access_resource(2, Capability::ViewReports, ResourceType::Company, 99).await.unwrap());
}

#[tokio::test]
async fn test_single_restricted_group() {
    let store = store_with_users().await;
    grant(&store, "Company five", &[Capability::ViewReports], ScopeRestrictions::unrestricted().with_companies([5]), 2).await;
    let resolver = resolver(&store);

    assert!(resolver.can_access_resource(2, Capability::ViewReports, ResourceType::Company, 5).await.unwrap());
    assert!(!resolver.can_access_resource(2, Capability::ViewReports, ResourceType::Company, 7).await.unwrap());
}

#[tokio::test]
async fn test_deactivated_user_loses_everything() {
    let store = store_with_users().await;
    grant(&store, "Staff", &Capability::ALL, ScopeRestrictions::unrestricted(), 2).await;
    let resolver = resolver(&store);

    assert!(resolver.has_permission(2, Capability::ViewFiles).await.unwrap());

    store.set_user_status(2, UserStatus::Inactive).await.unwrap();
    store.set_user_status(1, UserStatus::Inactive).await.unwrap();

    for capability in Capability::ALL {
        assert!(!resolver.has_permission(2, capability).await.unwrap());
        assert!(!resolver.has_permission(1, capability).await.unwrap());
    }
}

#[tokio::test]
async fn test_role_and_placement_change_applies_to_next_check() {
    let store = store_with_users().await;
    let adapter = LegacyRoleAdapter::new(store.clone(), store.clone());

    assert!(adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Company, 5).await.unwrap());
    assert!(!adapter.has_permission(2, Capability::UploadFiles).await.unwrap());

    let moved = store.update_user(User::new(2, "alice", Role::Manager, 7)).await.unwrap();
    assert_eq!(moved.status, UserStatus::Active);

    assert!(adapter.has_permission(2, Capability::UploadFiles).await.unwrap());
    assert!(adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Company, 7).await.unwrap());
    assert!(!adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Company, 5).await.unwrap());

    // Promotion to admin short-circuits the group model too
    let resolver = resolver(&store);
    assert!(!resolver.has_permission(2, Capability::ManageCompanies).await.unwrap());
    store.update_user(User::new(2, "alice", Role::Admin, 7)).await.unwrap();
    assert!(resolver.has_permission(2, Capability::ManageCompanies).await.unwrap());
}

#[tokio::test]
async fn test_removing_last_membership_denies_next_check() {
    let store = store_with_users().await;
    let group = grant(&store, "Uploaders", &[Capability::UploadFiles], ScopeRestrictions::unrestricted(), 3).await;
    let resolver = resolver(&store);

    assert!(resolver.has_permission(3, Capability::UploadFiles).await.unwrap());

    store.remove_membership(group.id, 3).await.unwrap();
    assert!(!resolver.has_permission(3, Capability::UploadFiles).await.unwrap());
}

#[tokio::test]
async fn test_editors_and_interns() {
    let store = store_with_users().await;
    grant(&store, "Editors", &[Capability::DownloadFiles], ScopeRestrictions::unrestricted(), 2).await;
    grant(&store, "Interns", &[Capability::ViewFiles], ScopeRestrictions::unrestricted().with_departments([3]), 2).await;
    let resolver = resolver(&store);

    assert!(resolver.has_permission(2, Capability::DownloadFiles).await.unwrap());
    assert!(resolver.can_access_resource(2, Capability::ViewFiles, ResourceType::Department, 3).await.unwrap());
    assert!(!resolver.can_access_resource(2, Capability::ViewFiles, ResourceType::Department, 9).await.unwrap());

    let grants = resolver.effective_grants(2).await.unwrap();
    assert!(grants.is_unrestricted(Capability::DownloadFiles));
    assert!(!grants.is_unrestricted(Capability::ViewFiles));
}

#[tokio::test]
async fn test_inactive_group_grants_nothing() {
    let store = store_with_users().await;
    let group = grant(&store, "Deleters", &[Capability::DeleteFiles], ScopeRestrictions::unrestricted(), 2).await;
    let resolver = resolver(&store);

    store.set_group_status(group.id, GroupStatus::Inactive).await.unwrap();

    assert!(!resolver.has_permission(2, Capability::DeleteFiles).await.unwrap());
    assert!(resolver.effective_grants(2).await.unwrap().grants.is_empty());
}

#[tokio::test]
async fn test_document_needs_one_group_covering_every_dimension() {
    let store = store_with_users().await;
    store
        .insert_document(DocumentRecord {
            id: 40,
            scope: ResourceScope {
                company_id: Some(5),
                department_id: Some(3),
                document_type_id: Some(8),
            },
        })
        .await;
    store
        .insert_document(DocumentRecord {
            id: 41,
            scope: ResourceScope {
                company_id: Some(5),
                department_id: None,
                document_type_id: Some(9),
            },
        })
        .await;

    // Each group covers part of document 40, neither covers all of it
    grant(&store, "Company five", &[Capability::ViewFiles], ScopeRestrictions::unrestricted().with_companies([5]).with_document_types([9]), 2).await;
    grant(&store, "Department three", &[Capability::ViewFiles], ScopeRestrictions::unrestricted().with_departments([3]).with_companies([6]), 2).await;
    let resolver = resolver(&store);

    assert!(!resolver.can_access_resource(2, Capability::ViewFiles, ResourceType::Document, 40).await.unwrap());
    assert!(resolver.can_access_resource(2, Capability::ViewFiles, ResourceType::Document, 41).await.unwrap());
    assert!(!resolver.can_access_resource(2, Capability::ViewFiles, ResourceType::Document, 404).await.unwrap());
}

#[tokio::test]
async fn test_unknown_capability_name_denies() {
    let store = store_with_users().await;
    let resolver = resolver(&store);

    assert!(!resolver.has_permission_named(1, "launch_missiles").await.unwrap());
    assert!(resolver.has_permission_named(1, "view_files").await.unwrap());
}

/// Store whose every read fails
struct BrokenStore;

#[async_trait]
impl IdentityStore for BrokenStore {
    async fn get_user(&self, _user_id: u64) -> Result<User, StoreError> {
        Err(StoreError::Unavailable {
            message: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl GroupStore for BrokenStore {
    async fn get_group(&self, _group_id: u64) -> Result<Group, StoreError> {
        Err(StoreError::Unavailable {
            message: "connection refused".to_string(),
        })
    }

    async fn active_groups_for_user(&self, _user_id: u64) -> Result<Vec<Group>, StoreError> {
        Err(StoreError::Unavailable {
            message: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl ResourceDirectory for BrokenStore {
    async fn document_scope(&self, _document_id: u64) -> Result<ResourceScope, StoreError> {
        Err(StoreError::Unavailable {
            message: "connection refused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_store_fault_is_never_allow() {
    let store = Arc::new(BrokenStore);
    let resolver = GroupPermissionResolver::new(store.clone(), store.clone(), store);

    let err = resolver.has_permission(1, Capability::ViewFiles).await.unwrap_err();
    assert!(matches!(err, AuthzError::ResolverUnavailable { .. }));

    let err = resolver.can_access_resource(1, Capability::ViewFiles, ResourceType::Company, 5).await.unwrap_err();
    assert!(matches!(err, AuthzError::ResolverUnavailable { .. }));
}

proptest! {
    #[test]
    fn prop_unrestricted_company_dimension_allows_any_company(restricted in proptest::collection::btree_set(0u64..50, 1..5), company in 0u64..100) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let allowed = runtime.block_on(async {
            let store = store_with_users().await;
            grant(&store, "Open", &[Capability::ViewFiles], ScopeRestrictions::unrestricted(), 2).await;
            grant(&store, "Closed", &[Capability::ViewFiles], ScopeRestrictions::unrestricted().with_companies(restricted), 2).await;
            resolver(&store).can_access_resource(2, Capability::ViewFiles, ResourceType::Company, company).await.unwrap()
        });
        prop_assert!(allowed);
    }

    #[test]
    fn prop_restricted_company_dimension_matches_membership(restricted in proptest::collection::btree_set(0u64..50, 1..5), company in 0u64..100) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let expected = restricted.contains(&company);
        let allowed = runtime.block_on(async {
            let store = store_with_users().await;
            grant(&store, "Closed", &[Capability::ViewFiles], ScopeRestrictions::unrestricted().with_companies(restricted), 2).await;
            resolver(&store).can_access_resource(2, Capability::ViewFiles, ResourceType::Company, company).await.unwrap()
        });
        prop_assert_eq!(allowed, expected);
    }
}
