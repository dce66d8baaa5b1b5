//! End-to-end decisions through the guard with the built-in roles installed.

use std::sync::Arc;
use warden_authz::bootstrap::{GROUP_ADMIN, MEMBER, PROJECT_ADMIN};
use warden_authz::{
    AuthzGuard, Bootstrap, Denial, DenyReason, Domain, Enforcer, Outcome, RequestInfo,
    RoleAssignment, RoleName, RouteRule, UserId,
};

const ROOT: &str = "user:1";
const GROUP_ADMIN_USER: &str = "user:10";
const PROJECT_ADMIN_USER: &str = "user:20";
const MEMBER_USER: &str = "user:30";

async fn setup() -> (AuthzGuard, Arc<Enforcer>) {
    let enforcer = Enforcer::in_memory();
    let bootstrap = Bootstrap {
        base_policies: true,
        policies: vec![],
        system_admins: vec![UserId::new(ROOT).unwrap()],
    };
    enforcer.seed(&bootstrap).await.unwrap();

    for (user, role, domain) in [
        (GROUP_ADMIN_USER, GROUP_ADMIN, "group:5"),
        (PROJECT_ADMIN_USER, PROJECT_ADMIN, "project:7"),
        (MEMBER_USER, MEMBER, "group:5"),
    ] {
        enforcer
            .assign_role(&RoleAssignment::parse(user, role, domain).unwrap())
            .await
            .unwrap();
    }

    let enforcer = Arc::new(enforcer);
    (AuthzGuard::new(enforcer.clone()), enforcer)
}

async fn decide(guard: &AuthzGuard, rule: RouteRule, user: &str, request: RequestInfo) -> Outcome {
    let user = UserId::new(user).unwrap();
    guard
        .check_at_level(&rule, Some(&user), &request)
        .await
        .expect("in-memory store never fails")
}

#[tokio::test]
async fn test_system_admin_manages_policies() {
    let (guard, _) = setup().await;
    let outcome = decide(
        &guard,
        RouteRule::system(),
        ROOT,
        RequestInfo::new("DELETE", "/api/v1/policies"),
    )
    .await;
    assert!(matches!(outcome, Outcome::Allowed(_)));
}

#[tokio::test]
async fn test_system_admin_role_does_not_leak_into_groups() {
    let (guard, _) = setup().await;
    let request = RequestInfo::new("GET", "/api/v1/groups/5").with_path_param("id", "5");
    let outcome = decide(&guard, RouteRule::group(), ROOT, request).await;
    assert!(matches!(
        outcome,
        Outcome::Denied(Denial {
            reason: DenyReason::NoMatchingPolicy,
            ..
        })
    ));
}

#[tokio::test]
async fn test_group_admin_is_scoped_to_their_group() {
    let (guard, _) = setup().await;

    let own = RequestInfo::new("PUT", "/api/v1/groups/5").with_path_param("id", "5");
    assert!(decide(&guard, RouteRule::group(), GROUP_ADMIN_USER, own)
        .await
        .proceeds());

    let other = RequestInfo::new("PUT", "/api/v1/groups/6").with_path_param("id", "6");
    assert!(!decide(&guard, RouteRule::group(), GROUP_ADMIN_USER, other)
        .await
        .proceeds());

    let system = RequestInfo::new("GET", "/api/v1/policies");
    assert!(!decide(&guard, RouteRule::system(), GROUP_ADMIN_USER, system)
        .await
        .proceeds());
}

#[tokio::test]
async fn test_project_admin_cannot_touch_groups() {
    let (guard, _) = setup().await;

    let project = RequestInfo::new("DELETE", "/api/v1/files/3").with_query_param("project_id", "7");
    assert!(decide(&guard, RouteRule::project(), PROJECT_ADMIN_USER, project)
        .await
        .proceeds());

    let group = RequestInfo::new("GET", "/api/v1/groups/5").with_path_param("id", "5");
    assert!(!decide(&guard, RouteRule::group(), PROJECT_ADMIN_USER, group)
        .await
        .proceeds());
}

#[tokio::test]
async fn test_member_reads_but_does_not_delete() {
    let (guard, _) = setup().await;

    let read = RequestInfo::new("GET", "/api/v1/files").with_query_param("group_id", "5");
    assert!(decide(&guard, RouteRule::group(), MEMBER_USER, read)
        .await
        .proceeds());

    let upload = RequestInfo::new("POST", "/api/v1/files").with_query_param("group_id", "5");
    assert!(decide(&guard, RouteRule::group(), MEMBER_USER, upload)
        .await
        .proceeds());

    let delete = RequestInfo::new("DELETE", "/api/v1/files/4").with_query_param("group_id", "5");
    assert!(!decide(&guard, RouteRule::group(), MEMBER_USER, delete)
        .await
        .proceeds());
}

#[tokio::test]
async fn test_unassigning_revokes_immediately() {
    let (guard, enforcer) = setup().await;
    let assignment = RoleAssignment::parse(MEMBER_USER, MEMBER, "group:5").unwrap();
    enforcer.unassign_role(&assignment).await.unwrap();

    let read = RequestInfo::new("GET", "/api/v1/files").with_query_param("group_id", "5");
    assert!(!decide(&guard, RouteRule::group(), MEMBER_USER, read)
        .await
        .proceeds());
}

#[tokio::test]
async fn test_permissions_listing_matches_decisions() {
    let (_, enforcer) = setup().await;
    let user = UserId::new(MEMBER_USER).unwrap();
    let permissions = enforcer
        .permissions_for(&user, &Domain::group(5))
        .await
        .unwrap();

    assert_eq!(permissions.roles, vec![RoleName::new(MEMBER).unwrap()]);
    assert_eq!(permissions.policies.len(), 5);
    assert!(permissions
        .policies
        .iter()
        .all(|rule| rule.subject.to_string() == MEMBER));

    let elsewhere = enforcer
        .permissions_for(&user, &Domain::group(6))
        .await
        .unwrap();
    assert!(elsewhere.roles.is_empty());
    assert!(elsewhere.policies.is_empty());
}
