//! Route access policy keyed on the token's role claim.
//!
//! Checked before handler dispatch. Unknown routes fall back to admin-only.

use super::Role;

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Roles(&'static [Role]),
}

const STAFF: &[Role] = &[Role::Admin, Role::SupportAgent];
const ANY_ROLE: &[Role] = &[Role::Admin, Role::SupportAgent, Role::Customer];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Ordered most-specific first; the first matching prefix wins.
const ROUTE_TABLE: &[(&str, RouteAccess)] = &[
    ("/health", RouteAccess::Public),
    ("/auth/login", RouteAccess::Public),
    ("/conversations/log", RouteAccess::Public),
    ("/conversations", RouteAccess::Roles(STAFF)),
    ("/voice", RouteAccess::Roles(ANY_ROLE)),
];

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn required_access(path: &str) -> RouteAccess {
    ROUTE_TABLE
        .iter()
        .find(|(prefix, _)| matches_prefix(path, prefix))
        .map(|(_, access)| *access)
        .unwrap_or(RouteAccess::Roles(ADMIN_ONLY))
}

pub fn is_route_allowed(role: Role, path: &str) -> bool {
    match required_access(path) {
        RouteAccess::Public => true,
        RouteAccess::Roles(roles) => roles.contains(&role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_and_health_are_public() {
        assert_eq!(required_access("/conversations/log"), RouteAccess::Public);
        assert_eq!(required_access("/health"), RouteAccess::Public);
        assert_eq!(required_access("/auth/login"), RouteAccess::Public);
    }

    #[test]
    fn test_staff_can_read_conversations() {
        for path in [
            "/conversations",
            "/conversations/search",
            "/conversations/analytics/dashboard",
            "/conversations/6f1c2d3e-0000-4000-8000-000000000000",
        ] {
            assert!(is_route_allowed(Role::Admin, path), "{path}");
            assert!(is_route_allowed(Role::SupportAgent, path), "{path}");
            assert!(!is_route_allowed(Role::Customer, path), "{path}");
        }
    }

    #[test]
    fn test_customers_reach_voice_bootstrap() {
        assert!(is_route_allowed(Role::Customer, "/voice/signed-url"));
        assert!(is_route_allowed(Role::Customer, "/voice/config"));
    }

    #[test]
    fn test_prefix_match_respects_segments() {
        // "/conversations/logs" is not the webhook and "/conversationsx" is not a conversation route
        assert_eq!(
            required_access("/conversations/logs"),
            RouteAccess::Roles(STAFF)
        );
        assert_eq!(
            required_access("/conversationsx"),
            RouteAccess::Roles(ADMIN_ONLY)
        );
    }

    #[test]
    fn test_unknown_routes_are_admin_only() {
        assert!(is_route_allowed(Role::Admin, "/admin/users"));
        assert!(!is_route_allowed(Role::SupportAgent, "/admin/users"));
    }
}
