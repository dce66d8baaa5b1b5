//! Domain resolution for the three authorization levels.

use crate::request::RequestInfo;
use crate::types::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope family a route is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    System,
    Group,
    Project,
}

impl Level {
    /// Query parameter consulted when the path carries no `id`.
    pub fn query_param(&self) -> Option<&'static str> {
        match self {
            Self::System => None,
            Self::Group => Some("group_id"),
            Self::Project => Some("project_id"),
        }
    }

    fn domain_for(&self, id: u64) -> Domain {
        match self {
            Self::System => Domain::System,
            Self::Group => Domain::group(id),
            Self::Project => Domain::project(id),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Group => f.write_str("group"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// Path parameter holding the group or project id.
pub const ID_PATH_PARAM: &str = "id";

fn positive_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().filter(|id| *id > 0)
}

/// Resolve the concrete domain for `level`.
///
/// Returns `None` ("no domain") when a group or project level finds no
/// positive integer id in the `id` path parameter or the level's query
/// parameter. Malformed ids are treated the same as missing ones.
pub fn resolve_domain(level: Level, request: &RequestInfo) -> Option<Domain> {
    if level == Level::System {
        return Some(Domain::System);
    }

    let from_path = request.path_param(ID_PATH_PARAM).and_then(positive_id);
    let from_query = || {
        level
            .query_param()
            .and_then(|name| request.query_param(name))
            .and_then(positive_id)
    };

    from_path.or_else(from_query).map(|id| level.domain_for(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_level_is_always_system() {
        let request = RequestInfo::new("GET", "/api/v1/policies").with_path_param("id", "7");
        assert_eq!(resolve_domain(Level::System, &request), Some(Domain::System));
    }

    #[test]
    fn test_path_param_wins_over_query() {
        let request = RequestInfo::new("GET", "/api/v1/groups/5/files")
            .with_path_param("id", "5")
            .with_query_param("group_id", "9");
        assert_eq!(resolve_domain(Level::Group, &request), Some(Domain::group(5)));
    }

    #[test]
    fn test_query_param_fallback_per_level() {
        let request = RequestInfo::new("GET", "/api/v1/files")
            .with_query_param("group_id", "3")
            .with_query_param("project_id", "8");
        assert_eq!(resolve_domain(Level::Group, &request), Some(Domain::group(3)));
        assert_eq!(resolve_domain(Level::Project, &request), Some(Domain::project(8)));
    }

    #[test]
    fn test_malformed_path_id_falls_through_to_query() {
        let request = RequestInfo::new("GET", "/api/v1/groups/abc")
            .with_path_param("id", "abc")
            .with_query_param("group_id", "4");
        assert_eq!(resolve_domain(Level::Group, &request), Some(Domain::group(4)));
    }

    #[test]
    fn test_no_usable_id_is_no_domain() {
        let request = RequestInfo::new("GET", "/api/v1/files")
            .with_path_param("id", "0")
            .with_query_param("group_id", "-2");
        assert_eq!(resolve_domain(Level::Group, &request), None);
        assert_eq!(resolve_domain(Level::Project, &RequestInfo::new("GET", "/")), None);
    }

    #[test]
    fn test_padded_or_signed_ids_are_rejected() {
        for raw in [" 5", "5 ", "+5", "5.0"] {
            let request = RequestInfo::new("GET", "/api/v1/files").with_query_param("group_id", raw);
            assert_eq!(resolve_domain(Level::Group, &request), None, "{:?}", raw);
        }
    }

    #[test]
    fn test_ids_are_formatted_canonically() {
        let request = RequestInfo::new("GET", "/api/v1/groups/05").with_path_param("id", "05");
        assert_eq!(
            resolve_domain(Level::Group, &request).map(|d| d.to_string()),
            Some("group:5".to_string())
        );
    }
}
