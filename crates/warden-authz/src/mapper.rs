//! HTTP method and path to action/resource mapping.

use crate::types::{Action, Resource};
use serde::{Deserialize, Serialize};

/// Path segment that names the resource by default: `/api/v1/<resource>/...`.
pub const DEFAULT_RESOURCE_SEGMENT: usize = 2;

/// Map an HTTP method to an action verb. Unknown methods map to `*`.
pub fn action_for_method(method: &str) -> Action {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Action::read(),
        "POST" => Action::create(),
        "PUT" | "PATCH" => Action::update(),
        "DELETE" => Action::delete(),
        _ => Action::any(),
    }
}

/// Pick the resource at `index` among the non-empty path segments.
///
/// A path that is too short, or a segment that is not a valid resource token,
/// yields `*`.
pub fn resource_from_path(path: &str, index: usize) -> Resource {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .nth(index)
        .and_then(|segment| Resource::new(segment).ok())
        .unwrap_or_else(Resource::any)
}

/// Stateless mapper configured with the resource segment index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMapper {
    pub segment_index: usize,
}

impl ResourceMapper {
    pub fn new(segment_index: usize) -> Self {
        Self { segment_index }
    }

    pub fn action(&self, method: &str) -> Action {
        action_for_method(method)
    }

    /// An explicit resource always wins over the path-derived one.
    pub fn resource(&self, path: &str, explicit: Option<&Resource>) -> Resource {
        match explicit {
            Some(resource) => resource.clone(),
            None => resource_from_path(path, self.segment_index),
        }
    }
}

impl Default for ResourceMapper {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_SEGMENT)
    }
}
