//! Authorization vocabulary.
//!
//! Every string that enters the engine is wrapped in one of these types at the
//! boundary. The wire and storage form stays a plain string; serde goes through
//! `TryFrom<String>` / `Into<String>` so malformed input is rejected on
//! deserialization.

use crate::error::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wildcard token accepted in policy fields.
pub const WILDCARD: &str = "*";

/// Prefix that marks a user subject.
pub const USER_PREFIX: &str = "user:";

/// Longest stored form of any identifier; matches the `authz_rules` columns.
pub const MAX_IDENTIFIER_LEN: usize = 256;

fn fits_column(stored: &str) -> bool {
    stored.len() <= MAX_IDENTIFIER_LEN
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Identifier of an authenticated user.
///
/// Parses from either `42` or `user:42`; always displays as `user:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl AsRef<str>) -> AuthzResult<Self> {
        let raw = id.as_ref();
        let id = raw.strip_prefix(USER_PREFIX).unwrap_or(raw);
        if id.is_empty()
            || USER_PREFIX.len() + id.len() > MAX_IDENTIFIER_LEN
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
        {
            return Err(AuthzError::invalid("user id", raw));
        }
        Ok(Self(id.to_string()))
    }

    /// The bare id, without the `user:` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The policy subject that names this user directly.
    pub fn subject(&self) -> Subject {
        Subject::User(self.clone())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", USER_PREFIX, self.0)
    }
}

impl FromStr for UserId {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.to_string()
    }
}

/// Name of a role, e.g. `GROUP_ADMIN` or `MEMBER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> AuthzResult<Self> {
        let name = name.into();
        if name.is_empty()
            || !fits_column(&name)
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthzError::invalid("role name", name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoleName {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoleName {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

/// The entity a policy grants rights to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    User(UserId),
    Role(RoleName),
}

impl Subject {
    pub fn user(id: impl AsRef<str>) -> AuthzResult<Self> {
        UserId::new(id).map(Self::User)
    }

    pub fn role(name: impl Into<String>) -> AuthzResult<Self> {
        RoleName::new(name).map(Self::Role)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => user.fmt(f),
            Self::Role(role) => role.fmt(f),
        }
    }
}

impl FromStr for Subject {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(USER_PREFIX) {
            UserId::new(s).map(Self::User)
        } else {
            RoleName::new(s).map(Self::Role)
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.to_string()
    }
}

/// Authorization scope.
///
/// Ids are kept verbatim: `group:05` and `group:5` are different domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Domain {
    System,
    Group(String),
    Project(String),
    /// Wildcard; only valid in policy tuples and inheritance edges.
    Any,
}

impl Domain {
    pub fn group(id: u64) -> Self {
        Self::Group(id.to_string())
    }

    pub fn project(id: u64) -> Self {
        Self::Project(id.to_string())
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Any)
    }

    /// Treats `self` as a stored pattern and tests it against a query domain.
    pub fn matches(&self, query: &Domain) -> bool {
        matches!(self, Self::Any) || self == query
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Group(id) => write!(f, "group:{}", id),
            Self::Project(id) => write!(f, "project:{}", id),
            Self::Any => f.write_str(WILDCARD),
        }
    }
}

impl FromStr for Domain {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => return Ok(Self::System),
            WILDCARD => return Ok(Self::Any),
            _ if !fits_column(s) => return Err(AuthzError::invalid("domain", s)),
            _ => {}
        }

        match s.split_once(':') {
            Some(("group", id)) if is_digits(id) => Ok(Self::Group(id.to_string())),
            Some(("project", id)) if is_digits(id) => Ok(Self::Project(id.to_string())),
            _ => Err(AuthzError::invalid("domain", s)),
        }
    }
}

impl TryFrom<String> for Domain {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.to_string()
    }
}

/// Resource kind, e.g. `file` or `projects`, or the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resource(String);

impl Resource {
    pub fn new(name: impl Into<String>) -> AuthzResult<Self> {
        let name = name.into();
        if name == WILDCARD
            || (!name.is_empty() && fits_column(&name) && name.chars().all(is_token_char))
        {
            Ok(Self(name))
        } else {
            Err(AuthzError::invalid("resource", name))
        }
    }

    pub fn any() -> Self {
        Self(WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Treats `self` as a stored pattern and tests it against a query value.
    pub fn matches(&self, query: &Resource) -> bool {
        self.is_wildcard() || self == query
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Resource {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Resource {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Resource> for String {
    fn from(value: Resource) -> Self {
        value.0
    }
}

/// Action verb, e.g. `read` or `upload`, or the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    pub fn new(verb: impl Into<String>) -> AuthzResult<Self> {
        let verb = verb.into();
        if verb == WILDCARD
            || (!verb.is_empty() && fits_column(&verb) && verb.chars().all(is_token_char))
        {
            Ok(Self(verb))
        } else {
            Err(AuthzError::invalid("action", verb))
        }
    }

    pub fn any() -> Self {
        Self(WILDCARD.to_string())
    }

    pub fn read() -> Self {
        Self("read".to_string())
    }

    pub fn create() -> Self {
        Self("create".to_string())
    }

    pub fn update() -> Self {
        Self("update".to_string())
    }

    pub fn delete() -> Self {
        Self("delete".to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Treats `self` as a stored pattern and tests it against a query value.
    pub fn matches(&self, query: &Action) -> bool {
        self.is_wildcard() || self == query
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Action {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.0
    }
}

/// A stored grant. The effect is always allow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: Subject,
    pub domain: Domain,
    pub resource: Resource,
    pub action: Action,
}

impl PolicyRule {
    pub fn new(subject: Subject, domain: Domain, resource: Resource, action: Action) -> Self {
        Self {
            subject,
            domain,
            resource,
            action,
        }
    }

    /// Parse a rule from its four string fields.
    pub fn parse(subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<Self> {
        Ok(Self::new(
            subject.parse()?,
            domain.parse()?,
            resource.parse()?,
            action.parse()?,
        ))
    }

    /// Wildcard-aware match. Subjects compare exactly; role expansion is not done here.
    pub fn matches(
        &self,
        subject: &Subject,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> bool {
        self.subject == *subject
            && self.domain.matches(domain)
            && self.resource.matches(resource)
            && self.action.matches(action)
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.subject, self.domain, self.resource, self.action
        )
    }
}

/// Binds a user to a role inside one concrete domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user: UserId,
    pub role: RoleName,
    pub domain: Domain,
}

impl RoleAssignment {
    pub fn new(user: UserId, role: RoleName, domain: Domain) -> AuthzResult<Self> {
        let assignment = Self { user, role, domain };
        assignment.ensure_concrete()?;
        Ok(assignment)
    }

    pub fn parse(user: &str, role: &str, domain: &str) -> AuthzResult<Self> {
        Self::new(user.parse()?, role.parse()?, domain.parse()?)
    }

    /// Deserialized assignments bypass `new`, so stores call this before writing.
    pub fn ensure_concrete(&self) -> AuthzResult<()> {
        if self.domain.is_concrete() {
            Ok(())
        } else {
            Err(AuthzError::AssignmentRequiresConcreteDomain(
                self.domain.to_string(),
            ))
        }
    }
}

/// `role` implies `parent` inside `domain` (`*` means every domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleInheritance {
    pub role: RoleName,
    pub parent: RoleName,
    pub domain: Domain,
}

impl RoleInheritance {
    pub fn new(role: RoleName, parent: RoleName, domain: Domain) -> Self {
        Self {
            role,
            parent,
            domain,
        }
    }
}

/// Everything a user may do inside one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub user: Option<UserId>,
    pub domain: Option<Domain>,
    /// Roles held in the domain, inheritance included.
    pub roles: Vec<RoleName>,
    /// Direct and role-derived grants applicable to the domain.
    pub policies: Vec<PolicyRule>,
}
