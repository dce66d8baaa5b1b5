//! Postgres-backed store.
//!
//! Rows live in `authz_rules` (`ptype, v0..v5`). Reads are served from an
//! in-memory snapshot; writes go to the database first and are applied to the
//! snapshot before the call returns. Other processes see a change only after
//! they call [`PolicyStore::reload`].

use super::{MemoryStore, PolicySnapshot, PolicyStore, RoleStore, StoredRule};
use crate::error::AuthzResult;
use crate::types::{
    Action, Domain, PolicyRule, Resource, RoleAssignment, RoleInheritance, RoleName, Subject,
    UserId,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

const INSERT_RULE: &str = "INSERT INTO authz_rules (ptype, v0, v1, v2, v3, v4, v5) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT DO NOTHING";

const DELETE_RULE: &str = "DELETE FROM authz_rules \
     WHERE ptype = $1 AND v0 = $2 AND v1 = $3 AND v2 = $4 AND v3 = $5 AND v4 = $6 AND v5 = $7";

const SELECT_RULES: &str = "SELECT ptype, v0, v1, v2, v3, v4, v5 FROM authz_rules ORDER BY id";

/// Write-through store over a Postgres pool.
pub struct PostgresStore {
    pool: PgPool,
    cache: MemoryStore,
    // Held across the database write and the snapshot update so both see
    // mutations in the same order.
    mutation: Mutex<()>,
}

impl PostgresStore {
    /// Connect the store to `pool`, run migrations and load every row.
    #[instrument(skip(pool))]
    pub async fn new(pool: PgPool) -> AuthzResult<Self> {
        run_migrations(&pool).await?;

        let store = Self {
            pool,
            cache: MemoryStore::new(),
            mutation: Mutex::new(()),
        };
        store.load().await?;
        Ok(store)
    }

    async fn load(&self) -> AuthzResult<()> {
        let rows = sqlx::query(SELECT_RULES).fetch_all(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let ptype: String = row.try_get("ptype")?;
            let values = [
                row.try_get::<String, _>("v0")?,
                row.try_get::<String, _>("v1")?,
                row.try_get::<String, _>("v2")?,
                row.try_get::<String, _>("v3")?,
                row.try_get::<String, _>("v4")?,
                row.try_get::<String, _>("v5")?,
            ];
            match StoredRule::from_columns(&ptype, &values) {
                Ok(rule) => rules.push(rule),
                // An unreadable grant is dropped, which can only narrow access.
                Err(err) => warn!(ptype = %ptype, error = %err, "Skipping malformed authorization row"),
            }
        }

        info!(rows = rules.len(), "Authorization rules loaded");
        self.cache.replace(PolicySnapshot::from_rules(rules));
        Ok(())
    }

    async fn write(&self, rule: StoredRule, present: bool) -> AuthzResult<bool> {
        let _guard = self.mutation.lock().await;

        let sql = if present { INSERT_RULE } else { DELETE_RULE };
        let result = bind_rule(sqlx::query(sql), &rule)
            .execute(&self.pool)
            .await?;

        // Apply even when the row count is zero: another process may have
        // written the row we were about to, and the snapshot must agree.
        self.cache.apply(std::slice::from_ref(&rule), present);
        Ok(result.rows_affected() > 0)
    }

    async fn write_batch(&self, rules: Vec<StoredRule>) -> AuthzResult<usize> {
        let _guard = self.mutation.lock().await;

        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;
        let mut inserted = 0;
        for rule in &rules {
            let result = bind_rule(sqlx::query(INSERT_RULE), rule)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;

        self.cache.apply(&rules, true);
        Ok(inserted)
    }
}

fn bind_rule<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    rule: &StoredRule,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    let [v0, v1, v2, v3, v4, v5] = rule.values();
    query
        .bind(rule.ptype())
        .bind(v0)
        .bind(v1)
        .bind(v2)
        .bind(v3)
        .bind(v4)
        .bind(v5)
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> AuthzResult<()> {
    info!("Running authorization migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Authorization migrations completed");
    Ok(())
}

#[async_trait]
impl PolicyStore for PostgresStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        self.write(StoredRule::Policy(rule.clone()), true).await
    }

    async fn add_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize> {
        self.write_batch(rules.iter().cloned().map(StoredRule::Policy).collect())
            .await
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        self.write(StoredRule::Policy(rule.clone()), false).await
    }

    async fn match_policies(
        &self,
        subject: &Subject,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> AuthzResult<bool> {
        self.cache
            .match_policies(subject, domain, resource, action)
            .await
    }

    async fn policies_for_subject(
        &self,
        subject: &Subject,
        domain: Option<&Domain>,
    ) -> AuthzResult<Vec<PolicyRule>> {
        self.cache.policies_for_subject(subject, domain).await
    }

    async fn all_policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        self.cache.all_policies().await
    }

    #[instrument(skip(self))]
    async fn reload(&self) -> AuthzResult<()> {
        let _guard = self.mutation.lock().await;
        self.load().await
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn assign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        assignment.ensure_concrete()?;
        self.write(StoredRule::Assignment(assignment.clone()), true)
            .await
    }

    async fn unassign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        self.write(StoredRule::Assignment(assignment.clone()), false)
            .await
    }

    async fn roles_for_subject(
        &self,
        user: &UserId,
        domain: &Domain,
    ) -> AuthzResult<Vec<RoleName>> {
        self.cache.roles_for_subject(user, domain).await
    }

    async fn assignments_for_user(&self, user: &UserId) -> AuthzResult<Vec<RoleAssignment>> {
        self.cache.assignments_for_user(user).await
    }

    async fn add_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        self.write(StoredRule::Inheritance(edge.clone()), true).await
    }

    async fn remove_role_inheritance(&self, edge: &RoleInheritance) -> AuthzResult<bool> {
        self.write(StoredRule::Inheritance(edge.clone()), false)
            .await
    }
}
