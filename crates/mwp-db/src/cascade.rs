//! Delete policy and row locks for the PostgreSQL backend
//!
//! Foreign keys in the schema have no ON DELETE action. These functions apply
//! the configured `DeletePolicy` to the dependents of a row before the row
//! itself is removed. Callers run them inside one transaction, so a restrict
//! failure anywhere in the tree leaves the database untouched.
//!
//! Writes that need an unapproved plan lock the plan row in the same
//! transaction, so an approval either commits before them and is seen, or
//! waits until they commit.

use mwp_core::config::{DeletePolicy, ReferentialAction};
use mwp_core::error::ConstraintViolation;
use mwp_core::traits::Id;
use sqlx::{PgConnection, PgPool};

use crate::repository::{Record, RepositoryError, RepositoryResult};

/// The organization nodes removed by one delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgScope {
    pub ministry_ids: Vec<Id>,
    pub department_ids: Vec<Id>,
    pub unit_ids: Vec<Id>,
}

impl OrgScope {
    /// First child relation of the deleted node that is not empty
    pub fn children(&self) -> Option<(&'static str, usize)> {
        if !self.ministry_ids.is_empty() && !self.department_ids.is_empty() {
            Some(("departments", self.department_ids.len()))
        } else if !self.department_ids.is_empty() || !self.ministry_ids.is_empty() {
            (!self.unit_ids.is_empty()).then(|| ("units", self.unit_ids.len()))
        } else {
            None
        }
    }
}

/// Delete plans and apply the plan_tasks action to their tasks
pub async fn delete_plans(conn: &mut PgConnection, policy: &DeletePolicy, plan_ids: &[Id]) -> RepositoryResult<()> {
    if plan_ids.is_empty() {
        return Ok(());
    }

    let tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE plan_id = ANY($1)")
        .bind(plan_ids)
        .fetch_one(&mut *conn)
        .await?;

    if tasks > 0 {
        match policy.plan_tasks {
            ReferentialAction::Cascade => {
                sqlx::query("DELETE FROM tasks WHERE plan_id = ANY($1)")
                    .bind(plan_ids)
                    .execute(&mut *conn)
                    .await?;
            }
            // set-null is rejected by DeletePolicy::validate on required edges
            ReferentialAction::Restrict | ReferentialAction::SetNull => {
                return Err(ConstraintViolation::restricted("Plan", "tasks", tasks as usize).into());
            }
        }
    }

    sqlx::query("DELETE FROM plans WHERE id = ANY($1)")
        .bind(plan_ids)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(plans = plan_ids.len(), tasks, "Deleted plans");
    Ok(())
}

/// Delete users, their sessions, and apply the user_plans action
pub async fn delete_users(conn: &mut PgConnection, policy: &DeletePolicy, user_ids: &[Id]) -> RepositoryResult<()> {
    if user_ids.is_empty() {
        return Ok(());
    }

    let plan_ids: Vec<Id> = sqlx::query_scalar("SELECT id FROM plans WHERE user_id = ANY($1)")
        .bind(user_ids)
        .fetch_all(&mut *conn)
        .await?;

    if !plan_ids.is_empty() {
        match policy.user_plans {
            ReferentialAction::Cascade => delete_plans(conn, policy, &plan_ids).await?,
            ReferentialAction::Restrict | ReferentialAction::SetNull => {
                return Err(ConstraintViolation::restricted("User", "plans", plan_ids.len()).into());
            }
        }
    }

    let sessions = sqlx::query("DELETE FROM sessions WHERE user_id = ANY($1)")
        .bind(user_ids)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(user_ids)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(users = user_ids.len(), plans = plan_ids.len(), sessions, "Deleted users");
    Ok(())
}

/// Lock a row for the rest of the transaction; false when it does not exist
pub async fn lock_row(conn: &mut PgConnection, table: &str, id: Id) -> RepositoryResult<bool> {
    let row: Option<Id> = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = $1 FOR UPDATE", table))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Row lock strength for `lock_plan`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    /// Task writes; several may hold it on one plan while approval waits
    Share,
    /// Writes to the plan row itself
    Update,
}

impl RowLock {
    fn clause(&self) -> &'static str {
        match self {
            RowLock::Share => "FOR SHARE",
            RowLock::Update => "FOR UPDATE",
        }
    }
}

/// Lock a plan row and read its approval flag; None when it does not exist
pub async fn lock_plan(conn: &mut PgConnection, plan_id: Id, lock: RowLock) -> RepositoryResult<Option<bool>> {
    let approved: Option<bool> =
        sqlx::query_scalar(&format!("SELECT approved FROM plans WHERE id = $1 {}", lock.clause()))
            .bind(plan_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(approved)
}

/// Delete a ministry, department or unit in one transaction
pub async fn delete_org_node<T: Record>(pool: &PgPool, policy: &DeletePolicy, id: Id) -> RepositoryResult<()> {
    let mut tx = pool.begin().await?;
    if !lock_row(&mut tx, T::TABLE_NAME, id).await? {
        return Err(RepositoryError::not_found::<T>(id));
    }
    let scope = org_scope(&mut tx, T::TYPE_NAME, id).await?;
    delete_org_scope(&mut tx, policy, T::TYPE_NAME, &scope).await?;
    tx.commit().await?;
    Ok(())
}

/// Collect the nodes under a ministry, department or unit
pub async fn org_scope(conn: &mut PgConnection, entity: &'static str, id: Id) -> RepositoryResult<OrgScope> {
    let scope = match entity {
        "Ministry" => OrgScope {
            ministry_ids: vec![id],
            department_ids: sqlx::query_scalar("SELECT id FROM departments WHERE ministry_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?,
            unit_ids: sqlx::query_scalar("SELECT id FROM units WHERE ministry_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?,
        },
        "Department" => OrgScope {
            ministry_ids: Vec::new(),
            department_ids: vec![id],
            unit_ids: sqlx::query_scalar("SELECT id FROM units WHERE department_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?,
        },
        _ => OrgScope {
            unit_ids: vec![id],
            ..Default::default()
        },
    };
    Ok(scope)
}

/// Delete an organization subtree, applying the organization and
/// user_placement actions
pub async fn delete_org_scope(
    conn: &mut PgConnection,
    policy: &DeletePolicy,
    entity: &'static str,
    scope: &OrgScope,
) -> RepositoryResult<()> {
    if policy.organization != ReferentialAction::Cascade {
        if let Some((relation, count)) = scope.children() {
            return Err(ConstraintViolation::restricted(entity, relation, count).into());
        }
    }

    let user_ids: Vec<Id> = sqlx::query_scalar(
        "SELECT id FROM users \
         WHERE ministry_id = ANY($1) OR department_id = ANY($2) OR unit_id = ANY($3)",
    )
    .bind(&scope.ministry_ids)
    .bind(&scope.department_ids)
    .bind(&scope.unit_ids)
    .fetch_all(&mut *conn)
    .await?;

    if !user_ids.is_empty() {
        match policy.user_placement {
            ReferentialAction::Restrict => {
                return Err(ConstraintViolation::restricted(entity, "users", user_ids.len()).into());
            }
            ReferentialAction::SetNull => {
                sqlx::query(
                    "UPDATE users SET \
                       ministry_id = CASE WHEN ministry_id = ANY($1) THEN NULL ELSE ministry_id END, \
                       department_id = CASE WHEN department_id = ANY($2) THEN NULL ELSE department_id END, \
                       unit_id = CASE WHEN unit_id = ANY($3) THEN NULL ELSE unit_id END, \
                       updated_at = NOW() \
                     WHERE id = ANY($4)",
                )
                .bind(&scope.ministry_ids)
                .bind(&scope.department_ids)
                .bind(&scope.unit_ids)
                .bind(&user_ids)
                .execute(&mut *conn)
                .await?;
            }
            ReferentialAction::Cascade => delete_users(conn, policy, &user_ids).await?,
        }
    }

    sqlx::query("DELETE FROM units WHERE id = ANY($1)")
        .bind(&scope.unit_ids)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM departments WHERE id = ANY($1)")
        .bind(&scope.department_ids)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM ministries WHERE id = ANY($1)")
        .bind(&scope.ministry_ids)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(
        entity,
        departments = scope.department_ids.len(),
        units = scope.unit_ids.len(),
        users = user_ids.len(),
        action = %policy.user_placement,
        "Deleted organization nodes"
    );
    Ok(())
}
