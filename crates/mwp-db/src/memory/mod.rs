//! In-memory backend
//!
//! Every table lives in one `MemoryState` behind a single `RwLock`, so a write
//! that touches several tables is atomic. Deletes run against a copy of the
//! state that replaces the live one only on success, which gives them the
//! same all-or-nothing behavior as a PostgreSQL transaction.
//!
//! The backend enforces the same unique keys, references and delete policy
//! as the schema. It backs the test suites and local tooling.

mod organization;
mod people;
mod planning;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use mwp_core::config::{DeletePolicy, ReferentialAction};
use mwp_core::error::ConstraintViolation;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{Department, Ministry, Plan, Session, Task, Unit, User};
use parking_lot::RwLock;

use crate::cascade::OrgScope;
use crate::repository::{FindMany, Record, RecordFilter, RepositoryError, RepositoryResult};

pub use organization::{MemoryDepartmentRepository, MemoryMinistryRepository, MemoryUnitRepository};
pub use people::{MemorySessionRepository, MemoryUserRepository};
pub use planning::{MemoryPlanRepository, MemoryTaskRepository};

/// One table: rows by id plus the id sequence
#[derive(Debug, Clone)]
pub(crate) struct Table<T> {
    rows: BTreeMap<Id, T>,
    next_id: Id,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Record> Table<T> {
    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.values_mut()
    }

    /// Insert the row built for the next id
    pub fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(row.id(), row.clone());
        row
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        self.rows.remove(&id)
    }

    /// Remove every row matching the predicate, returning how many went
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !predicate(row));
        before - self.rows.len()
    }

    pub fn ids_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<Id> {
        self.rows
            .values()
            .filter(|&row| predicate(row))
            .map(|row| row.id())
            .collect()
    }

    pub fn count(&self, filter: &T::Filter) -> i64 {
        self.rows.values().filter(|row| filter.matches(row)).count() as i64
    }

    fn sorted(&self, query: &FindMany<T>) -> Vec<&T> {
        let mut rows: Vec<&T> = self.rows.values().filter(|row| query.filter.matches(row)).collect();
        rows.sort_by(|a, b| query.compare(a, b));
        rows
    }

    pub fn find_all(&self, filter: &T::Filter) -> Vec<T> {
        self.sorted(&FindMany::new(filter.clone()))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn find_many(&self, query: &FindMany<T>) -> PaginatedResult<T> {
        let rows = self.sorted(query);

        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(query.pagination.offset as usize)
            .take(query.pagination.limit as usize)
            .cloned()
            .collect();

        PaginatedResult::new(items, total, query.pagination)
    }
}

/// All tables of the planner
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub ministries: Table<Ministry>,
    pub departments: Table<Department>,
    pub units: Table<Unit>,
    pub users: Table<User>,
    pub plans: Table<Plan>,
    pub tasks: Table<Task>,
    pub sessions: Table<Session>,
}

/// Access to a record's table inside the state
pub(crate) trait Stored: Record {
    fn table(state: &MemoryState) -> &Table<Self>;
    fn table_mut(state: &mut MemoryState) -> &mut Table<Self>;
}

macro_rules! stored {
    ($record:ty, $field:ident) => {
        impl Stored for $record {
            fn table(state: &MemoryState) -> &Table<Self> {
                &state.$field
            }

            fn table_mut(state: &mut MemoryState) -> &mut Table<Self> {
                &mut state.$field
            }
        }
    };
}

stored!(Ministry, ministries);
stored!(Department, departments);
stored!(Unit, units);
stored!(User, users);
stored!(Plan, plans);
stored!(Task, tasks);
stored!(Session, sessions);

impl MemoryState {
    /// Fail with a missing reference unless `id` exists in `T`'s table
    pub fn require<T: Stored>(
        &self,
        entity: &'static str,
        field: &'static str,
        id: Id,
    ) -> RepositoryResult<()> {
        if T::table(self).contains(id) {
            Ok(())
        } else {
            Err(ConstraintViolation::missing_reference(entity, field, id).into())
        }
    }

    /// Nodes under a ministry, department or unit
    pub fn org_scope(&self, entity: &'static str, id: Id) -> OrgScope {
        match entity {
            "Ministry" => OrgScope {
                ministry_ids: vec![id],
                department_ids: self.departments.ids_where(|d| d.ministry_id == id),
                unit_ids: self.units.ids_where(|u| u.ministry_id == id),
            },
            "Department" => OrgScope {
                ministry_ids: Vec::new(),
                department_ids: vec![id],
                unit_ids: self.units.ids_where(|u| u.department_id == id),
            },
            _ => OrgScope {
                unit_ids: vec![id],
                ..Default::default()
            },
        }
    }

    pub fn delete_plans(&mut self, policy: &DeletePolicy, plan_ids: &[Id]) -> RepositoryResult<()> {
        if plan_ids.is_empty() {
            return Ok(());
        }

        let tasks = self.tasks.ids_where(|t| plan_ids.contains(&t.plan_id));
        if !tasks.is_empty() {
            match policy.plan_tasks {
                ReferentialAction::Cascade => {
                    self.tasks.remove_where(|t| plan_ids.contains(&t.plan_id));
                }
                ReferentialAction::Restrict | ReferentialAction::SetNull => {
                    return Err(ConstraintViolation::restricted("Plan", "tasks", tasks.len()).into());
                }
            }
        }

        self.plans.remove_where(|p| plan_ids.contains(&p.id));
        Ok(())
    }

    pub fn delete_users(&mut self, policy: &DeletePolicy, user_ids: &[Id]) -> RepositoryResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let plan_ids = self.plans.ids_where(|p| user_ids.contains(&p.user_id));
        if !plan_ids.is_empty() {
            match policy.user_plans {
                ReferentialAction::Cascade => self.delete_plans(policy, &plan_ids)?,
                ReferentialAction::Restrict | ReferentialAction::SetNull => {
                    return Err(ConstraintViolation::restricted("User", "plans", plan_ids.len()).into());
                }
            }
        }

        self.sessions.remove_where(|s| user_ids.contains(&s.user_id));
        self.users.remove_where(|u| user_ids.contains(&u.id));
        Ok(())
    }

    pub fn delete_org_scope(
        &mut self,
        policy: &DeletePolicy,
        entity: &'static str,
        scope: &OrgScope,
    ) -> RepositoryResult<()> {
        if policy.organization != ReferentialAction::Cascade {
            if let Some((relation, count)) = scope.children() {
                return Err(ConstraintViolation::restricted(entity, relation, count).into());
            }
        }

        let placed = |id: Option<Id>, ids: &[Id]| id.map_or(false, |id| ids.contains(&id));
        let user_ids = self.users.ids_where(|u| {
            placed(u.ministry_id, &scope.ministry_ids)
                || placed(u.department_id, &scope.department_ids)
                || placed(u.unit_id, &scope.unit_ids)
        });

        if !user_ids.is_empty() {
            match policy.user_placement {
                ReferentialAction::Restrict => {
                    return Err(ConstraintViolation::restricted(entity, "users", user_ids.len()).into());
                }
                ReferentialAction::SetNull => {
                    let now = chrono::Utc::now();
                    for user in self.users.iter_mut().filter(|u| user_ids.contains(&u.id)) {
                        if placed(user.ministry_id, &scope.ministry_ids) {
                            user.ministry_id = None;
                        }
                        if placed(user.department_id, &scope.department_ids) {
                            user.department_id = None;
                        }
                        if placed(user.unit_id, &scope.unit_ids) {
                            user.unit_id = None;
                        }
                        user.updated_at = now;
                    }
                }
                ReferentialAction::Cascade => self.delete_users(policy, &user_ids)?,
            }
        }

        self.units.remove_where(|u| scope.unit_ids.contains(&u.id));
        self.departments.remove_where(|d| scope.department_ids.contains(&d.id));
        self.ministries.remove_where(|m| scope.ministry_ids.contains(&m.id));
        Ok(())
    }
}

/// Shared handle to the in-memory tables
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<RwLock<MemoryState>>,
    policy: DeletePolicy,
}

impl MemoryDatabase {
    pub fn new(policy: DeletePolicy) -> Self {
        Self {
            state: Arc::default(),
            policy,
        }
    }

    pub fn policy(&self) -> &DeletePolicy {
        &self.policy
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&MemoryState) -> R) -> R {
        f(&*self.state.read())
    }

    /// Writes that validate before they mutate
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut MemoryState) -> RepositoryResult<R>) -> RepositoryResult<R> {
        f(&mut *self.state.write())
    }

    /// Writes that may fail halfway; the state only changes on success
    pub(crate) fn transaction<R>(
        &self,
        f: impl FnOnce(&mut MemoryState, &DeletePolicy) -> RepositoryResult<R>,
    ) -> RepositoryResult<R> {
        let mut state = self.state.write();
        let mut draft = state.clone();
        let result = f(&mut draft, &self.policy)?;
        *state = draft;
        Ok(result)
    }

    pub(crate) fn find_by_id<T: Stored>(&self, id: Id) -> Option<T> {
        self.read(|state| T::table(state).get(id).cloned())
    }

    pub(crate) fn find_many<T: Stored>(&self, query: &FindMany<T>) -> PaginatedResult<T> {
        self.read(|state| T::table(state).find_many(query))
    }

    pub(crate) fn find_all<T: Stored>(&self, filter: &T::Filter) -> Vec<T> {
        self.read(|state| T::table(state).find_all(filter))
    }

    pub(crate) fn count<T: Stored>(&self, filter: &T::Filter) -> i64 {
        self.read(|state| T::table(state).count(filter))
    }

    pub(crate) fn exists<T: Stored>(&self, id: Id) -> bool {
        self.read(|state| T::table(state).contains(id))
    }

    /// Delete a row with no dependents
    pub(crate) fn delete_leaf<T: Stored>(&self, id: Id) -> RepositoryResult<()> {
        self.write(|state| {
            T::table_mut(state)
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RepositoryError::not_found::<T>(id))
        })
    }
}
