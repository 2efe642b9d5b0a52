//! In-memory ministries, departments and units

use async_trait::async_trait;
use chrono::Utc;
use mwp_core::error::ConstraintViolation;
use mwp_core::pagination::PaginatedResult;
use mwp_core::traits::Id;
use mwp_models::{
    Department, Ministry, NewDepartment, NewMinistry, NewUnit, Unit, UpdateDepartment, UpdateMinistry, UpdateUnit,
};

use super::{MemoryDatabase, MemoryState, Stored};
use crate::departments::{DepartmentFilter, DepartmentRepository};
use crate::ministries::{MinistryFilter, MinistryRepository};
use crate::repository::{FindMany, Repository, RepositoryError, RepositoryResult};
use crate::units::{UnitFilter, UnitRepository};

fn ensure_ministry_name_free(state: &MemoryState, name: &str, except: Option<Id>) -> RepositoryResult<()> {
    if state.ministries.iter().any(|m| m.name == name && Some(m.id) != except) {
        return Err(ConstraintViolation::unique("Ministry", &["name"]).into());
    }
    Ok(())
}

fn ensure_department_name_free(
    state: &MemoryState,
    name: &str,
    ministry_id: Id,
    except: Option<Id>,
) -> RepositoryResult<()> {
    let taken = state
        .departments
        .iter()
        .any(|d| d.name == name && d.ministry_id == ministry_id && Some(d.id) != except);
    if taken {
        return Err(ConstraintViolation::unique("Department", &["name", "ministry_id"]).into());
    }
    Ok(())
}

fn ensure_unit_name_free(
    state: &MemoryState,
    name: &str,
    department_id: Id,
    ministry_id: Id,
    except: Option<Id>,
) -> RepositoryResult<()> {
    let taken = state.units.iter().any(|u| {
        u.name == name && u.department_id == department_id && u.ministry_id == ministry_id && Some(u.id) != except
    });
    if taken {
        return Err(ConstraintViolation::unique("Unit", &["name", "department_id", "ministry_id"]).into());
    }
    Ok(())
}

/// The ministry a unit in `department_id` belongs to
fn department_ministry(state: &MemoryState, department_id: Id) -> RepositoryResult<Id> {
    state
        .departments
        .get(department_id)
        .map(|d| d.ministry_id)
        .ok_or_else(|| ConstraintViolation::missing_reference("Unit", "department_id", department_id).into())
}

fn delete_org_node<T: Stored>(db: &MemoryDatabase, id: Id) -> RepositoryResult<()> {
    db.transaction(|state, policy| {
        if !T::table(state).contains(id) {
            return Err(RepositoryError::not_found::<T>(id));
        }
        let scope = state.org_scope(T::TYPE_NAME, id);
        state.delete_org_scope(policy, T::TYPE_NAME, &scope)
    })
}

/// In-memory ministry repository
#[derive(Clone)]
pub struct MemoryMinistryRepository {
    db: MemoryDatabase,
}

impl MemoryMinistryRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Ministry> for MemoryMinistryRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Ministry>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Ministry>) -> RepositoryResult<PaginatedResult<Ministry>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &MinistryFilter) -> RepositoryResult<Vec<Ministry>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &MinistryFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Ministry>(filter))
    }

    async fn create(&self, dto: NewMinistry) -> RepositoryResult<Ministry> {
        self.db.write(|state| {
            ensure_ministry_name_free(state, &dto.name, None)?;
            let now = Utc::now();
            Ok(state.ministries.insert_with(|id| Ministry {
                id,
                name: dto.name,
                description: dto.description,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    async fn update(&self, id: Id, dto: UpdateMinistry) -> RepositoryResult<Ministry> {
        self.db.write(|state| {
            if !state.ministries.contains(id) {
                return Err(RepositoryError::not_found::<Ministry>(id));
            }
            if let Some(name) = &dto.name {
                ensure_ministry_name_free(state, name, Some(id))?;
            }

            let ministry = state
                .ministries
                .get_mut(id)
                .ok_or_else(|| RepositoryError::not_found::<Ministry>(id))?;
            if let Some(name) = dto.name {
                ministry.name = name;
            }
            if let Some(description) = dto.description {
                ministry.description = description;
            }
            ministry.updated_at = Utc::now();
            Ok(ministry.clone())
        })
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        delete_org_node::<Ministry>(&self.db, id)
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Ministry>(id))
    }
}

#[async_trait]
impl MinistryRepository for MemoryMinistryRepository {
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Ministry>> {
        Ok(self
            .db
            .read(|state| state.ministries.iter().find(|m| m.name == name).cloned()))
    }
}

/// In-memory department repository
#[derive(Clone)]
pub struct MemoryDepartmentRepository {
    db: MemoryDatabase,
}

impl MemoryDepartmentRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Department> for MemoryDepartmentRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Department>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Department>) -> RepositoryResult<PaginatedResult<Department>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &DepartmentFilter) -> RepositoryResult<Vec<Department>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &DepartmentFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Department>(filter))
    }

    async fn create(&self, dto: NewDepartment) -> RepositoryResult<Department> {
        self.db.write(|state| {
            state.require::<Ministry>("Department", "ministry_id", dto.ministry_id)?;
            ensure_department_name_free(state, &dto.name, dto.ministry_id, None)?;
            let now = Utc::now();
            Ok(state.departments.insert_with(|id| Department {
                id,
                name: dto.name,
                description: dto.description,
                ministry_id: dto.ministry_id,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    async fn update(&self, id: Id, dto: UpdateDepartment) -> RepositoryResult<Department> {
        self.db.write(|state| {
            let current = state
                .departments
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found::<Department>(id))?;

            if let Some(ministry_id) = dto.ministry_id {
                state.require::<Ministry>("Department", "ministry_id", ministry_id)?;
            }
            let name = dto.name.as_deref().unwrap_or(&current.name);
            let ministry_id = dto.ministry_id.unwrap_or(current.ministry_id);
            ensure_department_name_free(state, name, ministry_id, Some(id))?;

            // Units follow their department into the new ministry
            if ministry_id != current.ministry_id {
                for unit in state.units.iter_mut().filter(|u| u.department_id == id) {
                    unit.ministry_id = ministry_id;
                }
            }

            let department = state
                .departments
                .get_mut(id)
                .ok_or_else(|| RepositoryError::not_found::<Department>(id))?;
            if let Some(name) = dto.name {
                department.name = name;
            }
            if let Some(description) = dto.description {
                department.description = description;
            }
            department.ministry_id = ministry_id;
            department.updated_at = Utc::now();
            Ok(department.clone())
        })
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        delete_org_node::<Department>(&self.db, id)
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Department>(id))
    }
}

#[async_trait]
impl DepartmentRepository for MemoryDepartmentRepository {
    async fn find_by_name(&self, ministry_id: Id, name: &str) -> RepositoryResult<Option<Department>> {
        Ok(self.db.read(|state| {
            state
                .departments
                .iter()
                .find(|d| d.ministry_id == ministry_id && d.name == name)
                .cloned()
        }))
    }
}

/// In-memory unit repository
#[derive(Clone)]
pub struct MemoryUnitRepository {
    db: MemoryDatabase,
}

impl MemoryUnitRepository {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Unit> for MemoryUnitRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Unit>> {
        Ok(self.db.find_by_id(id))
    }

    async fn find_many(&self, query: &FindMany<Unit>) -> RepositoryResult<PaginatedResult<Unit>> {
        Ok(self.db.find_many(query))
    }

    async fn find_all(&self, filter: &UnitFilter) -> RepositoryResult<Vec<Unit>> {
        Ok(self.db.find_all(filter))
    }

    async fn count(&self, filter: &UnitFilter) -> RepositoryResult<i64> {
        Ok(self.db.count::<Unit>(filter))
    }

    async fn create(&self, dto: NewUnit) -> RepositoryResult<Unit> {
        self.db.write(|state| {
            let ministry_id = department_ministry(state, dto.department_id)?;
            ensure_unit_name_free(state, &dto.name, dto.department_id, ministry_id, None)?;
            let now = Utc::now();
            Ok(state.units.insert_with(|id| Unit {
                id,
                name: dto.name,
                description: dto.description,
                department_id: dto.department_id,
                ministry_id,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    async fn update(&self, id: Id, dto: UpdateUnit) -> RepositoryResult<Unit> {
        self.db.write(|state| {
            let current = state
                .units
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found::<Unit>(id))?;

            let department_id = dto.department_id.unwrap_or(current.department_id);
            let ministry_id = department_ministry(state, department_id)?;
            let name = dto.name.as_deref().unwrap_or(&current.name);
            ensure_unit_name_free(state, name, department_id, ministry_id, Some(id))?;

            let unit = state
                .units
                .get_mut(id)
                .ok_or_else(|| RepositoryError::not_found::<Unit>(id))?;
            if let Some(name) = dto.name {
                unit.name = name;
            }
            if let Some(description) = dto.description {
                unit.description = description;
            }
            unit.department_id = department_id;
            unit.ministry_id = ministry_id;
            unit.updated_at = Utc::now();
            Ok(unit.clone())
        })
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        delete_org_node::<Unit>(&self.db, id)
    }

    async fn exists(&self, id: Id) -> RepositoryResult<bool> {
        Ok(self.db.exists::<Unit>(id))
    }
}

#[async_trait]
impl UnitRepository for MemoryUnitRepository {
    async fn find_by_name(&self, department_id: Id, name: &str) -> RepositoryResult<Option<Unit>> {
        Ok(self.db.read(|state| {
            state
                .units
                .iter()
                .find(|u| u.department_id == department_id && u.name == name)
                .cloned()
        }))
    }
}
