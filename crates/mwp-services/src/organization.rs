//! Ministry, department and unit services
//!
//! Writes go through `OrganizationContract`; keys and the delete policy are
//! enforced by the repositories.

use mwp_contracts::OrganizationContract;
use mwp_core::result::MwpResult;
use mwp_core::traits::Id;
use mwp_db::{DepartmentFilter, Repositories, Repository, UnitFilter};
use mwp_models::{
    Department, Ministry, NewDepartment, NewMinistry, NewUnit, Unit, UpdateDepartment, UpdateMinistry, UpdateUnit,
};
use serde::Serialize;

use crate::base::validate;

/// A ministry with its departments, each with its units
#[derive(Debug, Clone, Serialize)]
pub struct MinistryTree {
    pub ministry: Ministry,
    pub departments: Vec<DepartmentTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentTree {
    pub department: Department,
    pub units: Vec<Unit>,
}

impl MinistryTree {
    pub fn unit_count(&self) -> usize {
        self.departments.iter().map(|d| d.units.len()).sum()
    }
}

/// Service for the organization hierarchy
#[derive(Clone)]
pub struct OrganizationService {
    repos: Repositories,
    contract: OrganizationContract,
}

impl OrganizationService {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            contract: OrganizationContract::new(),
        }
    }

    pub async fn create_ministry(&self, dto: NewMinistry) -> MwpResult<Ministry> {
        validate(&self.contract, &dto)?;
        let ministry = self.repos.ministries.create(dto).await?;
        tracing::info!(ministry_id = ministry.id, name = %ministry.name, "Created ministry");
        Ok(ministry)
    }

    pub async fn update_ministry(&self, id: Id, dto: UpdateMinistry) -> MwpResult<Ministry> {
        validate(&self.contract, &dto)?;
        Ok(self.repos.ministries.update(id, dto).await?)
    }

    pub async fn delete_ministry(&self, id: Id) -> MwpResult<()> {
        self.repos.ministries.delete(id).await?;
        tracing::info!(ministry_id = id, "Deleted ministry");
        Ok(())
    }

    pub async fn create_department(&self, dto: NewDepartment) -> MwpResult<Department> {
        validate(&self.contract, &dto)?;
        let department = self.repos.departments.create(dto).await?;
        tracing::info!(
            department_id = department.id,
            ministry_id = department.ministry_id,
            name = %department.name,
            "Created department"
        );
        Ok(department)
    }

    /// Moving a department to another ministry carries its units along
    pub async fn update_department(&self, id: Id, dto: UpdateDepartment) -> MwpResult<Department> {
        validate(&self.contract, &dto)?;
        Ok(self.repos.departments.update(id, dto).await?)
    }

    pub async fn delete_department(&self, id: Id) -> MwpResult<()> {
        self.repos.departments.delete(id).await?;
        tracing::info!(department_id = id, "Deleted department");
        Ok(())
    }

    pub async fn create_unit(&self, dto: NewUnit) -> MwpResult<Unit> {
        validate(&self.contract, &dto)?;
        let unit = self.repos.units.create(dto).await?;
        tracing::info!(unit_id = unit.id, department_id = unit.department_id, name = %unit.name, "Created unit");
        Ok(unit)
    }

    pub async fn update_unit(&self, id: Id, dto: UpdateUnit) -> MwpResult<Unit> {
        validate(&self.contract, &dto)?;
        Ok(self.repos.units.update(id, dto).await?)
    }

    pub async fn delete_unit(&self, id: Id) -> MwpResult<()> {
        self.repos.units.delete(id).await?;
        tracing::info!(unit_id = id, "Deleted unit");
        Ok(())
    }

    /// Load a ministry with every department and unit below it
    pub async fn ministry_tree(&self, id: Id) -> MwpResult<MinistryTree> {
        let ministry = self.repos.ministries.get(id).await?;
        let departments = self.repos.departments.find_all(&DepartmentFilter::in_ministry(id)).await?;
        let units = self.repos.units.find_all(&UnitFilter::in_ministry(id)).await?;

        let departments = departments
            .into_iter()
            .map(|department| {
                let units = units
                    .iter()
                    .filter(|u| u.department_id == department.id)
                    .cloned()
                    .collect();
                DepartmentTree { department, units }
            })
            .collect();

        Ok(MinistryTree { ministry, departments })
    }
}
