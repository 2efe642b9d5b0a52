//! Plan model
//!
//! Table: plans

use chrono::{DateTime, Utc};
use mwp_core::traits::Id;
use serde::{Deserialize, Serialize};

use crate::calendar::{Month, Week};

/// A user's declared work plan for one week of one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: Id,
    pub user_id: Id,
    pub month: Month,
    /// Always `month.order()`
    pub month_order: i32,
    pub week: Week,
    /// Always `week.order()`
    pub week_order: i32,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Plan, "plans", "Plan");

impl Plan {
    /// e.g. "JANUARY WEEK_1"
    pub fn period(&self) -> String {
        format!("{} {}", self.month, self.week)
    }

    pub fn is_locked(&self) -> bool {
        self.approved
    }
}

/// Plan creation parameters
///
/// Ordinals are derived from the enums when the plan is written.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub user_id: Id,
    pub month: Month,
    pub week: Week,
}

impl NewPlan {
    pub fn new(user_id: Id, month: Month, week: Week) -> Self {
        Self { user_id, month, week }
    }
}

/// Plan update parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlan {
    pub month: Option<Month>,
    pub week: Option<Week>,
    pub approved: Option<bool>,
}

impl UpdatePlan {
    pub fn approval(approved: bool) -> Self {
        Self {
            approved: Some(approved),
            ..Default::default()
        }
    }

    /// Changes which week the plan covers
    pub fn moves_period(&self) -> bool {
        self.month.is_some() || self.week.is_some()
    }
}
