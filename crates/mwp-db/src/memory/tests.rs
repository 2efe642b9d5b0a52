use mwp_core::config::{DeletePolicy, ReferentialAction};
use mwp_core::error::ConstraintKind;
use mwp_core::pagination::{Pagination, SortDirection};
use mwp_models::{
    Completion, Day, Month, NewDepartment, NewMinistry, NewPlan, NewSession, NewTask, NewUnit, NewUser, Priority,
    TaskStatus, UpdateDepartment, UpdatePlan, UpdateSession, UpdateTask, UpdateUnit, UpdateUser, Week,
};

use crate::plans::{PlanFilter, PlanRepository, PlanSortField};
use crate::repository::{FindMany, Repository, RepositoryError};
use crate::sessions::{SessionFilter, SessionRepository};
use crate::tasks::{TaskFilter, TaskRepository};
use crate::units::UnitFilter;
use crate::users::{UserFilter, UserRepository};
use crate::Repositories;

fn kind(err: &RepositoryError) -> Option<ConstraintKind> {
    err.constraint().map(|v| v.kind)
}

async fn ministry(repos: &Repositories, name: &str) -> i64 {
    repos.ministries.create(NewMinistry::new(name)).await.unwrap().id
}

async fn department(repos: &Repositories, name: &str, ministry_id: i64) -> i64 {
    repos
        .departments
        .create(NewDepartment::new(name, ministry_id))
        .await
        .unwrap()
        .id
}

async fn unit(repos: &Repositories, name: &str, department_id: i64) -> i64 {
    repos
        .units
        .create(NewUnit::new(name, department_id))
        .await
        .unwrap()
        .id
}

fn task(plan_id: i64, day: Day, title: &str) -> NewTask {
    NewTask::new(plan_id, day, title, Priority::High, "09:00-11:00", "2025-01-06")
}

#[tokio::test]
async fn test_department_name_unique_within_ministry() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let health = ministry(&repos, "Health").await;
    let finance = ministry(&repos, "Finance").await;

    department(&repos, "Procurement", health).await;

    let err = repos
        .departments
        .create(NewDepartment::new("Procurement", health))
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));
    assert!(err.constraint().unwrap().involves("ministry_id"));

    let other = repos
        .departments
        .create(NewDepartment::new("Procurement", finance))
        .await
        .unwrap();
    assert_eq!(other.ministry_id, finance);
}

#[tokio::test]
async fn test_unique_keys() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    ministry(&repos, "Health").await;
    let err = repos.ministries.create(NewMinistry::new("Health")).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));

    repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let err = repos.users.create(NewUser::new("EMP001", "other")).await.unwrap_err();
    assert!(err.constraint().unwrap().involves("employee_id"));

    // Renaming onto a taken key fails too
    let second = repos.users.create(NewUser::new("EMP002", "hash")).await.unwrap();
    let err = repos
        .users
        .update(
            second.id,
            UpdateUser {
                employee_id: Some("EMP001".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));
}

#[tokio::test]
async fn test_unit_name_unique_within_department() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let health = ministry(&repos, "Health").await;
    let procurement = department(&repos, "Procurement", health).await;
    let audit = department(&repos, "Audit", health).await;

    unit(&repos, "Stores", procurement).await;
    let err = repos
        .units
        .create(NewUnit::new("Stores", procurement))
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));
    let violation = err.constraint().unwrap();
    assert!(violation.involves("name") && violation.involves("department_id") && violation.involves("ministry_id"));

    let audit_stores = unit(&repos, "Stores", audit).await;
    let tenders = unit(&repos, "Tenders", procurement).await;

    let err = repos
        .units
        .update(
            tenders,
            UpdateUnit {
                name: Some("Stores".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));

    let err = repos
        .units
        .update(
            audit_stores,
            UpdateUnit {
                department_id: Some(procurement),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));

    // Keeping its own name is not a clash
    let same = repos
        .units
        .update(
            audit_stores,
            UpdateUnit {
                name: Some("Stores".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.department_id, audit);

    let in_procurement = UnitFilter {
        department_id: Some(procurement),
        ..Default::default()
    };
    let names: Vec<String> = repos
        .units
        .find_all(&in_procurement)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Stores", "Tenders"]);
}

#[tokio::test]
async fn test_missing_references() {
    let repos = Repositories::in_memory(DeletePolicy::default());

    let err = repos.tasks.create(task(42, Day::Monday, "Orphan")).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::MissingReference));
    assert!(err.constraint().unwrap().involves("plan_id"));

    let err = repos
        .plans
        .create(NewPlan::new(7, Month::January, Week::Week1))
        .await
        .unwrap_err();
    assert!(err.constraint().unwrap().involves("user_id"));

    let err = repos.units.create(NewUnit::new("Stores", 3)).await.unwrap_err();
    assert!(err.constraint().unwrap().involves("department_id"));

    let err = repos
        .users
        .create(NewUser::new("EMP009", "hash").in_unit(5))
        .await
        .unwrap_err();
    assert!(err.constraint().unwrap().involves("unit_id"));

    assert_eq!(repos.tasks.count(&TaskFilter::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unassigned_user_round_trip() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();

    let found = repos.users.find_by_employee_id("EMP001").await.unwrap().unwrap();
    assert_eq!(found, user);
    assert!(found.is_unassigned());
    assert_eq!(found.ministry_id, None);
    assert_eq!(found.department_id, None);
    assert_eq!(found.unit_id, None);
    assert_eq!(repos.plans.count(&PlanFilter::for_user(user.id)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_plan_with_one_task() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let plan = repos
        .plans
        .create(NewPlan::new(user.id, Month::January, Week::Week1))
        .await
        .unwrap();
    assert_eq!((plan.month_order, plan.week_order), (1, 1));
    assert!(!plan.approved);

    let created = repos
        .tasks
        .create(task(plan.id, Day::Monday, "Draft report").with_notes("..."))
        .await
        .unwrap();
    assert_eq!(created.day_order, 1);
    assert_eq!(created.status, TaskStatus::Pending);

    let tasks = repos.tasks.find_all(&TaskFilter::for_plan(plan.id)).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Draft report");
}

#[tokio::test]
async fn test_ordinals_follow_enums() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let plan = repos
        .plans
        .create(NewPlan::new(user.id, Month::March, Week::Week2))
        .await
        .unwrap();
    assert_eq!((plan.month_order, plan.week_order), (3, 2));

    let moved = repos
        .plans
        .update(
            plan.id,
            UpdatePlan {
                month: Some(Month::December),
                week: Some(Week::Week5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!((moved.month_order, moved.week_order), (12, 5));

    let t = repos.tasks.create(task(plan.id, Day::Thursday, "Audit")).await.unwrap();
    assert_eq!(t.day_order, 4);
    let t = repos
        .tasks
        .update(
            t.id,
            UpdateTask {
                day: Some(Day::Tuesday),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(t.day_order, 2);
}

#[tokio::test]
async fn test_plans_sorted_in_calendar_order() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    for (month, week) in [
        (Month::March, Week::Week1),
        (Month::January, Week::Week3),
        (Month::January, Week::Week1),
    ] {
        repos.plans.create(NewPlan::new(user.id, month, week)).await.unwrap();
    }

    let page = repos.plans.find_many(&FindMany::default()).await.unwrap();
    let periods: Vec<String> = page.items.iter().map(|p| p.period()).collect();
    assert_eq!(periods, vec!["JANUARY WEEK_1", "JANUARY WEEK_3", "MARCH WEEK_1"]);

    let page = repos
        .plans
        .find_many(
            &FindMany::default()
                .sorted_by(PlanSortField::MonthOrder, SortDirection::Desc)
                .paginate(Pagination::new(1, 0)),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].month, Month::March);
}

#[tokio::test]
async fn test_unit_ministry_follows_department() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let health = ministry(&repos, "Health").await;
    let finance = ministry(&repos, "Finance").await;
    let procurement = department(&repos, "Procurement", health).await;
    let audit = department(&repos, "Audit", finance).await;
    let stores = unit(&repos, "Stores", procurement).await;

    assert_eq!(repos.units.get(stores).await.unwrap().ministry_id, health);

    repos
        .departments
        .update(
            procurement,
            UpdateDepartment {
                ministry_id: Some(finance),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(repos.units.get(stores).await.unwrap().ministry_id, finance);

    let moved = repos
        .units
        .update(
            stores,
            UpdateUnit {
                department_id: Some(audit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.department_id, audit);
    assert_eq!(moved.ministry_id, finance);

    let in_finance = repos.units.count(&UnitFilter::in_ministry(finance)).await.unwrap();
    assert_eq!(in_finance, 1);
}

#[tokio::test]
async fn test_restrict_blocks_ministry_delete() {
    let repos = Repositories::in_memory(DeletePolicy::restrict_all());
    let health = ministry(&repos, "Health").await;
    department(&repos, "Procurement", health).await;

    let err = repos.ministries.delete(health).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Restricted));
    assert!(repos.ministries.exists(health).await.unwrap());
}

#[tokio::test]
async fn test_set_null_keeps_users() {
    let repos = Repositories::in_memory(DeletePolicy {
        organization: ReferentialAction::Cascade,
        ..DeletePolicy::default()
    });
    let health = ministry(&repos, "Health").await;
    let procurement = department(&repos, "Procurement", health).await;
    let stores = unit(&repos, "Stores", procurement).await;
    let user = repos
        .users
        .create(
            NewUser::new("EMP001", "hash")
                .in_ministry(health)
                .in_department(procurement)
                .in_unit(stores),
        )
        .await
        .unwrap();

    repos.departments.delete(procurement).await.unwrap();

    assert!(!repos.units.exists(stores).await.unwrap());
    let user = repos.users.get(user.id).await.unwrap();
    assert_eq!(user.ministry_id, Some(health));
    assert_eq!(user.department_id, None);
    assert_eq!(user.unit_id, None);
}

#[tokio::test]
async fn test_cascade_removes_whole_tree() {
    let repos = Repositories::in_memory(DeletePolicy::cascade_all());
    let health = ministry(&repos, "Health").await;
    let procurement = department(&repos, "Procurement", health).await;
    unit(&repos, "Stores", procurement).await;
    let user = repos
        .users
        .create(NewUser::new("EMP001", "hash").in_department(procurement))
        .await
        .unwrap();
    let plan = repos
        .plans
        .create(NewPlan::new(user.id, Month::January, Week::Week1))
        .await
        .unwrap();
    repos.tasks.create(task(plan.id, Day::Monday, "Draft report")).await.unwrap();
    repos
        .sessions
        .create(NewSession {
            session_id: "s-1".to_string(),
            user_id: user.id,
            token: "digest".to_string(),
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
        })
        .await
        .unwrap();

    repos.ministries.delete(health).await.unwrap();

    assert_eq!(repos.units.count(&UnitFilter::default()).await.unwrap(), 0);
    assert_eq!(repos.users.count(&UserFilter::default()).await.unwrap(), 0);
    assert_eq!(repos.tasks.count(&TaskFilter::default()).await.unwrap(), 0);
    assert!(repos.sessions.find_by_token("digest").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_delete_leaves_state_untouched() {
    // Placement cascades into users, whose plans are restricted
    let repos = Repositories::in_memory(DeletePolicy {
        organization: ReferentialAction::Cascade,
        user_placement: ReferentialAction::Cascade,
        user_plans: ReferentialAction::Restrict,
        plan_tasks: ReferentialAction::Cascade,
    });
    let health = ministry(&repos, "Health").await;
    let procurement = department(&repos, "Procurement", health).await;
    let user = repos
        .users
        .create(NewUser::new("EMP001", "hash").in_department(procurement))
        .await
        .unwrap();
    repos
        .plans
        .create(NewPlan::new(user.id, Month::January, Week::Week1))
        .await
        .unwrap();

    let err = repos.ministries.delete(health).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Restricted));
    assert!(repos.departments.exists(procurement).await.unwrap());
    assert!(repos.users.exists(user.id).await.unwrap());
}

#[tokio::test]
async fn test_plan_tasks_policy() {
    let cascade = Repositories::in_memory(DeletePolicy::default());
    let restrict = Repositories::in_memory(DeletePolicy::restrict_all());

    for repos in [&cascade, &restrict] {
        let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
        let plan = repos
            .plans
            .create(NewPlan::new(user.id, Month::January, Week::Week1))
            .await
            .unwrap();
        repos.tasks.create(task(plan.id, Day::Monday, "One")).await.unwrap();
        repos.tasks.create(task(plan.id, Day::Friday, "Two")).await.unwrap();
    }

    cascade.plans.delete(1).await.unwrap();
    assert_eq!(cascade.tasks.count(&TaskFilter::default()).await.unwrap(), 0);

    let err = restrict.plans.delete(1).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Restricted));
    assert_eq!(restrict.tasks.count(&TaskFilter::for_plan(1)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_status_counts_and_outcome_filter() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let plan = repos
        .plans
        .create(NewPlan::new(user.id, Month::January, Week::Week1))
        .await
        .unwrap();
    let first = repos.tasks.create(task(plan.id, Day::Monday, "One")).await.unwrap();
    repos
        .tasks
        .create(task(plan.id, Day::Tuesday, "Two").with_status(TaskStatus::InProgress))
        .await
        .unwrap();
    repos.tasks.create(task(plan.id, Day::Wednesday, "Three")).await.unwrap();
    repos
        .tasks
        .update(first.id, UpdateTask::outcome(Completion::Yes, None))
        .await
        .unwrap();

    let counts = repos.tasks.status_counts(&TaskFilter::for_plan(plan.id)).await.unwrap();
    assert_eq!(counts.get(&TaskStatus::Pending), Some(&2));
    assert_eq!(counts.get(&TaskStatus::InProgress), Some(&1));
    assert_eq!(counts.get(&TaskStatus::Completed), None);

    let unassessed = TaskFilter {
        completed: Some(None),
        ..TaskFilter::for_plan(plan.id)
    };
    assert_eq!(repos.tasks.count(&unassessed).await.unwrap(), 2);
}

#[tokio::test]
async fn test_sessions() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let new_session = |id: &str, token: &str| NewSession {
        session_id: id.to_string(),
        user_id: user.id,
        token: token.to_string(),
        ip_address: "10.0.0.1".to_string(),
        user_agent: "cli".to_string(),
    };

    let session = repos.sessions.create(new_session("s-1", "t-1")).await.unwrap();
    let err = repos.sessions.create(new_session("s-1", "t-2")).await.unwrap_err();
    assert!(err.constraint().unwrap().involves("session_id"));

    let later = session.last_activity + chrono::Duration::minutes(5);
    repos.sessions.touch(session.id, later).await.unwrap();
    let found = repos.sessions.find_by_session_id("s-1").await.unwrap().unwrap();
    assert_eq!(found.last_activity, later);

    repos.sessions.create(new_session("s-2", "t-2")).await.unwrap();
    let purged = repos
        .sessions
        .delete_inactive_since(later)
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert_eq!(repos.sessions.delete_for_user(user.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_session_token_unique() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let new_session = |id: &str, token: &str| NewSession {
        session_id: id.to_string(),
        user_id: user.id,
        token: token.to_string(),
        ip_address: "10.0.0.1".to_string(),
        user_agent: "cli".to_string(),
    };

    let session = repos.sessions.create(new_session("s-1", "t-1")).await.unwrap();
    let err = repos.sessions.create(new_session("s-2", "t-1")).await.unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::Unique));
    assert!(err.constraint().unwrap().involves("token"));

    // Updates cannot change the token, and the key still holds after one
    repos
        .sessions
        .update(
            session.id,
            UpdateSession {
                ip_address: Some("10.0.0.2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = repos.sessions.create(new_session("s-3", "t-1")).await.unwrap_err();
    assert!(err.constraint().unwrap().involves("token"));

    assert_eq!(repos.sessions.count(&SessionFilter::default()).await.unwrap(), 1);
    let found = repos.sessions.find_by_token("t-1").await.unwrap().unwrap();
    assert_eq!(found.session_id, "s-1");
    assert_eq!(found.ip_address, "10.0.0.2");
}

#[tokio::test]
async fn test_guarded_writes_respect_approval() {
    let repos = Repositories::in_memory(DeletePolicy::default());
    let user = repos.users.create(NewUser::new("EMP001", "hash")).await.unwrap();
    let plan = repos
        .plans
        .create(NewPlan::new(user.id, Month::January, Week::Week1))
        .await
        .unwrap();
    let first = repos
        .tasks
        .create_in_open_plan(task(plan.id, Day::Monday, "Draft report"))
        .await
        .unwrap();
    let rename = || UpdateTask {
        title: Some("Final report".to_string()),
        ..Default::default()
    };
    repos.tasks.update_in_open_plan(first.id, rename()).await.unwrap();

    repos.plans.update(plan.id, UpdatePlan::approval(true)).await.unwrap();

    let err = repos
        .tasks
        .create_in_open_plan(task(plan.id, Day::Tuesday, "Site visit"))
        .await
        .unwrap_err();
    assert!(err.is_locked());
    assert!(repos.tasks.update_in_open_plan(first.id, rename()).await.unwrap_err().is_locked());
    assert!(repos.tasks.delete_in_open_plan(first.id).await.unwrap_err().is_locked());

    let move_week = || UpdatePlan {
        week: Some(Week::Week2),
        ..Default::default()
    };
    assert!(repos.plans.update_open(plan.id, move_week()).await.unwrap_err().is_locked());
    assert!(repos.plans.delete_open(plan.id).await.unwrap_err().is_locked());
    assert_eq!(repos.tasks.count(&TaskFilter::for_plan(plan.id)).await.unwrap(), 1);

    let err = repos
        .tasks
        .create_in_open_plan(task(404, Day::Monday, "Orphan"))
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ConstraintKind::MissingReference));
    assert!(repos.tasks.update_in_open_plan(999, rename()).await.unwrap_err().is_not_found());
    assert!(repos.plans.delete_open(999).await.unwrap_err().is_not_found());

    repos.plans.update(plan.id, UpdatePlan::approval(false)).await.unwrap();
    repos.plans.update_open(plan.id, move_week()).await.unwrap();
    repos.tasks.delete_in_open_plan(first.id).await.unwrap();
    repos.plans.delete_open(plan.id).await.unwrap();
    assert!(!repos.plans.exists(plan.id).await.unwrap());
}
