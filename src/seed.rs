//! Demo fixture: a root organization with two children, one user per role,
//! and a handful of tasks. Accounts are provisioned here (or by whatever
//! identity flow fronts the service) rather than through a self-service
//! endpoint, so role and organization are never client-supplied.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::Role;
use crate::utils::{hash_password, utc_now};

pub const DEMO_PASSWORD: &str = "password123";

pub async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
    let now = utc_now();

    let headquarters = insert_organization(pool, "Headquarters", None, now).await?;
    let engineering = insert_organization(pool, "Engineering", Some(headquarters), now).await?;
    let sales = insert_organization(pool, "Sales", Some(headquarters), now).await?;

    let owner = insert_user(pool, "owner@example.com", Role::Owner, headquarters, now).await?;
    let admin = insert_user(pool, "admin@example.com", Role::Admin, engineering, now).await?;
    let viewer = insert_user(pool, "viewer@example.com", Role::Viewer, sales, now).await?;

    insert_task(
        pool,
        headquarters,
        owner,
        "Implement access control",
        "Gate every task operation behind the policy",
        "Work",
        "To Do",
        now,
    )
    .await?;
    insert_task(
        pool,
        engineering,
        admin,
        "Write unit tests",
        "Add test coverage for auth and tasks",
        "Work",
        "In Progress",
        now,
    )
    .await?;
    insert_task(
        pool,
        sales,
        viewer,
        "Review documentation",
        "Check README and API docs",
        "Work",
        "To Do",
        now,
    )
    .await?;
    insert_task(
        pool,
        headquarters,
        owner,
        "Buy groceries",
        "Get milk, eggs, and bread from the store",
        "Personal",
        "To Do",
        now,
    )
    .await?;
    insert_task(
        pool,
        engineering,
        admin,
        "Deploy to production",
        "Ship the tracker to the production environment",
        "Work",
        "Done",
        now,
    )
    .await?;

    tracing::info!("database seeded");
    tracing::info!("owner:  owner@example.com / {DEMO_PASSWORD}");
    tracing::info!("admin:  admin@example.com / {DEMO_PASSWORD}");
    tracing::info!("viewer: viewer@example.com / {DEMO_PASSWORD}");

    Ok(())
}

/// Remove all seeded data so `seed` can run against a used database.
pub async fn wipe(pool: &SqlitePool) -> anyhow::Result<()> {
    for table in ["event_store", "activity_log", "tasks", "users", "organizations"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn insert_organization(
    pool: &SqlitePool,
    name: &str,
    parent_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO organizations (id, name, parent_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(parent_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    role: Role,
    organization_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let password_hash = hash_password(DEMO_PASSWORD)?;

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, role, organization_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(organization_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

#[allow(clippy::too_many_arguments)]
async fn insert_task(
    pool: &SqlitePool,
    organization_id: Uuid,
    created_by_id: Uuid,
    title: &str,
    description: &str,
    category: &str,
    status: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tasks (id, organization_id, created_by_id, title, description, category, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(organization_id)
    .bind(created_by_id)
    .bind(title)
    .bind(description)
    .bind(category)
    .bind(status)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}
