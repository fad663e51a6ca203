//! SurrealDB schema migrations and initialization
//!
//! Sets up the governance tables with their uniqueness constraints,
//! lookup indexes and write permissions.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all governance tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing maturity governance schema");

    init_agents_table(db).await?;
    init_exams_table(db).await?;
    init_promotion_history_table(db).await?;
    init_edge_cases_table(db).await?;
    init_users_table(db).await?;

    info!("Maturity governance schema initialization complete");
    Ok(())
}

/// Initialize `agents` table
///
/// Schema:
/// ```text
/// TABLE agents {
///   agent_id:          STRING (unique per tenant)
///   tenant_id:         STRING (indexed)
///   name:              STRING
///   category:          STRING?
///   status:            STRING (STUDENT | INTERN | SUPERVISED | AUTONOMOUS)
///   confidence_score:  FLOAT (0.0 ..= 1.0)
///   promotion_count:   INT
///   last_promotion_at: DATETIME?
///   exam_eligible_at:  DATETIME?
///   last_exam_id:      STRING?
///   created_at:        DATETIME
///   updated_at:        DATETIME
/// }
/// ```
async fn init_agents_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing agents table");

    let sql = r#"
        DEFINE TABLE agents AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX idx_tenant_agent ON TABLE agents COLUMNS tenant_id, agent_id UNIQUE;
        DEFINE INDEX idx_tenant ON TABLE agents COLUMNS tenant_id;
        DEFINE INDEX idx_status ON TABLE agents COLUMNS status;
    "#;

    db.query(sql).await?;
    info!("✓ agents table initialized");
    Ok(())
}

/// Initialize `exams` table
///
/// Completed exams are immutable: one row per run, written inside the
/// exam commit transaction. `detail` holds the full exam record.
async fn init_exams_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing exams table");

    let sql = r#"
        DEFINE TABLE exams AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX idx_exam_id ON TABLE exams COLUMNS exam_id UNIQUE;
        DEFINE INDEX idx_tenant_agent_completed ON TABLE exams COLUMNS tenant_id, agent_id, completed_at;
    "#;

    db.query(sql).await?;
    info!("✓ exams table initialized");
    Ok(())
}

/// Initialize `promotion_history` table
///
/// Append-only: entries are never updated or deleted.
async fn init_promotion_history_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing promotion_history table");

    let sql = r#"
        DEFINE TABLE promotion_history AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX idx_entry_id ON TABLE promotion_history COLUMNS entry_id UNIQUE;

        -- Newest-first history per agent
        DEFINE INDEX idx_tenant_agent_promoted_at ON TABLE promotion_history COLUMNS tenant_id, agent_id, promoted_at;

        DEFINE INDEX idx_promotion_type ON TABLE promotion_history COLUMNS promotion_type;
    "#;

    db.query(sql).await?;
    info!("✓ promotion_history table initialized");
    Ok(())
}

/// Initialize `edge_cases` table
///
/// `tenant_id` is NONE for global cases; `is_global` mirrors that so the
/// visibility filter stays a plain boolean test.
async fn init_edge_cases_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing edge_cases table");

    let sql = r#"
        DEFINE TABLE edge_cases AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete FULL;

        DEFINE INDEX idx_case_id ON TABLE edge_cases COLUMNS case_id UNIQUE;
        DEFINE INDEX idx_active_tenant ON TABLE edge_cases COLUMNS active, tenant_id;
    "#;

    db.query(sql).await?;
    info!("✓ edge_cases table initialized");
    Ok(())
}

/// Initialize `users` table
async fn init_users_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing users table");

    let sql = r#"
        DEFINE TABLE users AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete FULL;

        DEFINE INDEX idx_user_id ON TABLE users COLUMNS user_id UNIQUE;
    "#;

    db.query(sql).await?;
    info!("✓ users table initialized");
    Ok(())
}
