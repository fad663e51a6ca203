//! Maturity - agent maturity governance admin CLI
//!
//! The `maturity` command drives the governance engine against a SurrealDB
//! store.
//!
//! ## Commands
//!
//! - `agent`: register an agent or show its ladder summary
//! - `user`, `edge-case`: seed the user directory and edge-case library
//! - `check`, `enforce`, `capabilities`, `access`: permission queries
//! - `feedback`: apply confidence feedback
//! - `exam`: run a graduation exam with collaborators from a JSON fixture
//! - `promote`, `demote`, `history`: manual status changes and the ledger

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use maturity_core::{
    ExamOutcome, FixtureCollaborators, GovernanceConfig, GovernanceEngine, Impact, MaturityLevel,
    StatusChangeOutcome,
};
use maturity_state::{
    AgentRecord, AgentRecordStore, EdgeCaseLibrary, EdgeCaseRecord, SurrealGovernanceStore,
    UserDirectory, UserRecord,
};

type Engine = GovernanceEngine<SurrealGovernanceStore>;

#[derive(Parser)]
#[command(name = "maturity")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent maturity governance and graduation exams", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// Governance config file (JSON); MATURITY_* env vars override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database URL (mem://, surrealkv://path, ws://host:port)
    #[arg(long, global = true, env = "SURREALDB_URL")]
    db: Option<String>,

    /// Tenant that owns the agents being addressed
    #[arg(long, global = true, env = "MATURITY_TENANT", default_value = "default")]
    tenant: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register or inspect agents
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Manage the user directory
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage the edge-case library
    EdgeCase {
        #[command(subcommand)]
        action: EdgeCaseAction,
    },

    /// Decide whether an agent may perform an action
    Check {
        agent_id: String,
        action: String,
    },

    /// Decide and translate into a proceed/block verdict
    Enforce {
        agent_id: String,
        action: String,
    },

    /// List the actions an agent may and may not perform
    Capabilities { agent_id: String },

    /// Apply one piece of confidence feedback
    Feedback {
        agent_id: String,

        /// Negative feedback (default is positive)
        #[arg(long)]
        negative: bool,

        /// Feedback impact: low or high
        #[arg(long, default_value = "low")]
        impact: Impact,
    },

    /// Run a graduation exam
    Exam {
        agent_id: String,

        /// JSON fixture with readiness, episodes, skill and simulation outcomes
        #[arg(long)]
        fixture: PathBuf,

        /// Target level; must be the next rung (the default)
        #[arg(long)]
        target: Option<MaturityLevel>,

        /// Run even while the failed-exam cooldown is active
        #[arg(long)]
        force: bool,
    },

    /// Manually set an agent's level
    Promote {
        agent_id: String,
        level: String,

        #[arg(long, default_value = "admin")]
        actor: String,

        #[arg(long)]
        justification: Option<String>,
    },

    /// Move an agent down the ladder
    Demote {
        agent_id: String,
        level: String,

        #[arg(long, default_value = "admin")]
        actor: String,

        #[arg(long)]
        justification: Option<String>,
    },

    /// Show the promotion ledger for an agent
    History {
        agent_id: String,

        /// Maximum number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Check whether a user may read an agent's data
    Access { user_id: String, agent_id: String },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Register a new agent at STUDENT
    Register {
        agent_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        category: Option<String>,

        /// Initial confidence score
        #[arg(long, default_value = "0.5")]
        confidence: f64,
    },

    /// Show level, confidence, latest exam and recent ledger entries
    Show { agent_id: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// Add or replace a user
    Add {
        user_id: String,

        #[arg(long)]
        role: String,

        #[arg(long)]
        specialty: Option<String>,
    },
}

#[derive(Subcommand)]
enum EdgeCaseAction {
    /// Add or replace an edge case (global unless --scoped)
    Add {
        case_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        violation_type: String,

        #[arg(long)]
        description: Option<String>,

        /// Restrict the case to the current tenant
        #[arg(long)]
        scoped: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    if !maturity_core::telemetry::init_tracing(cli.json, level) {
        eprintln!("warning: tracing subscriber already installed");
    }

    let config = load_config(cli.config.as_deref())?;
    let store = match cli.db.as_deref() {
        Some(url) => SurrealGovernanceStore::connect(url).await,
        None => SurrealGovernanceStore::from_env().await,
    }
    .context("Failed to connect to governance database")?;
    let engine = GovernanceEngine::new(Arc::new(store), config)
        .context("Invalid governance configuration")?;

    let out = Output { json: cli.json };
    let result = run(&engine, &cli.tenant, cli.command, out).await;
    maturity_core::metrics::METRICS.flush();
    result
}

fn load_config(path: Option<&Path>) -> Result<GovernanceConfig> {
    let base = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .context(format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<GovernanceConfig>(&raw)
                .context(format!("Failed to parse config {}", path.display()))?
        }
        None => GovernanceConfig::default(),
    };
    base.with_env_overrides()
        .context("Invalid MATURITY_* environment override")
}

#[derive(Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    /// Print `value` as JSON, or run `human` for plain output.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

async fn run(engine: &Engine, tenant: &str, command: Commands, out: Output) -> Result<()> {
    match command {
        Commands::Agent { action } => match action {
            AgentAction::Register {
                agent_id,
                name,
                category,
                confidence,
            } => cmd_agent_register(engine, tenant, &agent_id, &name, category, confidence, out).await,
            AgentAction::Show { agent_id } => cmd_agent_show(engine, tenant, &agent_id, out).await,
        },
        Commands::User { action } => match action {
            UserAction::Add {
                user_id,
                role,
                specialty,
            } => cmd_user_add(engine, &user_id, &role, specialty, out).await,
        },
        Commands::EdgeCase { action } => match action {
            EdgeCaseAction::Add {
                case_id,
                name,
                violation_type,
                description,
                scoped,
            } => {
                let owner = scoped.then(|| tenant.to_string());
                let mut case = EdgeCaseRecord::new(case_id, name, violation_type, owner);
                case.description = description;
                cmd_edge_case_add(engine, case, out).await
            }
        },
        Commands::Check { agent_id, action } => {
            cmd_check(engine, tenant, &agent_id, &action, out).await
        }
        Commands::Enforce { agent_id, action } => {
            cmd_enforce(engine, tenant, &agent_id, &action, out).await
        }
        Commands::Capabilities { agent_id } => {
            cmd_capabilities(engine, tenant, &agent_id, out).await
        }
        Commands::Feedback {
            agent_id,
            negative,
            impact,
        } => cmd_feedback(engine, tenant, &agent_id, !negative, impact, out).await,
        Commands::Exam {
            agent_id,
            fixture,
            target,
            force,
        } => cmd_exam(engine, tenant, &agent_id, &fixture, target, force, out).await,
        Commands::Promote {
            agent_id,
            level,
            actor,
            justification,
        } => {
            let outcome = engine
                .promotions
                .promote_agent_manually(tenant, &agent_id, &level, &actor, justification)
                .await
                .context(format!("Failed to promote {}", agent_id))?;
            print_status_change(&outcome, out)
        }
        Commands::Demote {
            agent_id,
            level,
            actor,
            justification,
        } => {
            let outcome = engine
                .promotions
                .demote_agent(tenant, &agent_id, &level, &actor, justification)
                .await
                .context(format!("Failed to demote {}", agent_id))?;
            print_status_change(&outcome, out)
        }
        Commands::History { agent_id, limit } => {
            cmd_history(engine, tenant, &agent_id, limit, out).await
        }
        Commands::Access { user_id, agent_id } => {
            cmd_access(engine, tenant, &user_id, &agent_id, out).await
        }
    }
}

async fn cmd_agent_register(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    name: &str,
    category: Option<String>,
    confidence: f64,
    out: Output,
) -> Result<()> {
    let mut agent = AgentRecord::new(tenant, agent_id, name).with_confidence(confidence);
    agent.category = category;

    let agent = engine
        .store()
        .register(agent)
        .await
        .context(format!("Failed to register agent {}", agent_id))?;
    info!(agent_id = %agent.agent_id, "agent registered");

    out.emit(&agent, |a| {
        println!(
            "Registered {} ({}) at {} with confidence {:.2}",
            a.agent_id,
            a.name,
            a.status,
            a.confidence_score()
        );
    })
}

async fn cmd_agent_show(engine: &Engine, tenant: &str, agent_id: &str, out: Output) -> Result<()> {
    let summary = engine
        .promotions
        .promotion_summary(tenant, agent_id)
        .await
        .context(format!("Failed to load agent {}", agent_id))?;

    out.emit(&summary, |s| {
        println!("Agent:        {} (tenant {})", s.agent_id, s.tenant_id);
        println!("Level:        {}", s.current_level);
        println!(
            "Confidence:   {:.2} (suggests {})",
            s.confidence_score, s.display_status
        );
        println!("Promotions:   {}", s.promotion_count);
        if let Some(at) = s.last_promotion_at {
            println!("Promoted at:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(until) = s.exam_eligible_at {
            println!("Exam cooldown until {}", until.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(exam) = &s.latest_exam {
            let verdict = if exam.passed { "PASSED" } else { "FAILED" };
            println!(
                "Latest exam:  {} {} -> {} {}",
                exam.exam_id, exam.current_level, exam.target_level, verdict
            );
        }
        for entry in &s.recent_history {
            println!(
                "  {} {} -> {} ({})",
                entry.promoted_at.format("%Y-%m-%d %H:%M"),
                entry.from_level,
                entry.to_level,
                entry.promotion_type.as_str()
            );
        }
    })
}

async fn cmd_user_add(
    engine: &Engine,
    user_id: &str,
    role: &str,
    specialty: Option<String>,
    out: Output,
) -> Result<()> {
    let mut user = UserRecord::new(user_id, role);
    user.specialty = specialty;
    engine
        .store()
        .put_user(user.clone())
        .await
        .context(format!("Failed to store user {}", user_id))?;

    out.emit(&user, |u| println!("Stored user {} ({})", u.user_id, u.role))
}

async fn cmd_edge_case_add(engine: &Engine, case: EdgeCaseRecord, out: Output) -> Result<()> {
    engine
        .store()
        .add_edge_case(case.clone())
        .await
        .context(format!("Failed to store edge case {}", case.case_id))?;

    out.emit(&case, |c| {
        let scope = c.tenant_id.as_deref().unwrap_or("global");
        println!("Stored edge case {} [{}] ({})", c.case_id, c.violation_type, scope);
    })
}

async fn cmd_check(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    action: &str,
    out: Output,
) -> Result<()> {
    let decision = engine
        .policy
        .can_perform_action(tenant, agent_id, action)
        .await
        .context(format!("Failed to check {} for {}", action, agent_id))?;

    out.emit(&decision, |d| {
        let verdict = if d.allowed { "ALLOW" } else { "DENY" };
        println!("{}: {}", verdict, d.reason);
        if d.requires_human_approval {
            println!("Human approval required");
        }
    })
}

async fn cmd_enforce(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    action: &str,
    out: Output,
) -> Result<()> {
    let result = engine
        .policy
        .enforce_action(tenant, agent_id, action)
        .await
        .context(format!("Failed to enforce {} for {}", action, agent_id))?;

    out.emit(&result, |r| {
        println!("{:?}: {}", r.status, r.reason);
        if let Some(required) = r.action_required {
            println!("Action required: {:?}", required);
        }
    })
}

async fn cmd_capabilities(engine: &Engine, tenant: &str, agent_id: &str, out: Output) -> Result<()> {
    let caps = engine
        .policy
        .get_agent_capabilities(tenant, agent_id)
        .await
        .context(format!("Failed to load capabilities for {}", agent_id))?;

    out.emit(&caps, |c| {
        println!(
            "{} at {} (max complexity {})",
            c.agent_id, c.maturity_level, c.max_complexity
        );
        println!("Allowed:    {}", c.allowed_actions.join(", "));
        println!("Restricted: {}", c.restricted_actions.join(", "));
    })
}

async fn cmd_feedback(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    positive: bool,
    impact: Impact,
    out: Output,
) -> Result<()> {
    let update = engine
        .confidence
        .update_confidence(tenant, agent_id, positive, impact)
        .await
        .context(format!("Failed to update confidence for {}", agent_id))?;

    out.emit(&update, |u| {
        println!(
            "Confidence {:.2} -> {:.2} ({:+.2}); level {} (score suggests {})",
            u.previous, u.current, u.delta, u.status, u.derived_status
        );
    })
}

async fn cmd_exam(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    fixture: &Path,
    target: Option<MaturityLevel>,
    force: bool,
    out: Output,
) -> Result<()> {
    let raw = std::fs::read_to_string(fixture)
        .context(format!("Failed to read fixture {}", fixture.display()))?;
    let collaborators = Arc::new(
        FixtureCollaborators::from_json(&raw)
            .context(format!("Failed to parse fixture {}", fixture.display()))?,
    );
    let pipeline = engine.exam_pipeline(collaborators.clone(), collaborators);

    let outcome = if force {
        pipeline.promote_via_exam(tenant, agent_id, target).await
    } else {
        pipeline.request_exam(tenant, agent_id, target).await
    }
    .context(format!("Failed to run exam for {}", agent_id))?;

    out.emit(&outcome, print_exam_outcome)
}

fn print_exam_outcome(outcome: &ExamOutcome) {
    match outcome {
        ExamOutcome::Completed(report) => {
            let record = &report.record;
            let verdict = if record.passed { "PASSED" } else { "FAILED" };
            println!(
                "Exam {} {} ({} -> {})",
                record.exam_id, verdict, record.current_level, record.target_level
            );
            println!(
                "Readiness {:.2}, edge cases {}/{}, violations {}, skill mastery {:.2}",
                record.readiness_score,
                record.edge_cases_passed,
                record.edge_cases_total,
                record.constitutional_violations.len(),
                record.skill_mastery_score
            );
            if let Some(reason) = &record.failure_reason {
                println!("Reason: {}", reason);
            }
            if let Some(until) = report.cooldown_until {
                println!("Next exam after {}", until.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("Level now {}", report.new_status);
        }
        ExamOutcome::NoFurtherLevel {
            agent_id,
            current_level,
        } => println!("{} is already {}; no exam needed", agent_id, current_level),
        ExamOutcome::Rejected { reason } => println!("Exam not run: {}", reason),
    }
}

fn print_status_change(outcome: &StatusChangeOutcome, out: Output) -> Result<()> {
    out.emit(outcome, |o| match o {
        StatusChangeOutcome::Applied { entry } => println!(
            "{} {} -> {} ({})",
            entry.agent_id,
            entry.from_level,
            entry.to_level,
            entry.promotion_type.as_str()
        ),
        StatusChangeOutcome::Rejected { reason } => println!("Rejected: {}", reason),
    })
}

async fn cmd_history(
    engine: &Engine,
    tenant: &str,
    agent_id: &str,
    limit: usize,
    out: Output,
) -> Result<()> {
    let history = engine
        .promotions
        .history(tenant, agent_id, limit)
        .await
        .context(format!("Failed to load history for {}", agent_id))?;

    out.emit(&history, |entries| {
        if entries.is_empty() {
            println!("No promotions recorded for '{}'", agent_id);
            return;
        }
        for entry in entries {
            println!(
                "{} {} -> {} {}",
                entry.promoted_at.format("%Y-%m-%d %H:%M:%S UTC"),
                entry.from_level,
                entry.to_level,
                entry.promotion_type.as_str()
            );
            if let Some(actor) = &entry.promoted_by {
                println!("    by {}", actor);
            }
            if let Some(justification) = &entry.justification {
                println!("    {}", justification);
            }
            if let Some(exam_id) = &entry.exam_id {
                println!("    exam {}", exam_id);
            }
        }
    })
}

async fn cmd_access(
    engine: &Engine,
    tenant: &str,
    user_id: &str,
    agent_id: &str,
    out: Output,
) -> Result<()> {
    let allowed = engine
        .policy
        .can_access_agent_data(tenant, user_id, agent_id)
        .await
        .context(format!("Failed to check access for {}", user_id))?;

    out.emit(&serde_json::json!({ "user_id": user_id, "agent_id": agent_id, "allowed": allowed }), |_| {
        let verdict = if allowed { "may" } else { "may not" };
        println!("{} {} read data of {}", user_id, verdict, agent_id);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine() -> Engine {
        let store = SurrealGovernanceStore::in_memory().await.unwrap();
        GovernanceEngine::new(Arc::new(store), GovernanceConfig::default()).unwrap()
    }

    const JSON_OUT: Output = Output { json: true };

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "maturity", "check", "a1", "read", "--tenant", "acme", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.tenant, "acme");
        assert!(matches!(cli.command, Commands::Check { .. }));
    }

    #[test]
    fn cli_parses_exam_target() {
        let cli = Cli::try_parse_from([
            "maturity",
            "exam",
            "a1",
            "--fixture",
            "fixture.json",
            "--target",
            "supervised",
        ])
        .unwrap();
        match cli.command {
            Commands::Exam { target, force, .. } => {
                assert_eq!(target, Some(MaturityLevel::Supervised));
                assert!(!force);
            }
            _ => panic!("expected exam command"),
        }
    }

    #[test]
    fn config_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance.json");
        std::fs::write(&path, r#"{"exam": {"cooldown_hours": 12}}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.exam.cooldown_hours, 12);
        assert_eq!(config.exam.episode_count, 30);
    }

    #[tokio::test]
    async fn register_feedback_and_check() {
        let engine = engine().await;
        run(
            &engine,
            "acme",
            Commands::Agent {
                action: AgentAction::Register {
                    agent_id: "a1".into(),
                    name: "Support Bot".into(),
                    category: None,
                    confidence: 0.5,
                },
            },
            JSON_OUT,
        )
        .await
        .unwrap();

        cmd_feedback(&engine, "acme", "a1", true, Impact::High, JSON_OUT)
            .await
            .unwrap();
        let agent = engine.store().get("acme", "a1").await.unwrap();
        assert!((agent.confidence_score() - 0.55).abs() < 1e-12);

        cmd_check(&engine, "acme", "a1", "read", JSON_OUT).await.unwrap();
        assert!(cmd_check(&engine, "acme", "ghost", "read", JSON_OUT)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn exam_from_fixture_file_promotes() {
        let engine = engine().await;
        engine
            .store()
            .register(AgentRecord::new("acme", "a1", "Bot").with_status(MaturityLevel::Intern))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        let fixture = serde_json::to_string(&FixtureCollaborators::passing()).unwrap();
        std::fs::write(&path, fixture).unwrap();

        cmd_exam(&engine, "acme", "a1", &path, None, false, JSON_OUT)
            .await
            .unwrap();

        let agent = engine.store().get("acme", "a1").await.unwrap();
        assert_eq!(agent.status, MaturityLevel::Supervised);
    }

    #[tokio::test]
    async fn demote_rejection_is_not_an_error() {
        let engine = engine().await;
        engine
            .store()
            .register(AgentRecord::new("acme", "a1", "Bot"))
            .await
            .unwrap();

        run(
            &engine,
            "acme",
            Commands::Demote {
                agent_id: "a1".into(),
                level: "INTERN".into(),
                actor: "admin".into(),
                justification: None,
            },
            JSON_OUT,
        )
        .await
        .unwrap();

        let agent = engine.store().get("acme", "a1").await.unwrap();
        assert_eq!(agent.status, MaturityLevel::Student);
    }
}
