use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod achievements;
mod db;
mod engine;
mod error;
mod levels;
mod models;
mod ranking;
mod streak;

use db::ProfileRepository;
use levels::LevelTable;
use ranking::RankScope;

#[derive(Parser)]
#[command(name = "speaklexi-gamification")]
#[command(about = "XP, streak, and leaderboard engine for SpeakLexi", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Replay lesson completion events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Award experience points to a student
    Award {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "manual grant")]
        reason: String,
    },
    /// Register a qualifying activity against the daily streak
    Activity {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record a lesson completion (first completion awards XP and streak)
    CompleteLesson {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        lesson: String,
        #[arg(long, default_value_t = engine::DEFAULT_LESSON_XP)]
        xp: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record a course completion (first completion awards XP and streak)
    CompleteCourse {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        course: String,
        #[arg(long, default_value_t = engine::DEFAULT_COURSE_XP)]
        xp: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show a student's level and progress toward the next one
    Level {
        #[arg(long)]
        student: Uuid,
    },
    /// Show a student's streak status
    Streak {
        #[arg(long)]
        student: Uuid,
    },
    /// Show a student's derived achievements
    Achievements {
        #[arg(long)]
        student: Uuid,
    },
    /// Show a leaderboard page
    #[command(group(
        ArgGroup::new("scope")
            .args(["from", "level"])
            .multiple(false)
    ))]
    Ranking {
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        #[arg(long)]
        level: Option<i32>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Show a student's position within a leaderboard scope
    #[command(group(
        ArgGroup::new("scope")
            .args(["from", "level"])
            .multiple(false)
    ))]
    Position {
        #[arg(long)]
        student: Uuid,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        #[arg(long)]
        level: Option<i32>,
    },
}

fn parse_scope(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    level: Option<i32>,
) -> RankScope {
    if let Some(level) = level {
        RankScope::Bracket { level }
    } else if let (Some(start), Some(end)) = (from, to) {
        RankScope::Windowed { start, end }
    } else {
        RankScope::Global
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let repo = ProfileRepository::new(pool);
    let levels = LevelTable::default();

    match cli.command {
        Commands::InitDb => {
            repo.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            engine::seed(&repo, &levels).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = engine::import_completions(&repo, &levels, &csv).await?;
            println!("Imported {imported} completions from {}.", csv.display());
        }
        Commands::Award {
            student,
            amount,
            reason,
        } => {
            let result = engine::award_experience(&repo, &levels, student, amount, &reason).await?;
            println!(
                "Awarded {} XP to {} ({} -> {} XP, level {} -> {}{}).",
                result.amount_awarded,
                student,
                result.previous_total,
                result.new_total,
                result.previous_level,
                result.new_level,
                if result.leveled_up { ", leveled up!" } else { "" }
            );
        }
        Commands::Activity { student, date } => {
            let activity_date = date.unwrap_or_else(|| Utc::now().date_naive());
            let update = engine::register_activity(&repo, student, activity_date).await?;
            if update.updated {
                println!(
                    "Streak for {student}: {} -> {} days.",
                    update.previous_streak, update.new_streak
                );
            } else {
                println!(
                    "Streak for {student} unchanged at {} days.",
                    update.new_streak
                );
            }
        }
        Commands::CompleteLesson {
            student,
            lesson,
            xp,
            date,
        } => {
            let completed_at = date.unwrap_or_else(|| Utc::now().date_naive());
            let outcome =
                engine::complete_lesson(&repo, &levels, student, &lesson, xp, completed_at).await?;
            if outcome.first_completion {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Lesson {lesson} was already completed by {student}.");
            }
        }
        Commands::CompleteCourse {
            student,
            course,
            xp,
            date,
        } => {
            let completed_at = date.unwrap_or_else(|| Utc::now().date_naive());
            let outcome =
                engine::complete_course(&repo, &levels, student, &course, xp, completed_at).await?;
            if outcome.first_completion {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Course {course} was already completed by {student}.");
            }
        }
        Commands::Level { student } => {
            let standing = engine::level_standing(&repo, &levels, student).await?;
            println!("{}", serde_json::to_string_pretty(&standing)?);
        }
        Commands::Streak { student } => {
            let status = engine::streak_status(&repo, student, Utc::now().date_naive()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Achievements { student } => {
            let achievements = engine::student_achievements(&repo, student).await?;
            let unlocked = achievements.iter().filter(|a| a.unlocked).count();
            println!("{}", serde_json::to_string_pretty(&achievements)?);
            println!("{unlocked} of {} unlocked.", achievements.len());
        }
        Commands::Ranking {
            from,
            to,
            level,
            limit,
            offset,
        } => {
            let scope = parse_scope(from, to, level);
            let entries = repo.fetch_ranking(scope, limit, offset).await?;
            if entries.is_empty() {
                println!("No students in this scope.");
            } else {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
        }
        Commands::Position {
            student,
            from,
            to,
            level,
        } => {
            let scope = parse_scope(from, to, level);
            let position = repo.fetch_position(student, scope).await?;
            println!("{}", serde_json::to_string_pretty(&position)?);
        }
    }

    Ok(())
}
