use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::achievements;
use crate::db::ProfileRepository;
use crate::error::{GamificationError, Result};
use crate::levels::LevelTable;
use crate::models::{
    Achievement, AwardResult, CompletionResult, LevelStanding, StreakStatus, StreakUpdate,
};
use crate::streak;

/// XP granted for a lesson when the event carries no explicit amount.
pub const DEFAULT_LESSON_XP: i64 = 50;

/// XP granted for finishing a whole course.
pub const DEFAULT_COURSE_XP: i64 = 200;

pub async fn award_experience(
    repo: &ProfileRepository,
    levels: &LevelTable,
    student_id: Uuid,
    amount: i64,
    reason: &str,
) -> Result<AwardResult> {
    if amount <= 0 {
        return Err(GamificationError::InvalidArgument(format!(
            "award amount must be positive, got {amount}"
        )));
    }

    let result = repo.apply_award(student_id, amount, levels, reason).await?;
    info!(
        %student_id,
        amount,
        new_total = result.new_total,
        new_level = result.new_level,
        leveled_up = result.leveled_up,
        reason,
        "experience awarded"
    );
    Ok(result)
}

pub async fn register_activity(
    repo: &ProfileRepository,
    student_id: Uuid,
    activity_date: NaiveDate,
) -> Result<StreakUpdate> {
    let update = repo.apply_activity(student_id, activity_date).await?;
    if update.updated {
        info!(%student_id, streak = update.new_streak, %activity_date, "streak updated");
    }
    Ok(update)
}

pub async fn level_standing(
    repo: &ProfileRepository,
    levels: &LevelTable,
    student_id: Uuid,
) -> Result<LevelStanding> {
    let profile = repo.get_profile(student_id).await?;
    Ok(LevelStanding {
        student_id,
        total_experience: profile.total_xp,
        info: levels.level_info(profile.total_xp),
    })
}

/// Streak as shown on the dashboard: a lapsed streak displays as zero while
/// the stored counter waits for the next activity to apply the reset.
pub async fn streak_status(
    repo: &ProfileRepository,
    student_id: Uuid,
    reference_date: NaiveDate,
) -> Result<StreakStatus> {
    let profile = repo.get_profile(student_id).await?;
    let active = streak::is_active(profile.last_streak_date, reference_date);
    Ok(StreakStatus {
        streak_days: if active { profile.streak_days } else { 0 },
        last_streak_date: profile.last_streak_date,
        active,
    })
}

pub async fn student_achievements(
    repo: &ProfileRepository,
    student_id: Uuid,
) -> Result<Vec<Achievement>> {
    let profile = repo.get_profile(student_id).await?;
    Ok(achievements::derive_achievements(&profile))
}

/// The lesson-completion trigger. Only a first-time completion feeds the
/// counters, the XP award, and the streak; a repeat is reported back without
/// touching the profile.
pub async fn complete_lesson(
    repo: &ProfileRepository,
    levels: &LevelTable,
    student_id: Uuid,
    lesson_id: &str,
    xp: i64,
    completed_at: NaiveDate,
) -> Result<CompletionResult> {
    let first = repo
        .record_completion(student_id, lesson_id, completed_at)
        .await?;
    if !first {
        return Ok(CompletionResult {
            first_completion: false,
            award: None,
            streak: None,
        });
    }

    let award = award_experience(repo, levels, student_id, xp, "lesson completed").await?;
    let streak = register_activity(repo, student_id, completed_at).await?;
    Ok(CompletionResult {
        first_completion: true,
        award: Some(award),
        streak: Some(streak),
    })
}

/// Course counterpart of `complete_lesson`: the first finish of a course
/// bumps `courses_completed`, awards XP, and counts as streak activity.
pub async fn complete_course(
    repo: &ProfileRepository,
    levels: &LevelTable,
    student_id: Uuid,
    course_id: &str,
    xp: i64,
    completed_at: NaiveDate,
) -> Result<CompletionResult> {
    let first = repo
        .record_course_completion(student_id, course_id, completed_at)
        .await?;
    if !first {
        return Ok(CompletionResult {
            first_completion: false,
            award: None,
            streak: None,
        });
    }

    let award = award_experience(repo, levels, student_id, xp, "course completed").await?;
    let streak = register_activity(repo, student_id, completed_at).await?;
    Ok(CompletionResult {
        first_completion: true,
        award: Some(award),
        streak: Some(streak),
    })
}

#[derive(Debug, serde::Deserialize)]
struct CompletionCsvRow {
    full_name: String,
    email: String,
    lesson_id: String,
    xp: Option<i64>,
    completed_at: NaiveDate,
}

/// Seed a handful of students with completion history run through the real
/// pipeline, so a fresh database has distinct XP totals, streaks, and
/// leaderboard positions to look at.
pub async fn seed(repo: &ProfileRepository, levels: &LevelTable) -> anyhow::Result<()> {
    let students: Vec<(&str, &str, &[(&str, u32)])> = vec![
        (
            "Lucía Fernández",
            "lucia.fernandez@speaklexi.com",
            &[
                ("es-basics-01", 2),
                ("es-basics-02", 3),
                ("es-basics-03", 4),
                ("es-basics-04", 5),
                ("es-basics-05", 6),
            ],
        ),
        (
            "Mateo Rojas",
            "mateo.rojas@speaklexi.com",
            &[
                ("es-basics-01", 1),
                ("es-basics-02", 4),
                ("es-basics-03", 5),
            ],
        ),
        (
            "Valentina Cruz",
            "valentina.cruz@speaklexi.com",
            &[("es-basics-01", 6)],
        ),
        ("Diego Herrera", "diego.herrera@speaklexi.com", &[]),
    ];

    for (full_name, email, lessons) in students {
        let student_id = repo.ensure_student(full_name, email).await?;
        for (lesson_id, day) in lessons {
            let completed_at =
                NaiveDate::from_ymd_opt(2026, 2, *day).context("invalid date")?;
            complete_lesson(
                repo,
                levels,
                student_id,
                lesson_id,
                DEFAULT_LESSON_XP,
                completed_at,
            )
            .await?;
        }
    }

    // One finished course so the course counter and its achievement show up.
    let lucia = repo
        .ensure_student("Lucía Fernández", "lucia.fernandez@speaklexi.com")
        .await?;
    complete_course(
        repo,
        levels,
        lucia,
        "es-basics",
        DEFAULT_COURSE_XP,
        NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?,
    )
    .await?;

    Ok(())
}

/// Replay completion events from a CSV export through the full pipeline.
/// Returns how many rows were first-time completions.
pub async fn import_completions(
    repo: &ProfileRepository,
    levels: &LevelTable,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CompletionCsvRow>() {
        let row = result?;
        let student_id = repo.ensure_student(&row.full_name, &row.email).await?;
        let outcome = complete_lesson(
            repo,
            levels,
            student_id,
            &row.lesson_id,
            row.xp.unwrap_or(DEFAULT_LESSON_XP),
            row.completed_at,
        )
        .await?;
        if outcome.first_completion {
            imported += 1;
        }
    }

    Ok(imported)
}
