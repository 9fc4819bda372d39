use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// One row of `student_profiles`, validated at the repository boundary.
#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub student_id: Uuid,
    pub total_xp: i64,
    pub level: i32,
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub lessons_completed: i32,
    pub courses_completed: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AwardResult {
    pub student_id: Uuid,
    pub previous_total: i64,
    pub new_total: i64,
    pub amount_awarded: i64,
    pub previous_level: i32,
    pub new_level: i32,
    pub leveled_up: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreakUpdate {
    pub previous_streak: i32,
    pub new_streak: i32,
    pub updated: bool,
}

/// Level standing derived from a cumulative XP total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: i32,
    pub current_level_threshold: i64,
    pub next_level_threshold: Option<i64>,
    pub progress_percent: i32,
    pub experience_to_next: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelStanding {
    pub student_id: Uuid,
    pub total_experience: i64,
    #[serde(flatten)]
    pub info: LevelInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreakStatus {
    pub streak_days: i32,
    pub last_streak_date: Option<NaiveDate>,
    pub active: bool,
}

/// Read-only ranking projection; lives only for the duration of one query.
#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub position: i64,
    pub student_id: Uuid,
    pub display_name: String,
    pub key_value: i64,
    pub level: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionInfo {
    pub position: i64,
    pub total_population: i64,
    pub percentile: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub first_completion: bool,
    pub award: Option<AwardResult>,
    pub streak: Option<StreakUpdate>,
}
