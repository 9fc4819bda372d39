use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{GamificationError, Result};
use crate::levels::LevelTable;
use crate::models::{AwardResult, PositionInfo, RankingEntry, StreakUpdate, StudentProfile};
use crate::ranking::{self, RankScope};
use crate::streak::{self, StreakState};

/// The single store handle. Experience and streak mutations are per-student
/// read-modify-write sequences, so each runs in its own transaction with the
/// profile row locked; the two field groups are disjoint and updated
/// column-scoped, never as a whole-row replace.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn get_profile(&self, student_id: Uuid) -> Result<StudentProfile> {
        let row = sqlx::query(
            "SELECT student_id, total_xp, level, streak_days, last_streak_date, \
             lessons_completed, courses_completed \
             FROM speaklexi.student_profiles WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(GamificationError::ProfileNotFound(student_id))?;

        Ok(StudentProfile {
            student_id: row.get("student_id"),
            total_xp: row.get("total_xp"),
            level: row.get("level"),
            streak_days: row.get("streak_days"),
            last_streak_date: row.get("last_streak_date"),
            lessons_completed: row.get("lessons_completed"),
            courses_completed: row.get("courses_completed"),
        })
    }

    /// Add `amount` XP and recompute the level inside one transaction.
    /// Touches only the experience columns.
    pub async fn apply_award(
        &self,
        student_id: Uuid,
        amount: i64,
        levels: &LevelTable,
        reason: &str,
    ) -> Result<AwardResult> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT total_xp, level FROM speaklexi.student_profiles \
             WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GamificationError::ProfileNotFound(student_id))?;

        let previous_total: i64 = row.get("total_xp");
        let previous_level: i32 = row.get("level");
        let new_total = previous_total + amount;
        // An award never demotes, even if the stored level is ahead of the
        // current ladder.
        let new_level = levels.level_for_xp(new_total).max(previous_level);

        sqlx::query(
            "UPDATE speaklexi.student_profiles SET total_xp = $1, level = $2 \
             WHERE student_id = $3",
        )
        .bind(new_total)
        .bind(new_level)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AwardResult {
            student_id,
            previous_total,
            new_total,
            amount_awarded: amount,
            previous_level,
            new_level,
            leveled_up: new_level > previous_level,
            reason: reason.to_string(),
        })
    }

    /// Run one activity date through the streak transition table and persist
    /// the streak columns when anything changed.
    pub async fn apply_activity(
        &self,
        student_id: Uuid,
        activity_date: NaiveDate,
    ) -> Result<StreakUpdate> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT streak_days, last_streak_date FROM speaklexi.student_profiles \
             WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GamificationError::ProfileNotFound(student_id))?;

        let state = StreakState {
            streak_days: row.get("streak_days"),
            last_streak_date: row.get("last_streak_date"),
        };
        let update = streak::apply_activity(state, activity_date);

        if update.updated {
            sqlx::query(
                "UPDATE speaklexi.student_profiles \
                 SET streak_days = $1, last_streak_date = $2 \
                 WHERE student_id = $3",
            )
            .bind(update.new_streak)
            .bind(activity_date)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(update)
    }

    /// Record a lesson completion. Returns true only the first time this
    /// student finishes this lesson; repeats leave every counter untouched.
    pub async fn record_completion(
        &self,
        student_id: Uuid,
        lesson_id: &str,
        completed_at: NaiveDate,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "SELECT student_id FROM speaklexi.student_profiles \
             WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GamificationError::ProfileNotFound(student_id))?;

        let inserted = sqlx::query(
            "INSERT INTO speaklexi.lesson_completions \
             (id, student_id, lesson_id, completed_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (student_id, lesson_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(lesson_id)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query(
                "UPDATE speaklexi.student_profiles \
                 SET lessons_completed = lessons_completed + 1 \
                 WHERE student_id = $1",
            )
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Course counterpart of `record_completion`: first finish of a course
    /// bumps `courses_completed`, repeats change nothing.
    pub async fn record_course_completion(
        &self,
        student_id: Uuid,
        course_id: &str,
        completed_at: NaiveDate,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "SELECT student_id FROM speaklexi.student_profiles \
             WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GamificationError::ProfileNotFound(student_id))?;

        let inserted = sqlx::query(
            "INSERT INTO speaklexi.course_completions \
             (id, student_id, course_id, completed_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (student_id, course_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query(
                "UPDATE speaklexi.student_profiles \
                 SET courses_completed = courses_completed + 1 \
                 WHERE student_id = $1",
            )
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// One page of the scoped board. Position is the rank within the full
    /// scoped population, so page n starts at offset + 1.
    pub async fn fetch_ranking(
        &self,
        scope: RankScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RankingEntry>> {
        scope.validate()?;
        ranking::validate_page(limit, offset)?;

        let rows = match scope {
            RankScope::Global => {
                sqlx::query(
                    "SELECT p.student_id, s.full_name, p.total_xp AS key_value, p.level \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active \
                     ORDER BY p.total_xp DESC, p.student_id ASC \
                     LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            RankScope::Windowed { start, end } => {
                sqlx::query(
                    "SELECT p.student_id, s.full_name, COUNT(c.id) AS key_value, p.level \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     LEFT JOIN speaklexi.lesson_completions c \
                       ON c.student_id = p.student_id \
                       AND c.completed_at BETWEEN $1 AND $2 \
                     WHERE s.account_active \
                     GROUP BY p.student_id, s.full_name, p.total_xp, p.level \
                     ORDER BY COUNT(c.id) DESC, p.total_xp DESC, p.student_id ASC \
                     LIMIT $3 OFFSET $4",
                )
                .bind(start)
                .bind(end)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            RankScope::Bracket { level } => {
                sqlx::query(
                    "SELECT p.student_id, s.full_name, p.total_xp AS key_value, p.level \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active AND p.level = $1 \
                     ORDER BY p.total_xp DESC, p.student_id ASC \
                     LIMIT $2 OFFSET $3",
                )
                .bind(level)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            entries.push(RankingEntry {
                position: offset + index as i64 + 1,
                student_id: row.get("student_id"),
                display_name: row.get("full_name"),
                key_value: row.get("key_value"),
                level: row.get("level"),
            });
        }
        Ok(entries)
    }

    /// Standing of one student inside a scope: 1 + count of strictly
    /// greater keys, so tied students share a position.
    pub async fn fetch_position(&self, student_id: Uuid, scope: RankScope) -> Result<PositionInfo> {
        scope.validate()?;

        let (ahead, total) = match scope {
            RankScope::Global => {
                let total_xp = self.scoped_total_xp(student_id, None).await?;
                let ahead: i64 = sqlx::query(
                    "SELECT COUNT(*) AS ahead \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active AND p.total_xp > $1",
                )
                .bind(total_xp)
                .fetch_one(&self.pool)
                .await?
                .get("ahead");
                let total: i64 = sqlx::query(
                    "SELECT COUNT(*) AS total \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active",
                )
                .fetch_one(&self.pool)
                .await?
                .get("total");
                (ahead, total)
            }
            RankScope::Bracket { level } => {
                let total_xp = self.scoped_total_xp(student_id, Some(level)).await?;
                let ahead: i64 = sqlx::query(
                    "SELECT COUNT(*) AS ahead \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active AND p.level = $1 AND p.total_xp > $2",
                )
                .bind(level)
                .bind(total_xp)
                .fetch_one(&self.pool)
                .await?
                .get("ahead");
                let total: i64 = sqlx::query(
                    "SELECT COUNT(*) AS total \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active AND p.level = $1",
                )
                .bind(level)
                .fetch_one(&self.pool)
                .await?
                .get("total");
                (ahead, total)
            }
            RankScope::Windowed { start, end } => {
                let mine = sqlx::query(
                    "SELECT p.total_xp, COUNT(c.id) AS completions \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     LEFT JOIN speaklexi.lesson_completions c \
                       ON c.student_id = p.student_id \
                       AND c.completed_at BETWEEN $1 AND $2 \
                     WHERE s.account_active AND p.student_id = $3 \
                     GROUP BY p.total_xp",
                )
                .bind(start)
                .bind(end)
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(GamificationError::ProfileNotFound(student_id))?;
                let my_completions: i64 = mine.get("completions");
                let my_xp: i64 = mine.get("total_xp");

                let ahead: i64 = sqlx::query(
                    "WITH window_counts AS ( \
                         SELECT p.student_id, p.total_xp, COUNT(c.id) AS completions \
                         FROM speaklexi.student_profiles p \
                         JOIN speaklexi.students s ON s.id = p.student_id \
                         LEFT JOIN speaklexi.lesson_completions c \
                           ON c.student_id = p.student_id \
                           AND c.completed_at BETWEEN $1 AND $2 \
                         WHERE s.account_active \
                         GROUP BY p.student_id, p.total_xp \
                     ) \
                     SELECT COUNT(*) AS ahead FROM window_counts \
                     WHERE completions > $3 \
                        OR (completions = $3 AND total_xp > $4)",
                )
                .bind(start)
                .bind(end)
                .bind(my_completions)
                .bind(my_xp)
                .fetch_one(&self.pool)
                .await?
                .get("ahead");
                let total: i64 = sqlx::query(
                    "SELECT COUNT(*) AS total \
                     FROM speaklexi.student_profiles p \
                     JOIN speaklexi.students s ON s.id = p.student_id \
                     WHERE s.account_active",
                )
                .fetch_one(&self.pool)
                .await?
                .get("total");
                (ahead, total)
            }
        };

        let position = ahead + 1;
        Ok(PositionInfo {
            position,
            total_population: total,
            percentile: ranking::percentile(position, total),
        })
    }

    /// XP of one student restricted to the scope's population; missing row
    /// means the student has no profile or sits outside the scope.
    async fn scoped_total_xp(&self, student_id: Uuid, level: Option<i32>) -> Result<i64> {
        let mut query = String::from(
            "SELECT p.total_xp \
             FROM speaklexi.student_profiles p \
             JOIN speaklexi.students s ON s.id = p.student_id \
             WHERE s.account_active AND p.student_id = $1",
        );
        if level.is_some() {
            query.push_str(" AND p.level = $2");
        }

        let mut q = sqlx::query(&query).bind(student_id);
        if let Some(level) = level {
            q = q.bind(level);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GamificationError::ProfileNotFound(student_id))?;
        Ok(row.get("total_xp"))
    }

    /// Upsert the account record and make sure a profile row exists; used by
    /// seeding and the CSV importer.
    pub async fn ensure_student(&self, full_name: &str, email: &str) -> Result<Uuid> {
        let student_id: Uuid = sqlx::query(
            "INSERT INTO speaklexi.students (id, full_name, email) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(full_name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?
        .get("id");

        sqlx::query(
            "INSERT INTO speaklexi.student_profiles (student_id) \
             VALUES ($1) \
             ON CONFLICT (student_id) DO NOTHING",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        Ok(student_id)
    }
}
