use crate::models::{Achievement, StudentProfile};

/// Achievements are derived from profile counters on every read rather
/// than persisted; there is no unlock table to keep in sync.
pub fn derive_achievements(profile: &StudentProfile) -> Vec<Achievement> {
    vec![
        Achievement {
            id: "first_lesson",
            name: "First Lesson",
            description: "Completed your first lesson",
            icon: "🎯",
            unlocked: profile.lessons_completed >= 1,
        },
        Achievement {
            id: "streak_7",
            name: "7-Day Streak",
            description: "Studied seven days in a row",
            icon: "🔥",
            unlocked: profile.streak_days >= 7,
        },
        Achievement {
            id: "first_course",
            name: "First Course",
            description: "Completed your first course",
            icon: "🏆",
            unlocked: profile.courses_completed >= 1,
        },
        Achievement {
            id: "level_5",
            name: "Level 5",
            description: "Reached level 5",
            icon: "⭐",
            unlocked: profile.level >= 5,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn profile(lessons: i32, courses: i32, streak: i32, level: i32) -> StudentProfile {
        StudentProfile {
            student_id: Uuid::new_v4(),
            total_xp: 0,
            level,
            streak_days: streak,
            last_streak_date: None,
            lessons_completed: lessons,
            courses_completed: courses,
        }
    }

    #[test]
    fn fresh_profile_has_everything_locked() {
        let unlocked = derive_achievements(&profile(0, 0, 0, 1))
            .iter()
            .filter(|a| a.unlocked)
            .count();
        assert_eq!(unlocked, 0);
    }

    #[test]
    fn counters_unlock_their_achievements() {
        let achievements = derive_achievements(&profile(3, 1, 7, 5));
        assert!(achievements.iter().all(|a| a.unlocked));
    }

    #[test]
    fn one_finished_course_unlocks_first_course() {
        let achievements = derive_achievements(&profile(0, 1, 0, 1));
        let course = achievements.iter().find(|a| a.id == "first_course").unwrap();
        assert!(course.unlocked);
    }

    #[test]
    fn streak_below_seven_stays_locked() {
        let achievements = derive_achievements(&profile(1, 0, 6, 2));
        let streak = achievements.iter().find(|a| a.id == "streak_7").unwrap();
        assert!(!streak.unlocked);
    }
}
