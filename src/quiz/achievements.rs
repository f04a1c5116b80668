use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Learning,
    Streak,
    Mastery,
    Growth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Condition {
    SessionsCompleted(i64),
    Streak(i64),
    TotalCorrect(i64),
    PerfectSession,
    Level(i64),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub condition: Condition,
    pub xp_reward: i64,
    pub coin_reward: i64,
}

pub static CATALOG: &[Achievement] = &[
    Achievement {
        id: "first_step",
        name: "첫 걸음",
        description: "첫 번째 오늘의 학습을 마쳤어요",
        category: Category::Learning,
        condition: Condition::SessionsCompleted(1),
        xp_reward: 10,
        coin_reward: 5,
    },
    Achievement {
        id: "ten_sessions",
        name: "꾸준한 학생",
        description: "오늘의 학습을 10번 마쳤어요",
        category: Category::Learning,
        condition: Condition::SessionsCompleted(10),
        xp_reward: 30,
        coin_reward: 20,
    },
    Achievement {
        id: "streak_3",
        name: "3일 연속",
        description: "3일 연속으로 학습했어요",
        category: Category::Streak,
        condition: Condition::Streak(3),
        xp_reward: 15,
        coin_reward: 10,
    },
    Achievement {
        id: "streak_7",
        name: "일주일 개근",
        description: "7일 연속으로 학습했어요",
        category: Category::Streak,
        condition: Condition::Streak(7),
        xp_reward: 40,
        coin_reward: 30,
    },
    Achievement {
        id: "streak_30",
        name: "한 달 개근",
        description: "30일 연속으로 학습했어요",
        category: Category::Streak,
        condition: Condition::Streak(30),
        xp_reward: 150,
        coin_reward: 100,
    },
    Achievement {
        id: "correct_100",
        name: "정답 백 개",
        description: "문제를 100개 맞혔어요",
        category: Category::Mastery,
        condition: Condition::TotalCorrect(100),
        xp_reward: 50,
        coin_reward: 30,
    },
    Achievement {
        id: "perfect_day",
        name: "완벽한 하루",
        description: "모든 문제를 한 번에 맞혔어요",
        category: Category::Mastery,
        condition: Condition::PerfectSession,
        xp_reward: 20,
        coin_reward: 15,
    },
    Achievement {
        id: "level_5",
        name: "국어 탐험가",
        description: "레벨 5에 도달했어요",
        category: Category::Growth,
        condition: Condition::Level(5),
        xp_reward: 0,
        coin_reward: 50,
    },
];

static CATALOG_BY_ID: Lazy<HashMap<&'static str, &'static Achievement>> =
    Lazy::new(|| CATALOG.iter().map(|a| (a.id, a)).collect());

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG_BY_ID.get(id).copied()
}

/// Figures checked against the catalog after a session is completed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot {
    pub sessions_completed: i64,
    pub streak: i64,
    pub total_correct: i64,
    pub level: i64,
    pub last_session_perfect: bool,
}

impl Condition {
    pub fn is_met(&self, progress: &ProgressSnapshot) -> bool {
        match *self {
            Condition::SessionsCompleted(n) => progress.sessions_completed >= n,
            Condition::Streak(n) => progress.streak >= n,
            Condition::TotalCorrect(n) => progress.total_correct >= n,
            Condition::PerfectSession => progress.last_session_perfect,
            Condition::Level(n) => progress.level >= n,
        }
    }
}

/// Catalog entries whose condition is now met and that are not yet unlocked.
pub fn newly_unlocked(
    progress: &ProgressSnapshot,
    unlocked: &HashSet<String>,
) -> Vec<&'static Achievement> {
    CATALOG
        .iter()
        .filter(|a| !unlocked.contains(a.id))
        .filter(|a| a.condition.is_met(progress))
        .collect()
}
