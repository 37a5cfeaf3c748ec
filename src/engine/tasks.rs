//! Daily task queue generator
//!
//! Queue order:
//! 1. Due reviews (next_review <= today), most overdue first, up to the review cap
//! 2. New words (never studied), active wordlist first, up to the new-word cap
//! 3. Relapse words are added dynamically during the session
//!
//! The dashboard projection (`get_today_stats`) goes through the same
//! `plan_day` partition so the counts it shows always match the queue.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

use super::models::{StudyItem, StudyMode, MAX_LEVEL};
use super::scheduler::{is_due, is_new};

/// Roughly 30 seconds per card
const SECONDS_PER_WORD: usize = 30;

/// Caps and new-word source used to build a day's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub daily_new_cap: usize,
    pub daily_review_cap: usize,
    pub active_wordlist: Option<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            daily_new_cap: 10,
            daily_review_cap: 50,
            active_wordlist: None,
        }
    }
}

/// Today's study queue
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyTasks {
    pub queue: Vec<StudyItem>,
    pub review_count: usize,
    pub new_count: usize,
    pub total_count: usize,
    /// Capped reviews available regardless of mode
    pub available_reviews: usize,
    /// Capped new words available regardless of mode
    pub available_new: usize,
    pub fallback_used: bool,
    pub active_list_exhausted: bool,
    pub estimated_minutes: usize,
}

/// Dashboard counts, no queue construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodayStats {
    pub review_count: usize,
    pub new_count: usize,
    pub total_words: usize,
    pub total_learned: usize,
    pub mastered_count: usize,
    pub level_distribution: [usize; 4],
    pub estimated_minutes: usize,
    pub fallback_used: bool,
    pub active_list_exhausted: bool,
}

/// Shared partition behind both the queue and the dashboard
struct DayPlan<'a> {
    /// One entry per word identity, in catalog order
    unique: Vec<&'a StudyItem>,
    reviews: Vec<&'a StudyItem>,
    new_words: Vec<&'a StudyItem>,
    fallback_used: bool,
    active_list_exhausted: bool,
}

/// Collapse repeated word identities to a single catalog row.
///
/// The first occurrence wins, except that an occurrence in the active
/// wordlist always beats one from any other list.
fn unique_items<'a>(items: &'a [StudyItem], active: Option<&str>) -> Vec<&'a StudyItem> {
    let in_active = |item: &StudyItem| active.map_or(false, |a| item.word.wordlist_id == a);

    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        match owner.entry(item.word.text.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(mut slot) => {
                if in_active(item) && !in_active(&items[*slot.get()]) {
                    slot.insert(idx);
                }
            }
        }
    }

    items
        .iter()
        .enumerate()
        .filter(|(idx, item)| owner.get(item.word.text.as_str()) == Some(idx))
        .map(|(_, item)| item)
        .collect()
}

fn plan_day<'a>(items: &'a [StudyItem], config: &TaskConfig, today: NaiveDate) -> DayPlan<'a> {
    let unique = unique_items(items, config.active_wordlist.as_deref());
    let mut due: Vec<&StudyItem> = Vec::new();
    let mut fresh: Vec<&StudyItem> = Vec::new();

    for &item in &unique {
        let state = item.state.as_ref();
        if is_due(state, today) {
            due.push(item);
        } else if is_new(state) {
            fresh.push(item);
        }
    }

    // Stable sort keeps catalog order for equal dates
    due.sort_by_key(|item| item.state.as_ref().and_then(|s| s.next_review_at).unwrap_or(NaiveDate::MAX));
    due.truncate(config.daily_review_cap);

    let cap = config.daily_new_cap;
    let (new_words, fallback_used, active_list_exhausted) = match config.active_wordlist.as_deref() {
        Some(active) => {
            let (primary, others): (Vec<&StudyItem>, Vec<&StudyItem>) =
                fresh.into_iter().partition(|item| item.word.wordlist_id == active);

            let mut selected: Vec<&StudyItem> = primary.into_iter().take(cap).collect();
            let from_active = selected.len();
            let remainder = cap - from_active;
            selected.extend(others.into_iter().take(remainder));
            let fallback_used = selected.len() > from_active;

            if fallback_used {
                debug!(
                    "Active wordlist '{}' supplied {} new words, {} filled from other lists",
                    active,
                    from_active,
                    selected.len() - from_active
                );
            }

            (selected, fallback_used, from_active == 0)
        }
        None => (fresh.into_iter().take(cap).collect(), false, false),
    };

    DayPlan {
        unique,
        reviews: due,
        new_words,
        fallback_used,
        active_list_exhausted,
    }
}

fn estimate_minutes(count: usize) -> usize {
    (count * SECONDS_PER_WORD).div_ceil(60)
}

/// Generate today's task queue
pub fn generate_daily_tasks(
    items: &[StudyItem],
    config: &TaskConfig,
    mode: StudyMode,
    today: NaiveDate,
) -> DailyTasks {
    let plan = plan_day(items, config, today);

    let reviews: &[&StudyItem] = if mode == StudyMode::New { &[] } else { &plan.reviews };
    let new_words: &[&StudyItem] = if mode == StudyMode::Review { &[] } else { &plan.new_words };

    // Reviews always precede new words
    let queue: Vec<StudyItem> = reviews
        .iter()
        .chain(new_words.iter())
        .map(|item| (*item).clone())
        .collect();

    let total_count = queue.len();
    debug!(
        "Generated {} queue: {} reviews, {} new",
        mode,
        reviews.len(),
        new_words.len()
    );

    DailyTasks {
        review_count: reviews.len(),
        new_count: new_words.len(),
        total_count,
        available_reviews: plan.reviews.len(),
        available_new: plan.new_words.len(),
        fallback_used: plan.fallback_used,
        active_list_exhausted: plan.active_list_exhausted,
        estimated_minutes: estimate_minutes(total_count),
        queue,
    }
}

/// Counts for the dashboard, using the same due/new/cap logic as the queue
pub fn get_today_stats(items: &[StudyItem], config: &TaskConfig, today: NaiveDate) -> TodayStats {
    let plan = plan_day(items, config, today);

    let mut level_distribution = [0usize; 4];
    let mut total_learned = 0;
    let mut mastered_count = 0;

    // Only words actually studied count as learned
    let studied = plan
        .unique
        .iter()
        .filter_map(|item| item.state.as_ref())
        .filter(|state| state.last_seen_at.is_some());
    for state in studied {
        total_learned += 1;
        let level = state.level.min(MAX_LEVEL);
        level_distribution[level as usize] += 1;
        if level == MAX_LEVEL {
            mastered_count += 1;
        }
    }

    TodayStats {
        review_count: plan.reviews.len(),
        new_count: plan.new_words.len(),
        total_words: plan.unique.len(),
        total_learned,
        mastered_count,
        level_distribution,
        estimated_minutes: estimate_minutes(plan.reviews.len() + plan.new_words.len()),
        fallback_used: plan.fallback_used,
        active_list_exhausted: plan.active_list_exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{Word, WordState};
    use chrono::{Days, TimeZone, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn item(id: i64, list: &str, text: &str, state: Option<WordState>) -> StudyItem {
        StudyItem {
            word: Word {
                id,
                wordlist_id: list.to_string(),
                text: text.to_string(),
                meaning: format!("meaning of {}", text),
                phonetic: None,
            },
            state,
        }
    }

    fn reviewed(text: &str, level: u8, next_review_at: NaiveDate) -> Option<WordState> {
        Some(WordState {
            level,
            last_seen_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
            next_review_at: Some(next_review_at),
            ..WordState::unseen(text)
        })
    }

    fn days_ago(n: u64) -> NaiveDate {
        today().checked_sub_days(Days::new(n)).unwrap()
    }

    fn texts(tasks: &DailyTasks) -> Vec<&str> {
        tasks.queue.iter().map(|i| i.word.text.as_str()).collect()
    }

    #[test]
    fn test_reviews_sorted_most_overdue_first_and_capped() {
        let items = vec![
            item(1, "a", "one", reviewed("one", 1, days_ago(1))),
            item(2, "a", "two", reviewed("two", 1, days_ago(5))),
            item(3, "a", "three", reviewed("three", 1, days_ago(3))),
            item(4, "a", "four", reviewed("four", 1, days_ago(3))),
            item(5, "a", "later", reviewed("later", 1, today().checked_add_days(Days::new(2)).unwrap())),
        ];
        let config = TaskConfig { daily_review_cap: 3, ..TaskConfig::default() };

        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());
        // Equal dates keep catalog order
        assert_eq!(texts(&tasks), vec!["two", "three", "four"]);
        assert_eq!(tasks.review_count, 3);
        assert_eq!(tasks.new_count, 0);
    }

    #[test]
    fn test_reviews_precede_new_words() {
        let items = vec![
            item(1, "a", "fresh", None),
            item(2, "a", "due", reviewed("due", 2, today())),
        ];
        let tasks = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::All, today());
        assert_eq!(texts(&tasks), vec!["due", "fresh"]);
        assert_eq!(tasks.total_count, 2);
        assert_eq!(tasks.estimated_minutes, 1);
    }

    #[test]
    fn test_new_word_fallback_fills_from_other_lists() {
        let mut items = Vec::new();
        let mut id = 0;
        for n in 0..10 {
            id += 1;
            items.push(item(id, "other1", &format!("o1-{}", n), None));
        }
        for n in 0..3 {
            id += 1;
            items.push(item(id, "active", &format!("act-{}", n), None));
        }
        for n in 0..10 {
            id += 1;
            items.push(item(id, "other2", &format!("o2-{}", n), None));
        }

        let config = TaskConfig {
            daily_new_cap: 10,
            daily_review_cap: 50,
            active_wordlist: Some("active".into()),
        };
        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());

        assert_eq!(tasks.new_count, 10);
        assert!(tasks.fallback_used);
        assert!(!tasks.active_list_exhausted);
        let words = texts(&tasks);
        assert_eq!(&words[..3], &["act-0", "act-1", "act-2"]);
        assert_eq!(&words[3..], &["o1-0", "o1-1", "o1-2", "o1-3", "o1-4", "o1-5", "o1-6"]);
    }

    #[test]
    fn test_active_list_covers_cap_without_fallback() {
        let items: Vec<StudyItem> = (0..5)
            .map(|n| item(n, "active", &format!("w{}", n), None))
            .chain(std::iter::once(item(9, "other", "x", None)))
            .collect();
        let config = TaskConfig {
            daily_new_cap: 3,
            active_wordlist: Some("active".into()),
            ..TaskConfig::default()
        };
        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());
        assert_eq!(texts(&tasks), vec!["w0", "w1", "w2"]);
        assert!(!tasks.fallback_used);
    }

    #[test]
    fn test_active_list_exhausted() {
        let items = vec![
            item(1, "active", "done", reviewed("done", 3, today().checked_add_days(Days::new(4)).unwrap())),
            item(2, "other", "spare", None),
        ];
        let config = TaskConfig {
            active_wordlist: Some("active".into()),
            ..TaskConfig::default()
        };
        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());
        assert!(tasks.active_list_exhausted);
        assert!(tasks.fallback_used);
        assert_eq!(texts(&tasks), vec!["spare"]);
    }

    #[test]
    fn test_no_active_list_never_flags_fallback() {
        let items = vec![item(1, "a", "x", None), item(2, "b", "y", None)];
        let tasks = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::All, today());
        assert!(!tasks.fallback_used);
        assert!(!tasks.active_list_exhausted);
        assert_eq!(texts(&tasks), vec!["x", "y"]);
    }

    #[test]
    fn test_mode_empties_inactive_half() {
        let items = vec![
            item(1, "a", "fresh", None),
            item(2, "a", "due", reviewed("due", 1, today())),
        ];

        let review_only = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::Review, today());
        assert_eq!(texts(&review_only), vec!["due"]);
        assert_eq!(review_only.available_new, 1);

        let new_only = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::New, today());
        assert_eq!(texts(&new_only), vec!["fresh"]);
        assert_eq!(new_only.available_reviews, 1);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let items = vec![
            item(1, "a", "p", reviewed("p", 1, days_ago(2))),
            item(2, "a", "q", reviewed("q", 2, days_ago(2))),
            item(3, "b", "r", None),
        ];
        let first = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::All, today());
        let second = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::All, today());
        assert_eq!(first.queue, second.queue);
    }

    #[test]
    fn test_duplicate_identity_uses_first_occurrence() {
        let items = vec![item(1, "a", "same", None), item(2, "b", "same", None)];
        let tasks = generate_daily_tasks(&items, &TaskConfig::default(), StudyMode::All, today());
        assert_eq!(tasks.new_count, 1);
        assert_eq!(tasks.queue[0].word.wordlist_id, "a");
    }

    #[test]
    fn test_shared_word_keeps_active_list_priority() {
        let items = vec![
            item(1, "other", "apple", None),
            item(2, "other", "zebra", None),
            item(3, "active", "apple", None),
        ];
        let config = TaskConfig {
            daily_new_cap: 1,
            active_wordlist: Some("active".into()),
            ..TaskConfig::default()
        };

        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());
        assert_eq!(texts(&tasks), vec!["apple"]);
        assert_eq!(tasks.queue[0].word.wordlist_id, "active");
        assert!(!tasks.fallback_used);
        assert!(!tasks.active_list_exhausted);

        let stats = get_today_stats(&items, &config, today());
        assert!(!stats.active_list_exhausted);
        assert_eq!(stats.total_words, 2);
    }

    #[test]
    fn test_today_stats_count_each_studied_word_once() {
        let mut untouched = WordState::unseen("quill");
        untouched.next_review_at = Some(today().checked_add_days(Days::new(3)).unwrap());
        let items = vec![
            item(1, "a", "harbor", reviewed("harbor", 2, days_ago(1))),
            item(2, "b", "harbor", reviewed("harbor", 2, days_ago(1))),
            item(3, "a", "quill", Some(untouched)),
            item(4, "b", "nest", None),
        ];

        let stats = get_today_stats(&items, &TaskConfig::default(), today());
        assert_eq!(stats.total_words, 3);
        assert_eq!(stats.total_learned, 1);
        assert_eq!(stats.level_distribution, [0, 0, 1, 0]);
        assert_eq!(stats.review_count, 1);
    }

    #[test]
    fn test_today_stats_match_queue() {
        let items = vec![
            item(1, "a", "m", reviewed("m", 3, days_ago(1))),
            item(2, "a", "n", reviewed("n", 1, today().checked_add_days(Days::new(1)).unwrap())),
            item(3, "a", "o", None),
            item(4, "a", "p", None),
        ];
        let config = TaskConfig { daily_new_cap: 1, ..TaskConfig::default() };

        let stats = get_today_stats(&items, &config, today());
        let tasks = generate_daily_tasks(&items, &config, StudyMode::All, today());

        assert_eq!(stats.review_count, tasks.review_count);
        assert_eq!(stats.new_count, tasks.new_count);
        assert_eq!(stats.total_words, 4);
        assert_eq!(stats.total_learned, 2);
        assert_eq!(stats.mastered_count, 1);
        assert_eq!(stats.level_distribution, [0, 1, 0, 1]);
        assert_eq!(stats.estimated_minutes, 1);
    }
}
