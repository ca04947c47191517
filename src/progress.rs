use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::catalog::{category_letter, next_letter, Catalog, Task};
use crate::storage::{keys, load_or_default, save_json, SharedStore};

pub type CompletionMap = BTreeMap<String, bool>;

/// Receives the unlock event produced when a category becomes fully complete.
pub trait UnlockListener {
    fn category_unlocked(&mut self, completed: char, unlocked: char);
}

/// The two ways callers ask for a completion rate. Both must agree for the
/// same category.
#[derive(Debug, Clone, Copy)]
pub enum RateQuery<'a> {
    /// An explicit task list (detail views).
    Tasks(&'a [Task]),
    /// A cached task count plus the category letter (grid/summary views).
    Count { total: usize, letter: char },
}

pub struct ProgressTracker {
    store: SharedStore,
    catalog: Rc<Catalog>,
    completed_tasks: CompletionMap,
    completed_categories: Vec<char>,
}

impl ProgressTracker {
    pub fn load(store: SharedStore, catalog: Rc<Catalog>) -> Self {
        let completed_tasks = load_or_default(&*store, keys::COMPLETED_TASKS, CompletionMap::new());
        let completed_categories = load_or_default(&*store, keys::COMPLETED_CATEGORIES, Vec::new());
        Self {
            store,
            catalog,
            completed_tasks,
            completed_categories,
        }
    }

    /// Flips the flag for `task_id` and runs the unlock check for its
    /// category. Ids outside the catalog are recorded but never unlock
    /// anything. Returns the new flag.
    pub fn toggle_task(&mut self, task_id: &str, listener: &mut dyn UnlockListener) -> bool {
        let flag = self
            .completed_tasks
            .entry(task_id.to_string())
            .or_insert(false);
        *flag = !*flag;
        let done = *flag;
        debug!(task_id, done, "toggled task");
        save_json(&*self.store, keys::COMPLETED_TASKS, &self.completed_tasks);

        let catalog = Rc::clone(&self.catalog);
        if let Some(category) = catalog.category_of(task_id) {
            let all_done = category.tasks.iter().all(|t| self.is_task_completed(&t.id));
            self.evaluate_unlock(category.letter, all_done, listener);
        }

        done
    }

    fn evaluate_unlock(&mut self, letter: char, complete: bool, listener: &mut dyn UnlockListener) {
        if !complete || self.completed_categories.contains(&letter) {
            return;
        }

        // The last category has no successor, so it is never recorded.
        let Some(next) = next_letter(letter).filter(|n| self.catalog.contains(*n)) else {
            debug!(category = %letter, "completed category has no successor");
            return;
        };

        self.completed_categories.push(letter);
        save_json(
            &*self.store,
            keys::COMPLETED_CATEGORIES,
            &self.completed_categories,
        );
        info!(completed = %letter, unlocked = %next, "category unlocked");
        listener.category_unlocked(letter, next);
    }

    pub fn is_task_completed(&self, task_id: &str) -> bool {
        self.completed_tasks.get(task_id).copied().unwrap_or(false)
    }

    /// Percentage complete in `0..=100`; an empty selection is 0.
    pub fn completion_rate(&self, query: RateQuery<'_>) -> f64 {
        match query {
            RateQuery::Tasks(tasks) => {
                let completed = tasks.iter().filter(|t| self.is_task_completed(&t.id)).count();
                percentage(completed, tasks.len())
            }
            RateQuery::Count { total, letter } => {
                percentage(self.completed_in_category(letter), total)
            }
        }
    }

    pub fn has_completed_tasks_in_category(&self, letter: char) -> bool {
        self.completed_in_category(letter) > 0
    }

    pub fn completed_in_category(&self, letter: char) -> usize {
        let letter = letter.to_ascii_uppercase();
        self.completed_tasks
            .iter()
            .filter(|(id, done)| **done && category_letter(id) == Some(letter))
            .count()
    }

    pub fn completed_tasks(&self) -> &CompletionMap {
        &self.completed_tasks
    }

    pub fn completed_categories(&self) -> &[char] {
        &self.completed_categories
    }

    /// Forgets all progress, in memory and in storage.
    pub fn reset(&mut self) {
        self.completed_tasks.clear();
        self.completed_categories.clear();
        for key in [keys::COMPLETED_TASKS, keys::COMPLETED_CATEGORIES] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "failed to clear stored progress");
            }
        }
        info!("progress reset");
    }
}

fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (completed as f64 / total as f64 * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Difficulty};
    use crate::storage::{KeyValueStore, SqliteStore};

    #[derive(Default)]
    struct Recorder {
        unlocks: Vec<(char, char)>,
    }

    impl UnlockListener for Recorder {
        fn category_unlocked(&mut self, completed: char, unlocked: char) {
            self.unlocks.push((completed, unlocked));
        }
    }

    fn setup() -> (ProgressTracker, Rc<SqliteStore>) {
        let store = Rc::new(SqliteStore::in_memory().expect("in-memory store"));
        let tracker = ProgressTracker::load(store.clone(), Rc::new(Catalog::builtin()));
        (tracker, store)
    }

    fn complete(tracker: &mut ProgressTracker, ids: &[&str], rec: &mut Recorder) {
        for id in ids {
            assert!(tracker.toggle_task(id, &mut *rec), "{} should now be complete", id);
        }
    }

    mod toggle_tests {
        use super::*;

        #[test]
        fn absent_task_toggles_on() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            assert!(!tracker.is_task_completed("a1"));
            assert!(tracker.toggle_task("a1", &mut rec));
            assert!(tracker.is_task_completed("a1"));
        }

        #[test]
        fn toggle_twice_is_involution() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            tracker.toggle_task("b2", &mut rec);
            tracker.toggle_task("b2", &mut rec);

            assert_eq!(tracker.completed_tasks().get("b2"), Some(&false));
            assert!(!tracker.is_task_completed("b2"));
        }

        #[test]
        fn unknown_task_is_recorded_without_unlock() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            assert!(tracker.toggle_task("9lives", &mut rec));
            assert!(tracker.is_task_completed("9lives"));
            assert!(rec.unlocks.is_empty());
        }

        #[test]
        fn toggle_persists_completion_map() {
            let (mut tracker, store) = setup();
            let mut rec = Recorder::default();
            tracker.toggle_task("a1", &mut rec);

            assert_eq!(
                store.get(keys::COMPLETED_TASKS).unwrap(),
                Some("{\"a1\":true}".to_string())
            );
        }

        #[test]
        fn state_survives_reload() {
            let (mut tracker, store) = setup();
            let mut rec = Recorder::default();
            complete(&mut tracker, &["a1", "a2", "a3", "a4"], &mut rec);

            let reloaded = ProgressTracker::load(store, Rc::new(Catalog::builtin()));
            assert!(reloaded.is_task_completed("a4"));
            assert_eq!(reloaded.completed_categories(), &['A']);
        }

        #[test]
        fn corrupt_storage_loads_defaults() {
            let store = Rc::new(SqliteStore::in_memory().unwrap());
            store.set(keys::COMPLETED_TASKS, "[1,2").unwrap();
            store.set(keys::COMPLETED_CATEGORIES, "42").unwrap();

            let tracker = ProgressTracker::load(store, Rc::new(Catalog::builtin()));
            assert!(tracker.completed_tasks().is_empty());
            assert!(tracker.completed_categories().is_empty());
        }

        #[test]
        fn write_failure_keeps_in_memory_state() {
            let store = Rc::new(crate::storage::testing::FlakyStore::new());
            let mut tracker = ProgressTracker::load(store.clone(), Rc::new(Catalog::builtin()));
            let mut rec = Recorder::default();

            assert!(tracker.toggle_task("a1", &mut rec));
            assert!(tracker.is_task_completed("a1"));
            assert_eq!(store.get(keys::COMPLETED_TASKS).unwrap(), None);
        }

        #[test]
        fn unreadable_storage_loads_defaults() {
            let store = Rc::new(crate::storage::testing::FlakyStore::new());
            store.broken.set(false);
            store.set(keys::COMPLETED_TASKS, "{\"a1\":true}").unwrap();
            store.unreadable.set(true);

            let tracker = ProgressTracker::load(store, Rc::new(Catalog::builtin()));
            assert!(!tracker.is_task_completed("a1"));
            assert!(tracker.completed_categories().is_empty());
        }
    }

    mod rate_tests {
        use super::*;

        #[test]
        fn example_scenario_rates() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            complete(&mut tracker, &["a1", "a2", "a3"], &mut rec);
            assert_eq!(tracker.completion_rate(RateQuery::Count { total: 4, letter: 'A' }), 75.0);
            assert!(rec.unlocks.is_empty());

            complete(&mut tracker, &["a4"], &mut rec);
            assert_eq!(tracker.completion_rate(RateQuery::Count { total: 4, letter: 'A' }), 100.0);
        }

        #[test]
        fn both_conventions_agree_for_every_category() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            let catalog = Catalog::builtin();
            for id in ["a1", "a3", "b1", "c1", "c2", "c3", "p4", "z1"] {
                tracker.toggle_task(id, &mut rec);
            }

            for category in catalog.categories() {
                let by_list = tracker.completion_rate(RateQuery::Tasks(&category.tasks));
                let by_count = tracker.completion_rate(RateQuery::Count {
                    total: category.tasks.len(),
                    letter: category.letter,
                });
                assert_eq!(by_list, by_count, "category {}", category.letter);
            }
        }

        #[test]
        fn rate_bounds() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            let catalog = Catalog::builtin();
            let tasks = &catalog.get('C').unwrap().tasks;

            assert_eq!(tracker.completion_rate(RateQuery::Tasks(tasks)), 0.0);

            tracker.toggle_task("c1", &mut rec);
            let partial = tracker.completion_rate(RateQuery::Tasks(tasks));
            assert!(partial > 0.0 && partial < 100.0);

            complete(&mut tracker, &["c2", "c3"], &mut rec);
            assert_eq!(tracker.completion_rate(RateQuery::Tasks(tasks)), 100.0);
        }

        #[test]
        fn empty_selection_is_zero() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            tracker.toggle_task("a1", &mut rec);

            assert_eq!(tracker.completion_rate(RateQuery::Tasks(&[])), 0.0);
            assert_eq!(tracker.completion_rate(RateQuery::Count { total: 0, letter: 'A' }), 0.0);
        }

        #[test]
        fn count_query_is_case_insensitive() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            tracker.toggle_task("A1", &mut rec);
            tracker.toggle_task("b1", &mut rec);

            assert_eq!(tracker.completion_rate(RateQuery::Count { total: 4, letter: 'a' }), 25.0);
            let third = tracker.completion_rate(RateQuery::Count { total: 3, letter: 'B' });
            assert!((third - 100.0 / 3.0).abs() < 1e-9);
        }

        #[test]
        fn count_query_never_exceeds_hundred() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            complete(&mut tracker, &["f1", "f2", "f3"], &mut rec);

            assert_eq!(tracker.completion_rate(RateQuery::Count { total: 1, letter: 'F' }), 100.0);
        }

        #[test]
        fn has_completed_tasks_in_category() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            assert!(!tracker.has_completed_tasks_in_category('D'));

            tracker.toggle_task("d2", &mut rec);
            assert!(tracker.has_completed_tasks_in_category('d'));

            tracker.toggle_task("d2", &mut rec);
            assert!(!tracker.has_completed_tasks_in_category('D'));
        }
    }

    mod unlock_tests {
        use super::*;

        #[test]
        fn completing_category_unlocks_successor_once() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            complete(&mut tracker, &["a1", "a2", "a3", "a4"], &mut rec);
            assert_eq!(rec.unlocks, vec![('A', 'B')]);
            assert_eq!(tracker.completed_categories(), &['A']);

            tracker.toggle_task("a4", &mut rec);
            tracker.toggle_task("a4", &mut rec);
            assert_eq!(rec.unlocks.len(), 1);
            assert_eq!(tracker.completed_categories(), &['A']);
        }

        #[test]
        fn completion_order_does_not_matter() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            complete(&mut tracker, &["b3", "b1", "b2"], &mut rec);
            assert_eq!(rec.unlocks, vec![('B', 'C')]);
        }

        #[test]
        fn last_category_emits_nothing() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            complete(&mut tracker, &["z1"], &mut rec);
            assert!(rec.unlocks.is_empty());
            assert!(tracker.completed_categories().is_empty());
        }

        #[test]
        fn uncataloged_successor_emits_nothing() {
            let store = Rc::new(SqliteStore::in_memory().unwrap());
            let catalog = Catalog::from_categories(vec![
                Category {
                    letter: 'A',
                    title: "Only".into(),
                    tasks: vec![Task {
                        id: "a1".into(),
                        title: "Single".into(),
                        difficulty: Difficulty::Easy,
                    }],
                },
                Category {
                    letter: 'C',
                    title: "Gap".into(),
                    tasks: vec![],
                },
            ])
            .unwrap();
            let mut tracker = ProgressTracker::load(store, Rc::new(catalog));
            let mut rec = Recorder::default();

            tracker.toggle_task("a1", &mut rec);
            assert!(rec.unlocks.is_empty());
        }

        #[test]
        fn uppercase_ids_do_not_complete_category() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();

            complete(&mut tracker, &["A1", "A2", "A3", "A4"], &mut rec);
            assert!(rec.unlocks.is_empty());
        }

        #[test]
        fn completed_categories_persisted() {
            let (mut tracker, store) = setup();
            let mut rec = Recorder::default();
            complete(&mut tracker, &["d1", "d2", "d3"], &mut rec);

            assert_eq!(
                store.get(keys::COMPLETED_CATEGORIES).unwrap(),
                Some("[\"D\"]".to_string())
            );
        }
    }

    mod reset_tests {
        use super::*;

        #[test]
        fn reset_clears_memory_and_storage() {
            let (mut tracker, store) = setup();
            let mut rec = Recorder::default();
            complete(&mut tracker, &["a1", "a2", "a3", "a4"], &mut rec);

            tracker.reset();

            assert!(tracker.completed_tasks().is_empty());
            assert!(tracker.completed_categories().is_empty());
            assert_eq!(store.get(keys::COMPLETED_TASKS).unwrap(), None);
            assert_eq!(store.get(keys::COMPLETED_CATEGORIES).unwrap(), None);
        }

        #[test]
        fn category_unlocks_again_after_reset() {
            let (mut tracker, _) = setup();
            let mut rec = Recorder::default();
            complete(&mut tracker, &["a1", "a2", "a3", "a4"], &mut rec);
            tracker.reset();
            complete(&mut tracker, &["a1", "a2", "a3", "a4"], &mut rec);

            assert_eq!(rec.unlocks, vec![('A', 'B'), ('A', 'B')]);
        }
    }
}
