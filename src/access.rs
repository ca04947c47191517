use serde::Serialize;

use crate::catalog::{previous_letter, Catalog};
use crate::progress::{ProgressTracker, RateQuery};

pub const FIRST_CATEGORY: char = 'A';
pub const COMPLETION_THRESHOLD: f64 = 100.0;

/// A category is open when it is the first one or when its predecessor is
/// fully complete. Completion is always recomputed from the task map, never
/// read from the set of already-announced unlocks.
pub fn is_category_accessible(letter: char, catalog: &Catalog, progress: &ProgressTracker) -> bool {
    let letter = letter.to_ascii_uppercase();
    if letter == FIRST_CATEGORY {
        return true;
    }

    let Some(previous) = previous_letter(letter) else {
        return false;
    };
    let Some(previous_category) = catalog.get(previous) else {
        return false;
    };

    progress.completion_rate(RateQuery::Count {
        total: previous_category.tasks.len(),
        letter: previous,
    }) >= COMPLETION_THRESHOLD
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatus {
    pub letter: char,
    pub title: String,
    pub task_count: usize,
    pub completed: usize,
    pub completion_rate: f64,
    pub accessible: bool,
    pub bonus: bool,
    pub started: bool,
}

pub fn category_overview(catalog: &Catalog, progress: &ProgressTracker) -> Vec<CategoryStatus> {
    catalog
        .categories()
        .iter()
        .map(|category| CategoryStatus {
            letter: category.letter,
            title: category.title.clone(),
            task_count: category.tasks.len(),
            completed: category
                .tasks
                .iter()
                .filter(|t| progress.is_task_completed(&t.id))
                .count(),
            completion_rate: progress.completion_rate(RateQuery::Tasks(&category.tasks)),
            accessible: is_category_accessible(category.letter, catalog, progress),
            bonus: category.is_bonus(),
            started: progress.has_completed_tasks_in_category(category.letter),
        })
        .collect()
}

pub fn unlocked_letters(catalog: &Catalog, progress: &ProgressTracker) -> Vec<char> {
    catalog
        .categories()
        .iter()
        .map(|c| c.letter)
        .filter(|letter| is_category_accessible(*letter, catalog, progress))
        .collect()
}
