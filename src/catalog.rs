use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const BONUS_LETTERS: [char; 7] = ['F', 'I', 'L', 'O', 'T', 'W', 'Z'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub letter: char,
    pub title: String,
    pub tasks: Vec<Task>,
}

impl Category {
    pub fn is_bonus(&self) -> bool {
        is_bonus_letter(self.letter)
    }
}

/// The one rule that maps a task id onto its category: the first character,
/// uppercased. Ids that do not start with an ASCII letter belong nowhere.
pub fn category_letter(task_id: &str) -> Option<char> {
    task_id
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
}

pub fn next_letter(letter: char) -> Option<char> {
    let letter = letter.to_ascii_uppercase();
    if ('A'..'Z').contains(&letter) {
        Some((letter as u8 + 1) as char)
    } else {
        None
    }
}

pub fn previous_letter(letter: char) -> Option<char> {
    let letter = letter.to_ascii_uppercase();
    if ('B'..='Z').contains(&letter) {
        Some((letter as u8 - 1) as char)
    } else {
        None
    }
}

pub fn is_bonus_letter(letter: char) -> bool {
    BONUS_LETTERS.contains(&letter.to_ascii_uppercase())
}

/// Read-only, letter-ordered collection of exercise categories.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn from_categories(mut categories: Vec<Category>) -> Result<Self> {
        for category in &mut categories {
            if !category.letter.is_ascii_alphabetic() {
                return Err(Error::InvalidCatalog(format!(
                    "category letter '{}' is not A-Z",
                    category.letter
                )));
            }
            category.letter = category.letter.to_ascii_uppercase();
            for task in &category.tasks {
                if category_letter(&task.id) != Some(category.letter) {
                    return Err(Error::InvalidCatalog(format!(
                        "task '{}' does not belong to category {}",
                        task.id, category.letter
                    )));
                }
            }
        }

        categories.sort_by_key(|c| c.letter);
        if let Some(pair) = categories.windows(2).find(|w| w[0].letter == w[1].letter) {
            return Err(Error::InvalidCatalog(format!(
                "category {} defined twice",
                pair[0].letter
            )));
        }

        Ok(Self { categories })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let categories: Vec<Category> = serde_json::from_str(raw)?;
        Self::from_categories(categories)
    }

    pub fn builtin() -> Self {
        let categories = BUILTIN
            .iter()
            .map(|(letter, title, tasks)| Category {
                letter: *letter,
                title: title.to_string(),
                tasks: tasks
                    .iter()
                    .map(|(id, title, difficulty)| Task {
                        id: id.to_string(),
                        title: title.to_string(),
                        difficulty: *difficulty,
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, letter: char) -> Option<&Category> {
        let letter = letter.to_ascii_uppercase();
        self.categories.iter().find(|c| c.letter == letter)
    }

    pub fn contains(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    pub fn category_of(&self, task_id: &str) -> Option<&Category> {
        category_letter(task_id).and_then(|letter| self.get(letter))
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.category_of(task_id)?
            .tasks
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(task_id))
    }

    pub fn task_count(&self, letter: char) -> usize {
        self.get(letter).map_or(0, |c| c.tasks.len())
    }

    pub fn total_tasks(&self) -> usize {
        self.categories.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

type TaskRow = (&'static str, &'static str, Difficulty);

use Difficulty::{Easy, Hard, Medium};

// Exercises against the zoo database (animals, species, keepers, feeding).
#[rustfmt::skip]
const BUILTIN: &[(char, &str, &[TaskRow])] = &[
    ('A', "Basic Queries", &[
        ("a1", "Discover All Animals", Easy),
        ("a2", "Lightweight Animals", Easy),
        ("a3", "Animals Starting With 'A'", Easy),
        ("a4", "Alphabetical Listing", Easy),
    ]),
    ('B', "Advanced Search", &[
        ("b1", "Elephants in the Zoo", Easy),
        ("b2", "Julies and Their Species", Easy),
        ("b3", "Sisi the Bat", Easy),
    ]),
    ('C', "Sorting and Limits", &[
        ("c1", "The Lightest Five", Easy),
        ("c2", "The Heaviest Rabbit", Easy),
        ("c3", "The Oldest Wolf", Medium),
    ]),
    ('D', "Compound Conditions", &[
        ("d1", "Heavy Wolves", Easy),
        ("d2", "Heaviest Light Spider", Easy),
        ("d3", "A or B", Easy),
    ]),
    ('E', "Advanced Queries", &[
        ("e1", "Third Oldest Julie", Easy),
        ("e2", "Heaviest Born in January 2003", Easy),
        ("e3", "Medium Weight C or a", Medium),
    ]),
    ('F', "Subqueries", &[
        ("f1", "Equal Weight", Hard),
    ]),
    ('G', "Table Relationships", &[
        ("g1", "The Spider's Keeper", Easy),
        ("g2", "Heavy Animals of 1950", Easy),
        ("g3", "Earwig Lovers", Easy),
    ]),
    ('H', "Complex Joins", &[
        ("h1", "Luke's Heaviest", Easy),
        ("h2", "Emil's Light Ones", Easy),
        ("h3", "The Oldest Keeper", Medium),
    ]),
    ('I', "Comparisons", &[
        ("i1", "Heavier Than Their Age", Hard),
    ]),
    ('J', "Aggregate Functions", &[
        ("j1", "The Youngest Keeper", Easy),
        ("j2", "Water Strider Weight", Easy),
        ("j3", "Aaron's Animals", Easy),
    ]),
    ('K', "Intricate Relationships", &[
        ("k1", "Favourite Wards", Easy),
        ("k2", "Snail Love", Easy),
        ("k3", "Falco's Friends", Medium),
    ]),
    ('L', "SQL Theory", &[
        ("l1", "Multiple Aggregations", Hard),
        ("l2", "Aggregations and Relationships", Hard),
    ]),
    ('M', "Aggregates and Statistics", &[
        ("m1", "Average Sparrow Weight", Easy),
        ("m2", "The Busiest Keeper", Easy),
        ("m3", "Species per Keeper", Easy),
    ]),
    ('N', "Advanced Filters", &[
        ("n1", "Heavy Species", Easy),
        ("n2", "Heaviest Species on Average", Easy),
        ("n3", "Animals With Admirers", Medium),
    ]),
    ('O', "Targeted Aggregates", &[
        ("o1", "Weight of Favourite Budgies", Hard),
        ("o2", "Average Weight of 20 Year Olds", Hard),
    ]),
    ('P', "Compound Queries", &[
        ("p1", "Unloved Species", Easy),
        ("p2", "Several Animals of One Species", Easy),
        ("p3", "Same Weight", Easy),
        ("p4", "Daily Courses", Medium),
    ]),
    ('Q', "Aggregate Calculations", &[
        ("q1", "Heavy Species on Average", Easy),
        ("q2", "Budgie Specialist", Easy),
        ("q3", "Double Feeding", Easy),
    ]),
    ('R', "Negation and Conditions", &[
        ("r1", "Not Fond of Sparrows", Easy),
        ("r2", "The Most Hateful", Easy),
        ("r3", "Heavy Animals With Few Keepers", Easy),
    ]),
    ('S', "Complex Relationships", &[
        ("s1", "Unpopular Animals", Easy),
        ("s2", "Loved Without Care", Easy),
        ("s3", "Abandoned Animals", Medium),
    ]),
    ('T', "Beloved Animals", &[
        ("t1", "Only the Beloved", Hard),
    ]),
    ('U', "Extreme Values", &[
        ("u1", "The Lightest Animals", Easy),
        ("u2", "Animals of the Eldest", Easy),
        ("u3", "Lightest With Several Keepers", Easy),
    ]),
    ('V', "Complex Analysis", &[
        ("v1", "Keepers' Heaviest Animals", Easy),
        ("v2", "Sellable Animals", Easy),
        ("v3", "Shared Interests With Luke", Medium),
    ]),
    ('W', "Statistical Analysis", &[
        ("w1", "The Most Average Weight", Hard),
    ]),
    ('X', "Temporal Analysis", &[
        ("x1", "Same Birth Date", Easy),
        ("x2", "The Most Fertile Day", Easy),
        ("x3", "Oldest Unloved", Easy),
    ]),
    ('Y', "Negated Relationships", &[
        ("y1", "Old Animals Without Care", Easy),
        ("y2", "Loved but Unattended", Easy),
        ("y3", "Animal Data Only", Easy),
    ]),
    ('Z', "Advanced Temporal Analysis", &[
        ("z1", "Most Fertile Day of the Week", Hard),
    ]),
];
