//! Built-in book catalog
//!
//! Stands in for the content service: hands out immutable books by id.

use crate::book::{
    Book, MosquitoDefenseStep, Page, StealthPourStep, Step, TapTimingStep, TextStep,
};

/// Id of the bundled demo book
pub const DEMO_BOOK_ID: &str = "demo";

fn text(id: &str, text: &str) -> Step {
    Step::Text(TextStep {
        id: id.into(),
        text: text.into(),
    })
}

/// Five-page demo: reading, timing, stealth, defense, epilogue
pub fn demo_book() -> Book {
    Book {
        id: DEMO_BOOK_ID.into(),
        title: "Demo: Our Journey".into(),
        pages: vec![
            Page {
                id: "page-1".into(),
                title: "Welcome".into(),
                steps: vec![
                    text(
                        "p1-step-1",
                        "Welcome to your interactive book. Every page holds a small moment to live together.",
                    ),
                    text(
                        "p1-step-2",
                        "Read calmly and complete every step to unlock the next page.",
                    ),
                ],
            },
            Page {
                id: "page-2".into(),
                title: "Timing Challenge".into(),
                steps: vec![Step::TapTiming(TapTimingStep {
                    id: "p2-step-1".into(),
                    prompt: "Tap when the cursor enters the highlighted zone.".into(),
                    duration_ms: 2400.0,
                    target_start_pct: 42.0,
                    target_end_pct: 58.0,
                    attempts_allowed: Some(3),
                })],
            },
            Page {
                id: "page-3".into(),
                title: "Pour Without Being Seen".into(),
                steps: vec![Step::StealthPour(StealthPourStep {
                    id: "p3-step-1-stealth".into(),
                    prompt: "Hold to pour, but only while it is safe.".into(),
                    total_hold_ms: 15000.0,
                    safe_min_ms: Some(1500.0),
                    safe_max_ms: Some(3200.0),
                    unsafe_min_ms: Some(1200.0),
                    unsafe_max_ms: Some(2800.0),
                })],
            },
            Page {
                id: "page-4".into(),
                title: "Defend Her".into(),
                steps: vec![Step::MosquitoDefense(MosquitoDefenseStep {
                    id: "p4-step-1-mosquito".into(),
                    prompt: "Squash the mosquitoes before they reach the center.".into(),
                    duration_ms: 30000.0,
                })],
            },
            Page {
                id: "page-5".into(),
                title: "Epilogue".into(),
                steps: vec![text(
                    "p5-step-1",
                    "You finished the demo! This is only the beginning of your story.",
                )],
            },
        ],
    }
}

/// Look up a book by id
pub fn get_book(book_id: &str) -> Option<Book> {
    match book_id {
        DEMO_BOOK_ID => Some(demo_book()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_book() {
        assert!(get_book("demo").is_some());
        assert!(get_book("missing").is_none());
    }

    #[test]
    fn test_demo_step_ids_are_unique() {
        let book = demo_book();
        let total: usize = book.pages.iter().map(|p| p.steps.len()).sum();
        assert_eq!(book.step_ids().len(), total);
    }
}
