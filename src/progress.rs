//! Persisted reading progress
//!
//! One JSON blob per book under `interactive_book_progress:<bookId>`. Loading
//! validates the blob against the current book: unknown step ids are pruned,
//! malformed entries are dropped, and the page index is clamped. Anything
//! unreadable degrades to the empty state.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::book::{Book, Page, StepResult, is_success};
use crate::consts::PROGRESS_NAMESPACE;
use crate::platform::{KvStore, StorageError};

/// Storage key for a book's progress
pub fn storage_key(book_id: &str) -> String {
    format!("{PROGRESS_NAMESPACE}:{book_id}")
}

/// Reader position and recorded step outcomes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub current_page_index: usize,
    pub step_results: BTreeMap<String, StepResult>,
}

impl ProgressState {
    /// Validate a raw blob against `book`; `None` if it is not a JSON object
    pub fn from_json(raw: &str, book: &Book) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;

        let known = book.step_ids();
        let mut step_results = BTreeMap::new();
        if let Some(results) = object.get("stepResults").and_then(Value::as_object) {
            for (step_id, entry) in results {
                if !known.contains(step_id.as_str()) {
                    log::debug!("pruning stale step result {step_id}");
                    continue;
                }
                match serde_json::from_value::<StepResult>(entry.clone()) {
                    Ok(result) if result.step_id == *step_id => {
                        step_results.insert(step_id.clone(), result);
                    }
                    Ok(_) | Err(_) => log::debug!("dropping malformed step result {step_id}"),
                }
            }
        }

        let index = object
            .get("currentPageIndex")
            .and_then(Value::as_f64)
            .filter(|i| i.is_finite())
            .unwrap_or(0.0);

        Some(Self {
            current_page_index: clamp_page_index(index, book.page_count()),
            step_results,
        })
    }

    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }
}

fn clamp_page_index(index: f64, page_count: usize) -> usize {
    let last = page_count.saturating_sub(1) as f64;
    index.floor().clamp(0.0, last) as usize
}

/// Load/save/reset against a key-value store
#[derive(Debug, Clone)]
pub struct ProgressStore<S> {
    store: S,
}

impl<S: KvStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored progress for `book`, or the empty state
    pub fn load(&self, book: &Book) -> ProgressState {
        let key = storage_key(&book.id);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressState::default(),
            Err(e) => {
                log::warn!("failed to read {key}: {e}");
                return ProgressState::default();
            }
        };
        match ProgressState::from_json(&raw, book) {
            Some(state) => {
                log::info!(
                    "loaded progress for {} (page {}, {} results)",
                    book.id,
                    state.current_page_index,
                    state.step_results.len()
                );
                state
            }
            None => {
                log::warn!("ignoring unreadable progress for {}", book.id);
                ProgressState::default()
            }
        }
    }

    pub fn save(&mut self, book_id: &str, state: &ProgressState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)?;
        self.store.set(&storage_key(book_id), &json)
    }

    pub fn reset(&mut self, book_id: &str) -> Result<(), StorageError> {
        self.store.remove(&storage_key(book_id))
    }
}

/// Progress for one open book, with page navigation
///
/// Every mutation is written through once the initial load has happened;
/// before that, writes would clobber the stored blob with defaults.
#[derive(Debug, Clone)]
pub struct BookProgress<S> {
    book: Book,
    store: ProgressStore<S>,
    state: ProgressState,
    loaded: bool,
}

impl<S: KvStore> BookProgress<S> {
    /// Unloaded progress; nothing is persisted until `load`
    pub fn new(book: Book, store: S) -> Self {
        Self {
            book,
            store: ProgressStore::new(store),
            state: ProgressState::default(),
            loaded: false,
        }
    }

    pub fn open(book: Book, store: S) -> Self {
        let mut progress = Self::new(book, store);
        progress.load();
        progress
    }

    pub fn load(&mut self) {
        self.state = self.store.load(&self.book);
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn store(&self) -> &S {
        self.store.store()
    }

    pub fn current_page_index(&self) -> usize {
        self.state.current_page_index
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.book.pages.get(self.state.current_page_index)
    }

    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.state.result(step_id)
    }

    fn persist(&mut self) {
        if !self.loaded {
            return;
        }
        if let Err(e) = self.store.save(&self.book.id, &self.state) {
            log::warn!("failed to save progress for {}: {e}", self.book.id);
        }
    }

    /// Record a step outcome, replacing any previous one
    pub fn set_step_result(&mut self, result: StepResult) -> bool {
        if self.book.find_step(&result.step_id).is_none() {
            log::warn!("ignoring result for unknown step {}", result.step_id);
            return false;
        }
        log::debug!("recording {:?} for {}", result.status, result.step_id);
        self.state.step_results.insert(result.step_id.clone(), result);
        self.persist();
        true
    }

    /// Forget one step's outcome so it can be replayed
    pub fn clear_step_result(&mut self, step_id: &str) -> bool {
        let removed = self.state.step_results.remove(step_id).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear_step_results<'a>(&mut self, step_ids: impl IntoIterator<Item = &'a str>) {
        let ids: HashSet<&str> = step_ids.into_iter().collect();
        let before = self.state.step_results.len();
        self.state.step_results.retain(|id, _| !ids.contains(id.as_str()));
        if self.state.step_results.len() != before {
            self.persist();
        }
    }

    pub fn set_current_page(&mut self, index: usize) {
        let clamped = clamp_page_index(index as f64, self.book.page_count());
        if clamped != self.state.current_page_index {
            self.state.current_page_index = clamped;
            self.persist();
        }
    }

    /// Every step on the page has a successful result
    pub fn is_page_complete(&self, index: usize) -> bool {
        self.book.pages.get(index).is_some_and(|page| {
            page.steps
                .iter()
                .all(|step| is_success(self.state.result(step.id())))
        })
    }

    pub fn is_last_page(&self) -> bool {
        self.state.current_page_index + 1 >= self.book.page_count()
    }

    pub fn can_go_prev(&self) -> bool {
        self.state.current_page_index > 0
    }

    pub fn can_go_next(&self) -> bool {
        !self.is_last_page() && self.is_page_complete(self.state.current_page_index)
    }

    pub fn can_skip(&self) -> bool {
        !self.is_last_page()
    }

    pub fn go_prev(&mut self) -> bool {
        if !self.can_go_prev() {
            return false;
        }
        self.set_current_page(self.state.current_page_index - 1);
        true
    }

    pub fn go_next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.set_current_page(self.state.current_page_index + 1);
        true
    }

    /// Move on without completing the current page
    pub fn skip(&mut self) -> bool {
        if !self.can_skip() {
            return false;
        }
        self.set_current_page(self.state.current_page_index + 1);
        true
    }

    /// Clear every result on the current page
    pub fn retry_page(&mut self) {
        let ids: Vec<String> = self
            .current_page()
            .map(|page| page.steps.iter().map(|s| s.id().to_owned()).collect())
            .unwrap_or_default();
        self.clear_step_results(ids.iter().map(String::as_str));
    }

    /// Back to page one with nothing recorded; the stored blob is deleted
    pub fn reset_progress(&mut self) {
        self.state = ProgressState::default();
        if let Err(e) = self.store.reset(&self.book.id) {
            log::warn!("failed to clear progress for {}: {e}", self.book.id);
        }
        log::info!("progress reset for {}", self.book.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::demo_book;
    use crate::platform::MemoryStore;
    use serde_json::json;

    fn seeded(value: Value) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .set(&storage_key("demo"), &value.to_string())
            .unwrap();
        store
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(storage_key("demo"), "interactive_book_progress:demo");
    }

    #[test]
    fn test_load_missing_or_garbage_is_default() {
        let book = demo_book();
        let store = ProgressStore::new(MemoryStore::new());
        assert_eq!(store.load(&book), ProgressState::default());

        let mut raw = MemoryStore::new();
        raw.set(&storage_key("demo"), "not json").unwrap();
        assert_eq!(ProgressStore::new(raw).load(&book), ProgressState::default());

        let array = seeded(json!([1, 2, 3]));
        assert_eq!(ProgressStore::new(array).load(&book), ProgressState::default());
    }

    #[test]
    fn test_load_prunes_unknown_and_malformed_entries() {
        let book = demo_book();
        let store = seeded(json!({
            "currentPageIndex": 1,
            "stepResults": {
                "p1-step-1": {"stepId": "p1-step-1", "status": "success"},
                "removed-step": {"stepId": "removed-step", "status": "success"},
                "p2-step-1": {"status": "sideways"},
                "p1-step-2": {"stepId": "p2-step-1", "status": "success"}
            }
        }));
        let state = ProgressStore::new(store).load(&book);
        assert_eq!(state.current_page_index, 1);
        assert_eq!(
            state.step_results.keys().collect::<Vec<_>>(),
            vec!["p1-step-1"]
        );
    }

    #[test]
    fn test_load_clamps_page_index() {
        let book = demo_book();
        for (raw, expected) in [
            (json!(99), book.page_count() - 1),
            (json!(-3), 0),
            (json!(2.7), 2),
            (json!("two"), 0),
        ] {
            let store = seeded(json!({"currentPageIndex": raw, "stepResults": {}}));
            assert_eq!(ProgressStore::new(store).load(&book).current_page_index, expected);
        }
    }

    #[test]
    fn test_no_save_before_load() {
        let store = seeded(json!({"currentPageIndex": 2, "stepResults": {}}));
        let mut progress = BookProgress::new(demo_book(), store.clone());
        progress.set_step_result(StepResult::success("p1-step-1"));
        let raw = store.get(&storage_key("demo")).unwrap().unwrap();
        assert!(!raw.contains("p1-step-1"));

        progress.load();
        assert_eq!(progress.current_page_index(), 2);
        progress.set_step_result(StepResult::success("p1-step-1"));
        let raw = store.get(&storage_key("demo")).unwrap().unwrap();
        assert!(raw.contains("\"stepResults\""));
        assert!(raw.contains("p1-step-1"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut progress = BookProgress::open(demo_book(), MemoryStore::new());
        let mut meta = crate::book::ResultMeta::new();
        meta.insert("heldMs".into(), json!(1));
        progress.set_step_result(StepResult::success("p2-step-1").with_score(40).with_meta(meta));
        progress.set_step_result(StepResult::success("p2-step-1").with_score(90));
        let stored = progress.result("p2-step-1").unwrap();
        assert_eq!(stored.score, Some(90));
        assert!(stored.meta.is_none());
    }

    #[test]
    fn test_unknown_step_result_rejected() {
        let mut progress = BookProgress::open(demo_book(), MemoryStore::new());
        assert!(!progress.set_step_result(StepResult::success("nope")));
        assert!(progress.state().step_results.is_empty());
    }

    #[test]
    fn test_page_gating_and_navigation() {
        let mut progress = BookProgress::open(demo_book(), MemoryStore::new());
        assert!(!progress.can_go_prev());
        assert!(!progress.can_go_next());
        assert!(!progress.go_next());

        progress.set_step_result(StepResult::success("p1-step-1"));
        assert!(!progress.is_page_complete(0));
        progress.set_step_result(StepResult::success("p1-step-2"));
        assert!(progress.is_page_complete(0));
        assert!(progress.go_next());
        assert_eq!(progress.current_page_index(), 1);
        assert!(progress.go_prev());
        assert_eq!(progress.current_page_index(), 0);
    }

    #[test]
    fn test_skip_until_last_page() {
        let mut progress = BookProgress::open(demo_book(), MemoryStore::new());
        let pages = progress.book().page_count();
        for _ in 0..pages - 1 {
            assert!(progress.skip());
        }
        assert!(progress.is_last_page());
        assert!(!progress.can_skip());
        assert!(!progress.skip());
        assert_eq!(progress.current_page_index(), pages - 1);
    }

    #[test]
    fn test_retry_page_and_clear_step_are_scoped() {
        let mut progress = BookProgress::open(demo_book(), MemoryStore::new());
        for id in ["p1-step-1", "p1-step-2", "p2-step-1"] {
            progress.set_step_result(StepResult::success(id));
        }
        progress.set_current_page(1);

        assert!(progress.clear_step_result("p1-step-2"));
        assert!(!progress.clear_step_result("p1-step-2"));
        assert!(progress.result("p1-step-1").is_some());
        assert!(progress.result("p2-step-1").is_some());
        assert_eq!(progress.current_page_index(), 1);

        progress.retry_page();
        assert!(progress.result("p2-step-1").is_none());
        assert!(progress.result("p1-step-1").is_some());
    }

    #[test]
    fn test_reset_progress_removes_blob() {
        let store = MemoryStore::new();
        let mut progress = BookProgress::open(demo_book(), store.clone());
        progress.set_step_result(StepResult::success("p1-step-1"));
        progress.set_current_page(3);
        assert!(store.get(&storage_key("demo")).unwrap().is_some());

        progress.reset_progress();
        assert_eq!(progress.state(), &ProgressState::default());
        assert_eq!(store.get(&storage_key("demo")).unwrap(), None);
    }

    #[test]
    fn test_persisted_shape_is_camel_case() {
        let mut state = ProgressState::default();
        state.current_page_index = 2;
        state
            .step_results
            .insert("p1-step-1".into(), StepResult::success("p1-step-1").with_score(7));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "currentPageIndex": 2,
                "stepResults": {"p1-step-1": {"stepId": "p1-step-1", "status": "success", "score": 7}}
            })
        );
    }
}
