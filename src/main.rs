//! Interactive Book entry point
//!
//! Native: headless demo that autoplays a book against on-disk progress.
//! Web: installs logging and exposes a thin session wrapper to the page.

#[cfg(target_arch = "wasm32")]
mod web_book {
    use wasm_bindgen::prelude::*;

    use interactive_book::catalog::get_book;
    use interactive_book::platform::{LocalStore, default_store};
    use interactive_book::sim::TapOutcome;
    use interactive_book::{BookSession, Difficulty, Settings};

    /// Book session bound to LocalStorage
    #[wasm_bindgen]
    pub struct WebBook {
        session: BookSession<LocalStore>,
    }

    #[wasm_bindgen]
    impl WebBook {
        #[wasm_bindgen(constructor)]
        pub fn new(book_id: &str) -> Result<WebBook, JsValue> {
            let book = get_book(book_id)
                .ok_or_else(|| JsValue::from_str(&format!("unknown book {book_id}")))?;
            let store = default_store().map_err(|e| JsValue::from_str(&e.to_string()))?;
            let settings = Settings::load(&store);
            Ok(WebBook {
                session: BookSession::open(book, store, settings),
            })
        }

        /// requestAnimationFrame callback; returns feedback lines produced this frame
        pub fn frame(&mut self, now_ms: f64) -> Vec<String> {
            self.session
                .frame(now_ms)
                .iter()
                .filter_map(|(_, event)| event.feedback())
                .collect()
        }

        pub fn set_arena(&mut self, width: f64, height: f64) {
            self.session.set_arena(width, height);
        }

        pub fn start(&mut self, step_id: &str) -> bool {
            self.session.start(step_id)
        }

        pub fn stop(&mut self, step_id: &str) -> bool {
            self.session.stop(step_id)
        }

        /// True on a hit or completion
        pub fn tap(&mut self, step_id: &str) -> bool {
            matches!(
                self.session.tap(step_id),
                TapOutcome::Hit { .. } | TapOutcome::Completed(_)
            )
        }

        pub fn hold_start(&mut self, step_id: &str) -> bool {
            self.session.hold_start(step_id)
        }

        pub fn hold_end(&mut self, step_id: &str) {
            self.session.hold_end(step_id);
        }

        pub fn squash(&mut self, step_id: &str, mosquito_id: u32) -> bool {
            self.session.squash(step_id, mosquito_id)
        }

        pub fn mark_read(&mut self, step_id: &str) -> bool {
            self.session.mark_read(step_id)
        }

        pub fn set_difficulty(&mut self, step_id: &str, difficulty: &str) -> bool {
            Difficulty::from_str(difficulty)
                .is_some_and(|d| self.session.set_difficulty(step_id, d))
        }

        pub fn reset_step(&mut self, step_id: &str) -> bool {
            self.session.reset_step(step_id)
        }

        pub fn go_next(&mut self) -> bool {
            self.session.go_next()
        }

        pub fn go_prev(&mut self) -> bool {
            self.session.go_prev()
        }

        pub fn skip(&mut self) -> bool {
            self.session.skip()
        }

        pub fn retry_page(&mut self) {
            self.session.retry_page();
        }

        pub fn reset_progress(&mut self) {
            self.session.reset_progress();
        }

        pub fn current_page_index(&self) -> usize {
            self.session.progress().current_page_index()
        }

        pub fn can_go_next(&self) -> bool {
            self.session.progress().can_go_next()
        }

        /// Serialized progress (`{currentPageIndex, stepResults}`)
        pub fn progress_json(&self) -> String {
            serde_json::to_string(self.session.progress().state()).unwrap_or_default()
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        return;
    }
    log::info!("Interactive Book starting...");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use std::process::ExitCode;

    use interactive_book::autoplay::Autoplay;
    use interactive_book::catalog::{DEMO_BOOK_ID, get_book};
    use interactive_book::platform::FileStore;
    use interactive_book::{BookSession, Settings};

    env_logger::init();

    let mut args = std::env::args().skip(1);
    let book_id = args.next().unwrap_or_else(|| DEMO_BOOK_ID.to_string());
    let dir = args
        .next()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(FileStore::default_dir);

    let Some(book) = get_book(&book_id) else {
        log::error!("unknown book {book_id}");
        return ExitCode::from(2);
    };
    let store = match FileStore::open(dir.clone()) {
        Ok(store) => store,
        Err(e) => {
            log::error!("cannot open progress directory {}: {e}", dir.display());
            return ExitCode::FAILURE;
        }
    };

    log::info!("Interactive Book (native) starting...");
    let settings = Settings::load(&store);
    let mut session = BookSession::open(book, store, settings);
    let mut player = Autoplay::new();
    let finished = player.play_book(&mut session, 120_000.0);

    let progress = session.progress();
    for (index, page) in session.book().pages.iter().enumerate() {
        let mark = if progress.is_page_complete(index) { "x" } else { " " };
        println!("[{mark}] {}", page.title);
        for step_id in page.step_ids() {
            if let Some(result) = progress.result(step_id) {
                println!("      {step_id}: {:?} score {:?}", result.status, result.score);
            }
        }
    }
    println!(
        "Progress saved to {} ({:.1} s simulated)",
        dir.display(),
        player.now_ms() / 1000.0
    );

    if finished {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
