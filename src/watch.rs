//! File system watcher and debounced rebuild loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ touch() ┌───────────────┐ try_begin() ┌──────────────┐
//! │ notify       │────────▶│ BuildTrigger  │◀────────────│ BuildLoop    │
//! │ (own thread) │         │ Mutex{stamp,  │  finish()   │ (own thread) │
//! └──────────────┘         │   building}   │             │  build()     │
//!                          └───────────────┘             │  notify_all()│
//!                                                        └──────────────┘
//! ```
//!
//! # States
//!
//! | State      | Stamp | Building | Leaves when                                 |
//! |------------|-------|----------|---------------------------------------------|
//! | `Idle`     | none  | no       | an event stamps the trigger                 |
//! | `Pending`  | some  | no       | the stamp is older than the debounce window |
//! | `Building` | any   | yes      | the build returns, errors or panics         |
//!
//! A build captures the stamp it started from. Events arriving while it runs
//! replace the stamp, so the trigger stays `Pending` afterwards and another
//! build follows once the burst has quieted. Changes are never dropped.

use crate::{config::SiteConfig, content::IgnoreRules, log, reload::LiveReloadBroker};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || (name.starts_with('#') && name.ends_with('#'))
        || name == "4913"
}

/// Events that should schedule a rebuild.
fn is_relevant(event: &Event, content_root: &Path, ignore: &IgnoreRules) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }

    event.paths.iter().any(|path| {
        !is_temp_file(path)
            && path
                .strip_prefix(content_root)
                .is_ok_and(|rel| !ignore.is_ignored(rel))
    })
}

// =============================================================================
// Trigger State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Pending,
    Building,
}

/// Last observed change. `seq` tells apart stamps taken within one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct TriggerState {
    pending: Option<Stamp>,
    building: bool,
    seq: u64,
}

/// Shared pending-change stamp and building flag.
#[derive(Debug, Default)]
pub struct BuildTrigger {
    state: Mutex<TriggerState>,
}

impl BuildTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change now, whatever the current state.
    pub fn touch(&self) {
        let mut state = self.state.lock();
        state.seq += 1;
        state.pending = Some(Stamp {
            at: Instant::now(),
            seq: state.seq,
        });
    }

    pub fn state(&self) -> LoopState {
        let state = self.state.lock();
        match (state.building, state.pending) {
            (true, _) => LoopState::Building,
            (false, Some(_)) => LoopState::Pending,
            (false, None) => LoopState::Idle,
        }
    }

    /// Enter `Building` if a change has been quiet for `debounce`.
    fn try_begin(&self, debounce: Duration) -> Option<Stamp> {
        let mut state = self.state.lock();
        let stamp = state.pending?;
        if state.building || stamp.at.elapsed() < debounce {
            return None;
        }
        state.building = true;
        Some(stamp)
    }

    /// Leave `Building`; back to `Idle` unless newer changes arrived.
    fn finish(&self, captured: Stamp) {
        let mut state = self.state.lock();
        state.building = false;
        if state.pending == Some(captured) {
            state.pending = None;
        }
    }
}

/// Clears the building flag even when the build unwinds.
struct BuildGuard<'a> {
    trigger: &'a BuildTrigger,
    stamp: Stamp,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.trigger.finish(self.stamp);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// =============================================================================
// Build Loop
// =============================================================================

/// Polls the trigger and runs at most one build at a time.
pub struct BuildLoop<F> {
    trigger: Arc<BuildTrigger>,
    broker: Arc<LiveReloadBroker>,
    debounce: Duration,
    poll: Duration,
    build: F,
}

impl<F> BuildLoop<F>
where
    F: FnMut() -> Result<()>,
{
    pub fn new(
        trigger: Arc<BuildTrigger>,
        broker: Arc<LiveReloadBroker>,
        debounce: Duration,
        poll: Duration,
        build: F,
    ) -> Self {
        Self {
            trigger,
            broker,
            debounce,
            poll,
            build,
        }
    }

    /// Run one build if one is due. Returns whether a build ran and succeeded.
    pub fn tick(&mut self) -> Option<bool> {
        let stamp = self.trigger.try_begin(self.debounce)?;
        let guard = BuildGuard {
            trigger: &self.trigger,
            stamp,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(&mut self.build));
        drop(guard);

        match outcome {
            Ok(Ok(())) => {
                let clients = self.broker.notify_all();
                if clients > 0 {
                    log!("reload"; "notified {clients} client(s)");
                }
                Some(true)
            }
            Ok(Err(err)) => {
                log!("error"; "build failed: {err:#}");
                Some(false)
            }
            Err(payload) => {
                log!("error"; "build panicked: {}", panic_message(payload.as_ref()));
                Some(false)
            }
        }
    }

    /// Poll until `running` is cleared.
    pub fn run(mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(self.poll);
        }
    }
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Keeps the notify watcher alive; dropping it stops event delivery.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Watch the content directory, stamping `trigger` on relevant events.
    pub fn start(config: &SiteConfig, trigger: Arc<BuildTrigger>) -> Result<Self> {
        let content_root = config.build.content.clone();
        let ignore = IgnoreRules::new(&config.build.ignore)?;
        let root = config.get_root().to_path_buf();

        let handler_root = content_root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_relevant(&event, &handler_root, &ignore) => {
                    if let Some(path) = event.paths.first() {
                        let rel = path.strip_prefix(&root).unwrap_or(path);
                        match trigger.state() {
                            LoopState::Building => {
                                log!("watch"; "{} changed, queued after current build", rel.display())
                            }
                            LoopState::Idle | LoopState::Pending => {
                                log!("watch"; "{} changed", rel.display())
                            }
                        }
                    }
                    trigger.touch();
                }
                Ok(_) => {}
                Err(err) => log!("watch"; "error: {err}"),
            }
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(&content_root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", content_root.display()))?;

        log!("watch"; "watching {}", content_root.display());
        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::WaitOutcome;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::{path::PathBuf, sync::atomic::AtomicUsize};

    fn counting_loop(
        trigger: &Arc<BuildTrigger>,
        broker: &Arc<LiveReloadBroker>,
        debounce: Duration,
        calls: &Arc<AtomicUsize>,
    ) -> BuildLoop<impl FnMut() -> Result<()> + use<>> {
        let calls = Arc::clone(calls);
        BuildLoop::new(
            Arc::clone(trigger),
            Arc::clone(broker),
            debounce,
            Duration::from_millis(10),
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("post.md.swp")));
        assert!(is_temp_file(Path::new("post.md~")));
        assert!(is_temp_file(Path::new(".#post.md")));
        assert!(is_temp_file(Path::new("#post.md#")));
        assert!(is_temp_file(Path::new("4913")));
        assert!(!is_temp_file(Path::new("post.md")));
    }

    #[test]
    fn test_is_relevant() {
        let root = PathBuf::from("/site/content");
        let ignore = IgnoreRules::new(&["_*"]).unwrap();
        let event = |kind, path: &str| Event::new(kind).add_path(PathBuf::from(path));

        let create = EventKind::Create(CreateKind::File);
        assert!(is_relevant(&event(create, "/site/content/a.md"), &root, &ignore));
        assert!(is_relevant(
            &event(EventKind::Remove(RemoveKind::File), "/site/content/a.md"),
            &root,
            &ignore
        ));
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), "/site/content/a.md"),
            &root,
            &ignore
        ));
        assert!(!is_relevant(&event(create, "/site/content/_drafts/a.md"), &root, &ignore));
        assert!(!is_relevant(&event(create, "/site/content/a.md.swp"), &root, &ignore));
        assert!(!is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/site/public/index.html"),
            &root,
            &ignore
        ));
    }

    #[test]
    fn test_states() {
        let trigger = BuildTrigger::new();
        assert_eq!(trigger.state(), LoopState::Idle);

        trigger.touch();
        assert_eq!(trigger.state(), LoopState::Pending);
        assert!(trigger.try_begin(Duration::from_secs(60)).is_none());

        let stamp = trigger.try_begin(Duration::ZERO).unwrap();
        assert_eq!(trigger.state(), LoopState::Building);
        assert!(trigger.try_begin(Duration::ZERO).is_none());

        trigger.finish(stamp);
        assert_eq!(trigger.state(), LoopState::Idle);
    }

    #[test]
    fn test_burst_triggers_single_build() {
        let trigger = Arc::new(BuildTrigger::new());
        let broker = Arc::new(LiveReloadBroker::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut build_loop =
            counting_loop(&trigger, &broker, Duration::from_millis(500), &calls);

        for _ in 0..5 {
            trigger.touch();
            thread::sleep(Duration::from_millis(10));
        }

        // Still inside the debounce window.
        assert_eq!(build_loop.tick(), None);
        assert_eq!(trigger.state(), LoopState::Pending);

        let deadline = Instant::now() + Duration::from_millis(1200);
        while Instant::now() < deadline {
            build_loop.tick();
            thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(trigger.state(), LoopState::Idle);
    }

    #[test]
    fn test_change_during_build_schedules_another() {
        let trigger = Arc::new(BuildTrigger::new());
        let broker = Arc::new(LiveReloadBroker::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_trigger = Arc::clone(&trigger);
        let inner_calls = Arc::clone(&calls);
        let mut build_loop = BuildLoop::new(
            Arc::clone(&trigger),
            Arc::clone(&broker),
            Duration::from_millis(20),
            Duration::from_millis(5),
            move || {
                assert_eq!(inner_trigger.state(), LoopState::Building);
                if inner_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    inner_trigger.touch();
                }
                Ok(())
            },
        );

        trigger.touch();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(build_loop.tick(), Some(true));
        assert_eq!(trigger.state(), LoopState::Pending);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(build_loop.tick(), Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(trigger.state(), LoopState::Idle);
    }

    #[test]
    fn test_panicking_build_resets_state() {
        let trigger = Arc::new(BuildTrigger::new());
        let broker = Arc::new(LiveReloadBroker::new());
        let mut fail = true;
        let mut build_loop = BuildLoop::new(
            Arc::clone(&trigger),
            Arc::clone(&broker),
            Duration::ZERO,
            Duration::from_millis(5),
            move || {
                if std::mem::replace(&mut fail, false) {
                    panic!("template exploded");
                }
                Ok(())
            },
        );

        trigger.touch();
        assert_eq!(build_loop.tick(), Some(false));
        assert_eq!(trigger.state(), LoopState::Idle);

        trigger.touch();
        assert_eq!(build_loop.tick(), Some(true));
    }

    #[test]
    fn test_only_successful_builds_notify() {
        let trigger = Arc::new(BuildTrigger::new());
        let broker = Arc::new(LiveReloadBroker::new());
        let mut ok = false;
        let mut build_loop = BuildLoop::new(
            Arc::clone(&trigger),
            Arc::clone(&broker),
            Duration::ZERO,
            Duration::from_millis(5),
            move || {
                let result = if ok { Ok(()) } else { Err(anyhow::anyhow!("broken")) };
                ok = true;
                result
            },
        );

        let waiter = broker.register();
        trigger.touch();
        assert_eq!(build_loop.tick(), Some(false));
        assert_eq!(
            broker.wait(&waiter, Duration::from_millis(20)),
            WaitOutcome::Timeout
        );

        trigger.touch();
        assert_eq!(build_loop.tick(), Some(true));
        assert_eq!(
            broker.wait(&waiter, Duration::from_millis(20)),
            WaitOutcome::Reload
        );
    }

    #[test]
    fn test_run_stops_when_cleared() {
        let trigger = Arc::new(BuildTrigger::new());
        let broker = Arc::new(LiveReloadBroker::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let build_loop = counting_loop(&trigger, &broker, Duration::ZERO, &calls);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || build_loop.run(&flag));

        trigger.touch();
        let deadline = Instant::now() + Duration::from_secs(2);
        while calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
