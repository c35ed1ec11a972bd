//! ChangeScheduler: debounced re-scan state machine
//!
//! # States
//! ```text
//! AwaitingLoad --loaded--> Settling --tick--> Scanning(document, initial)
//! Idle --mutation--> Scheduled(root) --mutation--> Scheduled(lca(root, region))
//! Scheduled --timer elapsed--> Scanning(root) --finished--> Idle
//! any live state --labels changed--> Scanning(document, clear markers)
//! any state --dispose--> Disposed
//! ```
//!
//! The machine never touches timers or the document itself. Each event
//! returns a `Directive` telling the host what to do (arm the single timer,
//! run a scan, cancel the timer). Time is caller-supplied milliseconds, so
//! tests drive it with synthetic events.

use serde::{Deserialize, Serialize};

use crate::dom::{common_ancestor, Dom};

/// Quiescence window after the last mutation
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Idle time after load before the initial scan
pub const DEFAULT_SETTLE_MS: u64 = 100;

// =============================================================================
// Types
// =============================================================================

/// Region a scan pass covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope<N> {
    Subtree(N),
    Document,
}

impl<N: Clone + PartialEq> ScanScope<N> {
    /// Smallest scope covering both this scope and `region`
    pub fn widen<D: Dom<Node = N>>(self, dom: &D, region: &N) -> Self {
        match self {
            ScanScope::Document => ScanScope::Document,
            ScanScope::Subtree(current) => match common_ancestor(dom, &current, region) {
                Some(lca) if lca != dom.root() => ScanScope::Subtree(lca),
                _ => ScanScope::Document,
            },
        }
    }
}

/// A scan the host must run now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest<N> {
    pub scope: ScanScope<N>,
    /// Clear processed markers (and restore annotations) first
    pub clear_markers: bool,
    /// First pass after load; the host attaches its mutation listener after it
    pub initial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<N> {
    /// Nothing to do
    Wait,
    /// (Re)arm the single timer to fire at `deadline`
    ArmTimer { deadline: u64 },
    /// Run a scan, then report back with `scan_finished`
    Scan(ScanRequest<N>),
    /// Drop any pending timer and detach listeners
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState<N> {
    AwaitingLoad,
    Settling {
        deadline: u64,
    },
    Idle,
    Scheduled {
        pending: ScanScope<N>,
        deadline: u64,
    },
    Scanning {
        /// Mutations observed mid-scan, replayed once it finishes
        queued: Option<ScanScope<N>>,
        /// A label write arrived mid-scan
        forced_again: bool,
    },
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerTiming {
    pub debounce_ms: u64,
    pub settle_ms: u64,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

// =============================================================================
// ChangeScheduler
// =============================================================================

#[derive(Debug)]
pub struct ChangeScheduler<N> {
    state: SchedulerState<N>,
    timing: SchedulerTiming,
}

impl<N: Clone + PartialEq> Default for ChangeScheduler<N> {
    fn default() -> Self {
        Self::new(SchedulerTiming::default())
    }
}

impl<N: Clone + PartialEq> ChangeScheduler<N> {
    pub fn new(timing: SchedulerTiming) -> Self {
        Self {
            state: SchedulerState::AwaitingLoad,
            timing,
        }
    }

    pub fn state(&self) -> &SchedulerState<N> {
        &self.state
    }

    /// Current state name (for debugging)
    pub fn state_name(&self) -> &'static str {
        match self.state {
            SchedulerState::AwaitingLoad => "awaiting_load",
            SchedulerState::Settling { .. } => "settling",
            SchedulerState::Idle => "idle",
            SchedulerState::Scheduled { .. } => "scheduled",
            SchedulerState::Scanning { .. } => "scanning",
            SchedulerState::Disposed => "disposed",
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state == SchedulerState::Disposed
    }

    fn start_scan(&mut self, scope: ScanScope<N>, clear_markers: bool, initial: bool) -> Directive<N> {
        self.state = SchedulerState::Scanning {
            queued: None,
            forced_again: false,
        };
        Directive::Scan(ScanRequest {
            scope,
            clear_markers,
            initial,
        })
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Host document finished loading
    pub fn document_loaded(&mut self, now: u64) -> Directive<N> {
        match self.state {
            SchedulerState::AwaitingLoad => {
                let deadline = now + self.timing.settle_ms;
                self.state = SchedulerState::Settling { deadline };
                Directive::ArmTimer { deadline }
            }
            _ => Directive::Wait,
        }
    }

    /// The armed timer fired. Stale firings re-arm for the current deadline.
    pub fn timer_fired(&mut self, now: u64) -> Directive<N> {
        match &self.state {
            SchedulerState::Settling { deadline } => {
                if now < *deadline {
                    return Directive::ArmTimer { deadline: *deadline };
                }
                self.start_scan(ScanScope::Document, false, true)
            }
            SchedulerState::Scheduled { pending, deadline } => {
                if now < *deadline {
                    return Directive::ArmTimer { deadline: *deadline };
                }
                let scope = pending.clone();
                self.start_scan(scope, false, false)
            }
            _ => Directive::Wait,
        }
    }

    /// A structural change touched `region`
    pub fn mutation<D: Dom<Node = N>>(&mut self, dom: &D, region: &N, now: u64) -> Directive<N> {
        let deadline = now + self.timing.debounce_ms;
        let state = std::mem::replace(&mut self.state, SchedulerState::Disposed);
        let (next, directive) = match state {
            SchedulerState::Idle => (
                SchedulerState::Scheduled {
                    pending: ScanScope::Subtree(region.clone()),
                    deadline,
                },
                Directive::ArmTimer { deadline },
            ),
            SchedulerState::Scheduled { pending, .. } => (
                SchedulerState::Scheduled {
                    pending: pending.widen(dom, region),
                    deadline,
                },
                Directive::ArmTimer { deadline },
            ),
            SchedulerState::Scanning { queued, forced_again } => {
                let queued = Some(match queued {
                    None => ScanScope::Subtree(region.clone()),
                    Some(q) => q.widen(dom, region),
                });
                (SchedulerState::Scanning { queued, forced_again }, Directive::Wait)
            }
            // Listener not attached yet, or gone
            other => (other, Directive::Wait),
        };
        self.state = next;
        directive
    }

    /// A label was saved or deleted: re-scan everything now, bypassing the
    /// debounce window.
    pub fn labels_changed(&mut self) -> Directive<N> {
        if let SchedulerState::Scanning { forced_again, .. } = &mut self.state {
            *forced_again = true;
            return Directive::Wait;
        }
        match self.state {
            SchedulerState::Idle | SchedulerState::Scheduled { .. } => {
                self.start_scan(ScanScope::Document, true, false)
            }
            SchedulerState::Scanning { .. } => Directive::Wait,
            // The initial scan reads the latest labels anyway
            SchedulerState::AwaitingLoad | SchedulerState::Settling { .. } | SchedulerState::Disposed => {
                Directive::Wait
            }
        }
    }

    /// The host completed the scan it was asked to run
    pub fn scan_finished(&mut self, now: u64) -> Directive<N> {
        let state = std::mem::replace(&mut self.state, SchedulerState::Idle);
        match state {
            SchedulerState::Scanning { forced_again: true, .. } => {
                self.start_scan(ScanScope::Document, true, false)
            }
            SchedulerState::Scanning { queued: Some(pending), .. } => {
                let deadline = now + self.timing.debounce_ms;
                self.state = SchedulerState::Scheduled { pending, deadline };
                Directive::ArmTimer { deadline }
            }
            SchedulerState::Scanning { queued: None, .. } => Directive::Wait,
            other => {
                self.state = other;
                Directive::Wait
            }
        }
    }

    /// Tear down. No further scans are ever requested.
    pub fn dispose(&mut self) -> Directive<N> {
        if self.is_disposed() {
            return Directive::Wait;
        }
        self.state = SchedulerState::Disposed;
        Directive::Shutdown
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeId};

    fn timing() -> SchedulerTiming {
        SchedulerTiming {
            debounce_ms: 400,
            settle_ms: 100,
        }
    }

    /// Scheduler that already ran its initial scan
    fn idle() -> ChangeScheduler<NodeId> {
        let mut s = ChangeScheduler::new(timing());
        s.document_loaded(0);
        s.timer_fired(100);
        s.scan_finished(100);
        assert_eq!(s.state_name(), "idle");
        s
    }

    fn scan_of(d: Directive<NodeId>) -> ScanRequest<NodeId> {
        match d {
            Directive::Scan(req) => req,
            other => panic!("expected scan, got {other:?}"),
        }
    }

    #[test]
    fn test_initial_scan_waits_for_load_and_settle() {
        let mut s: ChangeScheduler<NodeId> = ChangeScheduler::new(timing());
        assert_eq!(s.timer_fired(50), Directive::Wait);
        assert_eq!(s.document_loaded(1_000), Directive::ArmTimer { deadline: 1_100 });
        assert_eq!(s.timer_fired(1_050), Directive::ArmTimer { deadline: 1_100 });

        let req = scan_of(s.timer_fired(1_100));
        assert_eq!(req.scope, ScanScope::Document);
        assert!(req.initial);
        assert!(!req.clear_markers);
        assert_eq!(s.scan_finished(1_101), Directive::Wait);
        assert_eq!(s.state_name(), "idle");
    }

    #[test]
    fn test_mutations_before_initial_scan_are_ignored() {
        let doc = Document::new();
        let mut s = ChangeScheduler::new(timing());
        assert_eq!(s.mutation(&doc, &doc.root(), 0), Directive::Wait);
        assert_eq!(s.state_name(), "awaiting_load");
    }

    #[test]
    fn test_debounce_resets_deadline() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(&root, "div", &[]);
        let mut s = idle();

        assert_eq!(s.mutation(&doc, &div, 1_000), Directive::ArmTimer { deadline: 1_400 });
        assert_eq!(s.mutation(&doc, &div, 1_300), Directive::ArmTimer { deadline: 1_700 });
        // The first timer fires late relative to the reset deadline
        assert_eq!(s.timer_fired(1_400), Directive::ArmTimer { deadline: 1_700 });

        let req = scan_of(s.timer_fired(1_700));
        assert_eq!(req.scope, ScanScope::Subtree(div));
        assert!(!req.clear_markers);
    }

    #[test]
    fn test_pending_root_widens_to_common_ancestor() {
        let mut doc = Document::new();
        let root = doc.root();
        let main = doc.append_element(&root, "main", &[]);
        let left = doc.append_element(&main, "section", &[]);
        let right = doc.append_element(&main, "section", &[]);
        let aside = doc.append_element(&root, "aside", &[]);

        let mut s = idle();
        s.mutation(&doc, &left, 0);
        s.mutation(&doc, &right, 10);
        assert_eq!(
            s.state(),
            &SchedulerState::Scheduled { pending: ScanScope::Subtree(main), deadline: 410 }
        );

        s.mutation(&doc, &aside, 20);
        assert_eq!(
            s.state(),
            &SchedulerState::Scheduled { pending: ScanScope::Document, deadline: 420 }
        );
    }

    #[test]
    fn test_detached_region_falls_back_to_document() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(&root, "div", &[]);
        let b = doc.append_element(&root, "div", &[]);
        let inner = doc.append_element(&b, "p", &[]);
        doc.detach(&b);

        let mut s = idle();
        s.mutation(&doc, &a, 0);
        s.mutation(&doc, &inner, 5);
        let req = scan_of(s.timer_fired(405));
        assert_eq!(req.scope, ScanScope::Document);
    }

    #[test]
    fn test_labels_changed_bypasses_debounce() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(&root, "div", &[]);
        let mut s = idle();
        s.mutation(&doc, &div, 0);

        let req = scan_of(s.labels_changed());
        assert_eq!(req.scope, ScanScope::Document);
        assert!(req.clear_markers);
        // The narrower pending scan was absorbed
        assert_eq!(s.scan_finished(10), Directive::Wait);
        assert_eq!(s.timer_fired(400), Directive::Wait);
    }

    #[test]
    fn test_events_during_scan_replay_after_it() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(&root, "div", &[]);
        let mut s = idle();
        s.mutation(&doc, &div, 0);
        scan_of(s.timer_fired(400));

        assert_eq!(s.mutation(&doc, &div, 450), Directive::Wait);
        assert_eq!(s.scan_finished(500), Directive::ArmTimer { deadline: 900 });
        scan_of(s.timer_fired(900));

        assert_eq!(s.labels_changed(), Directive::Wait, "one scan at a time");
        let forced = scan_of(s.scan_finished(950));
        assert!(forced.clear_markers);
        assert_eq!(forced.scope, ScanScope::Document);
    }

    #[test]
    fn test_disposed_scheduler_never_scans() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(&root, "div", &[]);
        let mut s = idle();
        s.mutation(&doc, &div, 0);

        assert_eq!(s.dispose(), Directive::Shutdown);
        assert_eq!(s.dispose(), Directive::Wait);
        assert_eq!(s.timer_fired(10_000), Directive::Wait);
        assert_eq!(s.mutation(&doc, &div, 10_000), Directive::Wait);
        assert_eq!(s.labels_changed(), Directive::Wait);
        assert_eq!(s.scan_finished(10_000), Directive::Wait);
        assert!(s.is_disposed());
    }
}
