//! Conductor: the scan → resolve → annotate loop
//!
//! # Design
//! 1. The scheduler decides *when* and *what*; the conductor only executes
//!    the `ScanRequest`s it hands out and reports back.
//! 2. One pass = link scan, text scan, one label snapshot, one annotate call.
//! 3. A failed label load never aborts the loop: the last good snapshot is
//!    reused and storage is retried on the next pass.
//!
//! # Usage
//! ```rust,ignore
//! let conductor = Conductor::new(store, EngineConfig::default())?;
//! if let Directive::Scan(req) = conductor.labels_changed() {
//!     let report = conductor.execute(&mut dom, &req).await;
//!     conductor.scan_finished(now);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::annotator::{annotate, reset_annotations, AnnotateReport};
use crate::config::EngineConfig;
use crate::dom::Dom;
use crate::error::Result;
use crate::labels::{ImportMode, KeyValueStore, LabelInput, LabelMap, LabelRecord, LabelStore};
use crate::scanner::{LinkScanner, MatchKind, ScanMatch, TextScanner};
use crate::scheduler::{ChangeScheduler, Directive, ScanRequest, ScanScope};

// =============================================================================
// PassReport
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassScope {
    #[default]
    Document,
    Subtree,
}

/// Timings in microseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassTimings {
    pub labels_us: u64,
    pub scan_us: u64,
    pub annotate_us: u64,
    pub total_us: u64,
}

/// Summary of one executed pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub scope: PassScope,
    pub link_matches: usize,
    pub text_matches: usize,
    /// Regions restored before a forced re-scan
    pub restored: usize,
    pub annotate: AnnotateReport,
    /// Labels came from the last good snapshot after a failed load
    pub stale_labels: bool,
    /// No labels could be loaded at all; nothing was scanned
    pub skipped: bool,
    pub timings: PassTimings,
}

// =============================================================================
// Conductor
// =============================================================================

pub struct Conductor<S: KeyValueStore, N> {
    store: Rc<LabelStore<S>>,
    config: EngineConfig,
    link_scanner: LinkScanner,
    text_scanner: TextScanner,
    scheduler: RefCell<ChangeScheduler<N>>,
    last_good: RefCell<Option<LabelMap>>,
}

impl<S: KeyValueStore, N: Clone + PartialEq> Conductor<S, N> {
    pub fn new(store: Rc<LabelStore<S>>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let denylist = config.parsed_denylist()?;
        Ok(Self {
            link_scanner: LinkScanner::new(denylist.clone()),
            text_scanner: TextScanner::new(denylist),
            scheduler: RefCell::new(ChangeScheduler::new(config.timing())),
            last_good: RefCell::new(None),
            store,
            config,
        })
    }

    pub fn store(&self) -> &Rc<LabelStore<S>> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_enabled_for(&self, host: &str) -> bool {
        self.config.is_enabled_for(host)
    }

    pub fn state_name(&self) -> &'static str {
        self.scheduler.borrow().state_name()
    }

    pub fn is_disposed(&self) -> bool {
        self.scheduler.borrow().is_disposed()
    }

    // -------------------------------------------------------------------------
    // Scheduler events
    // -------------------------------------------------------------------------

    pub fn document_loaded(&self, now: u64) -> Directive<N> {
        self.scheduler.borrow_mut().document_loaded(now)
    }

    pub fn timer_fired(&self, now: u64) -> Directive<N> {
        self.scheduler.borrow_mut().timer_fired(now)
    }

    pub fn mutation<D: Dom<Node = N>>(&self, dom: &D, region: &N, now: u64) -> Directive<N> {
        self.scheduler.borrow_mut().mutation(dom, region, now)
    }

    pub fn labels_changed(&self) -> Directive<N> {
        self.scheduler.borrow_mut().labels_changed()
    }

    pub fn scan_finished(&self, now: u64) -> Directive<N> {
        self.scheduler.borrow_mut().scan_finished(now)
    }

    pub fn dispose(&self) -> Directive<N> {
        self.scheduler.borrow_mut().dispose()
    }

    // -------------------------------------------------------------------------
    // Label writes (each forces a re-scan)
    // -------------------------------------------------------------------------

    pub async fn save_label(&self, id: &str, input: LabelInput) -> Result<(LabelRecord, Directive<N>)> {
        let record = self.store.save(id, input).await?;
        Ok((record, self.labels_changed()))
    }

    pub async fn delete_label(&self, id: &str) -> Result<(bool, Directive<N>)> {
        let existed = self.store.delete(id).await?;
        let directive = if existed { self.labels_changed() } else { Directive::Wait };
        Ok((existed, directive))
    }

    pub async fn import_labels(&self, json: &str, mode: ImportMode) -> Result<(usize, Directive<N>)> {
        let count = self.store.import(json, mode).await?;
        Ok((count, self.labels_changed()))
    }

    pub async fn clear_labels(&self) -> Result<Directive<N>> {
        self.store.clear().await?;
        Ok(self.labels_changed())
    }

    // -------------------------------------------------------------------------
    // Passes
    // -------------------------------------------------------------------------

    /// Current labels, falling back to the last good snapshot when storage
    /// fails. `None` only if no load has ever succeeded.
    pub async fn labels_snapshot(&self) -> Option<(LabelMap, bool)> {
        match self.store.get_all().await {
            Ok(map) => {
                *self.last_good.borrow_mut() = Some(map.clone());
                Some((map, false))
            }
            Err(e) => {
                log::warn!("[Conductor] label load failed, using last snapshot: {}", e);
                self.last_good.borrow().clone().map(|map| (map, true))
            }
        }
    }

    /// Execute a scheduler request against `dom`
    pub async fn execute<D: Dom<Node = N>>(&self, dom: &mut D, request: &ScanRequest<N>) -> PassReport {
        let start = instant::Instant::now();
        let mut report = PassReport::default();
        if self.is_disposed() {
            report.skipped = true;
            return report;
        }

        let labels_start = instant::Instant::now();
        let snapshot = self.labels_snapshot().await;
        report.timings.labels_us = labels_start.elapsed().as_micros() as u64;
        let Some((labels, stale)) = snapshot else {
            log::warn!("[Conductor] no labels available; pass skipped");
            report.skipped = true;
            return report;
        };
        // Disposed while waiting on storage
        if self.is_disposed() {
            report.skipped = true;
            return report;
        }
        report.stale_labels = stale;

        let root = match &request.scope {
            ScanScope::Subtree(node) if dom.is_connected(node) => {
                report.scope = PassScope::Subtree;
                node.clone()
            }
            _ => dom.root(),
        };
        if request.clear_markers {
            report.restored = reset_annotations(dom, &root);
        }

        let pass = self.run_pass(dom, &root, &labels);
        report.link_matches = pass.link_matches;
        report.text_matches = pass.text_matches;
        report.annotate = pass.annotate;
        report.timings.scan_us = pass.timings.scan_us;
        report.timings.annotate_us = pass.timings.annotate_us;
        report.timings.total_us = start.elapsed().as_micros() as u64;

        log::info!(
            "[Conductor] pass ({:?}{}): {} links, {} text, {} annotated in {}us",
            report.scope,
            if request.clear_markers { ", forced" } else { "" },
            report.link_matches,
            report.text_matches,
            report.annotate.annotated,
            report.timings.total_us
        );
        report
    }

    /// One synchronous scan + annotate over `root` with the given labels
    pub fn run_pass<D: Dom<Node = N>>(&self, dom: &mut D, root: &N, labels: &LabelMap) -> PassReport {
        let mut report = PassReport::default();

        let scan_start = instant::Instant::now();
        let links = self.link_scanner.scan(dom, root);
        let texts = self.text_scanner.scan(dom, root);
        report.timings.scan_us = scan_start.elapsed().as_micros() as u64;

        let mut matches: Vec<ScanMatch<N>> = Vec::with_capacity(links.len() + texts.len());
        matches.extend(links.into_iter().map(ScanMatch::from));
        matches.extend(texts.into_iter().map(ScanMatch::from));
        report.link_matches = matches.iter().filter(|m| m.kind() == MatchKind::Link).count();
        report.text_matches = matches.len() - report.link_matches;

        let annotate_start = instant::Instant::now();
        report.annotate = annotate(dom, matches, labels);
        report.timings.annotate_us = annotate_start.elapsed().as_micros() as u64;
        report.timings.total_us = scan_start.elapsed().as_micros() as u64;
        report
    }

    /// Forced full re-scan outside the scheduler: restore, then annotate
    /// with current labels
    pub async fn rescan_all<D: Dom<Node = N>>(&self, dom: &mut D) -> PassReport {
        let request = ScanRequest {
            scope: ScanScope::Document,
            clear_markers: true,
            initial: false,
        };
        self.execute(dom, &request).await
    }
}
