//! Annotator: rewrites matched regions with their labels
//!
//! # Links
//! Visible text becomes `name (first5...last5)`; `href` is never touched.
//! A link without a saved label is only marked processed.
//!
//! # Text
//! Matches are grouped per text node and applied from the highest start
//! offset down, so earlier offsets stay valid while the node is split into
//! `head | wrapper | tail`. Elided matches must reconcile to exactly one known
//! identifier. A node in which nothing resolves is left untouched and
//! unmarked so a later label save can still light it up.
//!
//! Every failure is per-match: a region that vanished between scan and
//! annotate is logged and skipped, the rest of the batch continues.

use serde::{Deserialize, Serialize};

use crate::dom::{
    Dom, NodeKind, ATTR_COLOR, ATTR_ID, ATTR_NAME, ATTR_ORIGINAL, ATTR_ORIGINAL_TITLE,
    ATTR_SPLIT_TAIL, ATTR_WRAPPER, MARK_PROCESSED, MARK_TEXT_PROCESSED, WRAPPER_TAG,
};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::labels::{LabelMap, LabelRecord};
use crate::scanner::{LinkMatch, ScanMatch, TextForm, TextMatch};

// =============================================================================
// Report
// =============================================================================

/// Outcome counts for one annotate call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateReport {
    /// Matches rewritten with a label
    pub annotated: usize,
    /// Full identifiers with no saved label
    pub unlabeled: usize,
    /// Elided matches with no candidate identifier
    pub unresolved: usize,
    /// Elided matches with more than one candidate
    pub ambiguous: usize,
    /// Regions that left the document before they could be rewritten
    pub detached: usize,
}

impl AnnotateReport {
    pub fn merge(&mut self, other: &AnnotateReport) {
        self.annotated += other.annotated;
        self.unlabeled += other.unlabeled;
        self.unresolved += other.unresolved;
        self.ambiguous += other.ambiguous;
        self.detached += other.detached;
    }
}

/// Result of reconciling an elided display against known identifiers
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<'a> {
    Unique(&'a str, &'a LabelRecord),
    Ambiguous(usize),
    NoCandidate,
}

/// Find the labelled identifier an elided `prefix...suffix` refers to
pub fn reconcile_elided<'a>(prefix: &str, suffix: &str, labels: &'a LabelMap) -> Reconciled<'a> {
    let mut found: Option<(&'a str, &'a LabelRecord)> = None;
    let mut count = 0;
    for (id, rec) in labels {
        let fits = Identifier::parse(id).is_some_and(|i| i.matches_elided(prefix, suffix));
        if fits {
            count += 1;
            found.get_or_insert((id.as_str(), rec));
        }
    }
    match (count, found) {
        (1, Some((id, rec))) => Reconciled::Unique(id, rec),
        (0, _) | (_, None) => Reconciled::NoCandidate,
        (n, _) => Reconciled::Ambiguous(n),
    }
}

// =============================================================================
// annotate
// =============================================================================

/// Apply labels to scan matches. Returns per-outcome counts; `annotated` is
/// the number of regions actually rewritten.
pub fn annotate<D: Dom>(dom: &mut D, matches: Vec<ScanMatch<D::Node>>, labels: &LabelMap) -> AnnotateReport {
    let mut report = AnnotateReport::default();
    let mut text_groups: Vec<(D::Node, Vec<TextMatch<D::Node>>)> = Vec::new();

    for m in matches {
        match m {
            ScanMatch::Link(link) => annotate_link(dom, link, labels, &mut report),
            ScanMatch::Text(text) => match text_groups.iter_mut().find(|(n, _)| *n == text.node) {
                Some((_, group)) => group.push(text),
                None => text_groups.push((text.node.clone(), vec![text])),
            },
        }
    }

    for (node, group) in text_groups {
        annotate_text_node(dom, &node, group, labels, &mut report);
    }

    if report.annotated > 0 || report.detached > 0 {
        log::debug!("[Annotator] {:?}", report);
    }
    report
}

fn annotate_link<D: Dom>(dom: &mut D, m: LinkMatch<D::Node>, labels: &LabelMap, report: &mut AnnotateReport) {
    if !dom.is_connected(&m.element) {
        log::debug!("[Annotator] link for {} left the document; skipped", m.identifier.elided());
        report.detached += 1;
        return;
    }
    let Some(record) = labels.get(m.identifier.as_str()) else {
        // Marked so the link is not rescanned until markers are cleared
        match dom.set_attribute(&m.element, MARK_PROCESSED, "1") {
            Ok(()) => report.unlabeled += 1,
            Err(_) => report.detached += 1,
        }
        return;
    };
    match write_link(dom, &m, record) {
        Ok(()) => report.annotated += 1,
        Err(e) => {
            log::debug!("[Annotator] link rewrite for {} failed: {}", m.identifier.elided(), e);
            report.detached += 1;
        }
    }
}

fn write_link<D: Dom>(dom: &mut D, m: &LinkMatch<D::Node>, record: &LabelRecord) -> Result<()> {
    let id = m.identifier.as_str();
    let el = &m.element;
    if !dom.has_attribute(el, ATTR_ORIGINAL) {
        dom.set_attribute(el, ATTR_ORIGINAL, &m.original_text)?;
        if let Some(title) = dom.attribute(el, "title") {
            dom.set_attribute(el, ATTR_ORIGINAL_TITLE, &title)?;
        }
    }
    dom.set_text_content(el, &record.display_text(id))?;
    apply_label_attributes(dom, el, id, record)?;
    dom.set_attribute(el, MARK_PROCESSED, "1")
}

fn apply_label_attributes<D: Dom>(dom: &mut D, el: &D::Node, id: &str, record: &LabelRecord) -> Result<()> {
    dom.set_attribute(el, ATTR_ID, id)?;
    dom.set_attribute(el, ATTR_NAME, &record.name)?;
    match &record.color {
        Some(color) => dom.set_attribute(el, ATTR_COLOR, color)?,
        None => dom.remove_attribute(el, ATTR_COLOR)?,
    }
    dom.set_attribute(el, "title", &record.summary(id))
}

fn annotate_text_node<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    mut group: Vec<TextMatch<D::Node>>,
    labels: &LabelMap,
    report: &mut AnnotateReport,
) {
    group.sort_by(|a, b| b.start.cmp(&a.start));

    let mut resolved: Vec<(TextMatch<D::Node>, &str, &LabelRecord)> = Vec::new();
    for m in group {
        let outcome = match &m.form {
            TextForm::Full(id) => match labels.get_key_value(id.as_str()) {
                Some((key, rec)) => Some((key.as_str(), rec)),
                None => {
                    report.unlabeled += 1;
                    None
                }
            },
            TextForm::Elided { prefix, suffix } => match reconcile_elided(prefix, suffix, labels) {
                Reconciled::Unique(key, rec) => Some((key, rec)),
                Reconciled::Ambiguous(n) => {
                    log::debug!("[Annotator] {}...{} matches {} labels; skipped", prefix, suffix, n);
                    report.ambiguous += 1;
                    None
                }
                Reconciled::NoCandidate => {
                    report.unresolved += 1;
                    None
                }
            },
        };
        if let Some((key, rec)) = outcome {
            resolved.push((m, key, rec));
        }
    }
    if resolved.is_empty() {
        return;
    }

    // The node must still hold exactly what was scanned
    let current = dom.text(node);
    let intact = dom.is_connected(node)
        && current.as_deref().is_some_and(|data| {
            resolved
                .iter()
                .all(|(m, _, _)| data.get(m.start..m.end) == Some(m.original_text.as_str()))
        });
    if !intact {
        log::debug!("[Annotator] text node changed since scan; {} matches skipped", resolved.len());
        report.detached += resolved.len();
        return;
    }

    let container = resolved[0].0.container.clone();
    let mut applied = 0;
    for (m, id, record) in &resolved {
        match split_and_wrap(dom, node, m, id, record) {
            Ok(()) => applied += 1,
            Err(e) => {
                log::debug!("[Annotator] wrap failed: {}", e);
                report.detached += 1;
            }
        }
    }
    if applied > 0 {
        report.annotated += applied;
        if let Err(e) = dom.set_attribute(&container, MARK_TEXT_PROCESSED, "1") {
            log::debug!("[Annotator] could not mark container: {}", e);
        }
    }
}

/// `node` keeps the head, a wrapper and the tail are inserted after it
fn split_and_wrap<D: Dom>(
    dom: &mut D,
    node: &D::Node,
    m: &TextMatch<D::Node>,
    id: &str,
    record: &LabelRecord,
) -> Result<()> {
    let data = dom.text(node).ok_or(Error::Detached)?;
    let head = data.get(..m.start).ok_or(Error::Detached)?.to_string();
    let tail = data.get(m.end..).ok_or(Error::Detached)?.to_string();

    let wrapper = dom.create_element(WRAPPER_TAG)?;
    dom.set_attribute(&wrapper, ATTR_WRAPPER, "1")?;
    dom.set_attribute(&wrapper, ATTR_ORIGINAL, &m.original_text)?;
    apply_label_attributes(dom, &wrapper, id, record)?;
    dom.set_attribute(&wrapper, MARK_PROCESSED, "1")?;
    dom.set_text_content(&wrapper, &record.display_text(id))?;

    if !tail.is_empty() {
        dom.set_attribute(&wrapper, ATTR_SPLIT_TAIL, "1")?;
        let tail_node = dom.create_text(&tail);
        dom.insert_after(node, &tail_node)?;
    }
    dom.insert_after(node, &wrapper)?;
    dom.set_text(node, &head)
}

// =============================================================================
// reset
// =============================================================================

/// Undo annotations and clear every processed marker under `root`.
///
/// Links get their original text (and title) back. A text wrapper is folded
/// back into the head node it was split from, together with the tail node
/// the split created; other text nodes are left as they are.
/// Returns the number of regions restored.
pub fn reset_annotations<D: Dom>(dom: &mut D, root: &D::Node) -> usize {
    let mut restored = 0;

    for node in dom.descendants(root) {
        if dom.kind(&node) != NodeKind::Element {
            continue;
        }
        if dom.has_attribute(&node, ATTR_WRAPPER) {
            match restore_wrapper(dom, &node) {
                Ok(()) => restored += 1,
                Err(e) => log::debug!("[Annotator] wrapper restore failed: {}", e),
            }
            continue;
        }
        if let Some(original) = dom.attribute(&node, ATTR_ORIGINAL) {
            if restore_link(dom, &node, &original).is_ok() {
                restored += 1;
            }
        }
        let _ = dom.remove_attribute(&node, MARK_PROCESSED);
        let _ = dom.remove_attribute(&node, MARK_TEXT_PROCESSED);
    }

    if restored > 0 {
        log::debug!("[Annotator] restored {} annotated regions", restored);
    }
    restored
}

fn restore_link<D: Dom>(dom: &mut D, el: &D::Node, original: &str) -> Result<()> {
    dom.set_text_content(el, original)?;
    match dom.attribute(el, ATTR_ORIGINAL_TITLE) {
        Some(title) => dom.set_attribute(el, "title", &title)?,
        None => dom.remove_attribute(el, "title")?,
    }
    for attr in [ATTR_ORIGINAL, ATTR_ORIGINAL_TITLE, ATTR_ID, ATTR_NAME, ATTR_COLOR] {
        dom.remove_attribute(el, attr)?;
    }
    Ok(())
}

/// Inverse of `split_and_wrap`: head keeps `head + original + tail`
fn restore_wrapper<D: Dom>(dom: &mut D, wrapper: &D::Node) -> Result<()> {
    let mut data = dom.attribute(wrapper, ATTR_ORIGINAL).unwrap_or_default();
    let tail = if dom.has_attribute(wrapper, ATTR_SPLIT_TAIL) {
        dom.next_sibling(wrapper)
            .and_then(|n| dom.text(&n).map(|tail_data| (n, tail_data)))
    } else {
        None
    };
    if let Some((_, tail_data)) = &tail {
        data.push_str(tail_data);
    }

    match dom.previous_sibling(wrapper).and_then(|n| dom.text(&n).map(|head_data| (n, head_data))) {
        Some((head, head_data)) => {
            dom.set_text(&head, &format!("{head_data}{data}"))?;
            dom.remove(wrapper)?;
        }
        // Head was moved or replaced by the host
        None => {
            let text = dom.create_text(&data);
            dom.replace_node(wrapper, &text)?;
        }
    }
    if let Some((tail, _)) = tail {
        dom.remove(&tail)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::labels::LabelInput;
    use crate::scanner::{LinkScanner, TextScanner};

    const ID_A: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const ID_B: &str = "So11111111111111111111111111111111111111112";
    // Shares the 9WzDX...tAWWM boundary with ID_A
    const ID_A_TWIN: &str = "9WzDXzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzztAWWM";

    fn labels(entries: &[(&str, &str, &[&str])]) -> LabelMap {
        entries
            .iter()
            .map(|(id, name, tags)| {
                let rec = LabelInput::new(*name)
                    .with_tags(tags.iter().copied())
                    .into_record(0, 0)
                    .unwrap();
                (id.to_string(), rec)
            })
            .collect()
    }

    fn scan_all(doc: &Document) -> Vec<ScanMatch<crate::dom::NodeId>> {
        let root = doc.root();
        let mut out: Vec<ScanMatch<_>> = LinkScanner::default()
            .scan(doc, &root)
            .into_iter()
            .map(Into::into)
            .collect();
        out.extend(TextScanner::default().scan(doc, &root).into_iter().map(Into::into));
        out
    }

    #[test]
    fn test_link_gets_label_and_keeps_href() {
        let mut doc = Document::new();
        let root = doc.root();
        let href = format!("https://solscan.io/account/{ID_A}");
        let a = doc.append_link(&root, &href, ID_A);
        let map = labels(&[(ID_A, "Treasury", &["ops"])]);

        let matches = scan_all(&doc);
        let report = annotate(&mut doc, matches, &map);
        assert_eq!(report.annotated, 1);
        assert_eq!(doc.text_content(&a), "Treasury (9WzDX...tAWWM)");
        assert_eq!(doc.attribute(&a, "href"), Some(href));
        assert_eq!(doc.attribute(&a, MARK_PROCESSED).as_deref(), Some("1"));
        assert_eq!(doc.attribute(&a, ATTR_ID).as_deref(), Some(ID_A));
        assert_eq!(doc.attribute(&a, ATTR_NAME).as_deref(), Some("Treasury"));
        assert_eq!(doc.attribute(&a, "title"), Some(format!("Treasury\nTags: ops\n{ID_A}")));
    }

    #[test]
    fn test_unlabeled_link_marked_but_unchanged() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_link(&root, &format!("/account/{ID_A}"), "view");
        let matches = scan_all(&doc);
        let report = annotate(&mut doc, matches, &LabelMap::new());
        assert_eq!(report.annotated, 0);
        assert_eq!(report.unlabeled, 1);
        assert_eq!(doc.text_content(&a), "view");
        assert!(doc.has_attribute(&a, MARK_PROCESSED));
    }

    #[test]
    fn test_color_attribute_only_when_present() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_link(&root, &format!("/account/{ID_A}"), "x");
        let mut map = labels(&[(ID_A, "T", &[])]);
        map.get_mut(ID_A).unwrap().color = Some("ff8800".into());
        let matches = scan_all(&doc);
        annotate(&mut doc, matches, &map);
        assert_eq!(doc.attribute(&a, ATTR_COLOR).as_deref(), Some("ff8800"));
    }

    #[test]
    fn test_text_split_preserves_surrounding_text() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        doc.append_text(&p, &format!("from {ID_A} to {ID_B}!"));
        let map = labels(&[(ID_A, "Treasury", &[]), (ID_B, "wSOL", &[])]);

        let matches = scan_all(&doc);
        let report = annotate(&mut doc, matches, &map);
        assert_eq!(report.annotated, 2);
        assert_eq!(doc.text_content(&p), "from Treasury (9WzDX...tAWWM) to wSOL (So111...11112)!");
        assert!(doc.has_attribute(&p, MARK_TEXT_PROCESSED));
        let wrappers: Vec<_> = doc
            .descendants(&p)
            .into_iter()
            .filter(|n| doc.has_attribute(n, ATTR_WRAPPER))
            .collect();
        assert_eq!(wrappers.len(), 2);
        assert_eq!(doc.attribute(&wrappers[0], ATTR_ORIGINAL).as_deref(), Some(ID_A));
        assert_eq!(doc.attribute(&wrappers[1], ATTR_ID).as_deref(), Some(ID_B));
    }

    #[test]
    fn test_unresolved_text_node_left_untouched() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        doc.append_text(&p, &format!("{ID_A} {ID_B}"));
        let before = doc.to_html(&p);

        let matches = scan_all(&doc);
        let report = annotate(&mut doc, matches, &LabelMap::new());
        assert_eq!(report.annotated, 0);
        assert_eq!(report.unlabeled, 2);
        assert_eq!(doc.to_html(&p), before);
        assert!(!doc.has_attribute(&p, MARK_TEXT_PROCESSED));
    }

    #[test]
    fn test_elided_resolves_only_when_unique() {
        assert_eq!(ID_A_TWIN.len(), 44);
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        doc.append_text(&p, "Signer 9WzDX...tAWWM");

        let unique = labels(&[(ID_A, "Treasury", &[]), (ID_B, "wSOL", &[])]);
        let mut resolved_doc = doc.clone();
        let matches = scan_all(&resolved_doc);
        let report = annotate(&mut resolved_doc, matches, &unique);
        assert_eq!(report.annotated, 1);
        assert_eq!(resolved_doc.text_content(&p), "Signer Treasury (9WzDX...tAWWM)");

        let twins = labels(&[(ID_A, "Treasury", &[]), (ID_A_TWIN, "Twin", &[])]);
        let before = doc.to_html(&p);
        let matches = scan_all(&doc);
        let report = annotate(&mut doc, matches, &twins);
        assert_eq!(report.ambiguous, 1);
        assert_eq!(report.annotated, 0);
        assert_eq!(doc.to_html(&p), before);
    }

    #[test]
    fn test_detached_regions_are_skipped_not_fatal() {
        let mut doc = Document::new();
        let root = doc.root();
        let gone = doc.append_link(&root, &format!("/account/{ID_A}"), "gone");
        let kept = doc.append_link(&root, &format!("/account/{ID_B}"), "kept");
        let matches = scan_all(&doc);
        doc.detach(&gone);

        let map = labels(&[(ID_A, "A", &[]), (ID_B, "B", &[])]);
        let report = annotate(&mut doc, matches, &map);
        assert_eq!(report.detached, 1);
        assert_eq!(report.annotated, 1);
        assert_eq!(doc.text_content(&kept), "B (So111...11112)");
    }

    #[test]
    fn test_text_changed_since_scan_is_skipped() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        let t = doc.append_text(&p, &format!("x {ID_A}"));
        let matches = scan_all(&doc);
        doc.set_text(&t, "rewritten by host").unwrap();

        let report = annotate(&mut doc, matches, &labels(&[(ID_A, "A", &[])]));
        assert_eq!(report.detached, 1);
        assert_eq!(doc.text_content(&p), "rewritten by host");
    }

    #[test]
    fn test_reset_restores_links_and_text() {
        let mut doc = Document::new();
        let root = doc.root();
        let href = format!("/account/{ID_A}");
        let a = doc.append_element(&root, "a", &[("href", href.as_str()), ("title", "host")]);
        doc.append_text(&a, "original");
        let p = doc.append_element(&root, "p", &[]);
        doc.append_text(&p, &format!("pre {ID_B} post"));
        let pristine = doc.to_html(&root);

        let map = labels(&[(ID_A, "A", &[]), (ID_B, "B", &[])]);
        let matches = scan_all(&doc);
        assert_eq!(annotate(&mut doc, matches, &map).annotated, 2);
        assert_ne!(doc.to_html(&root), pristine);

        assert_eq!(reset_annotations(&mut doc, &root), 2);
        assert_eq!(doc.to_html(&root), pristine);
        assert_eq!(doc.children(&p).len(), 1, "text re-joined");
    }

    #[test]
    fn test_reset_keeps_host_text_nodes_apart() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        let owner_label = doc.append_text(&p, "Owner: ");
        let owner_value = doc.append_text(&p, ID_A);

        let matches = scan_all(&doc);
        assert_eq!(annotate(&mut doc, matches, &labels(&[(ID_A, "T", &[])])).annotated, 1);
        assert_eq!(reset_annotations(&mut doc, &root), 1);

        assert_eq!(doc.children(&p), vec![owner_label, owner_value]);
        assert!(doc.is_connected(&owner_value));
        assert_eq!(doc.text(&owner_label).as_deref(), Some("Owner: "));
        assert_eq!(doc.text(&owner_value).as_deref(), Some(ID_A));
    }

    #[test]
    fn test_reset_folds_several_wrappers_into_original_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        let text = doc.append_text(&p, &format!("{ID_A}, then {ID_B}!"));
        let trailer = doc.append_text(&p, " (host)");

        let map = labels(&[(ID_A, "A", &[]), (ID_B, "B", &[])]);
        let matches = scan_all(&doc);
        assert_eq!(annotate(&mut doc, matches, &map).annotated, 2);
        assert_eq!(reset_annotations(&mut doc, &root), 2);

        assert_eq!(doc.children(&p), vec![text, trailer]);
        assert_eq!(doc.text(&text), Some(format!("{ID_A}, then {ID_B}!")));
        assert_eq!(doc.text(&trailer).as_deref(), Some(" (host)"));
    }

    #[test]
    fn test_reconcile_requires_both_edges() {
        let map = labels(&[(ID_A, "A", &[]), (ID_B, "B", &[])]);
        assert!(matches!(reconcile_elided("9WzDX", "tAWWM", &map), Reconciled::Unique(id, _) if id == ID_A));
        assert_eq!(reconcile_elided("9WzDX", "zzzzz", &map), Reconciled::NoCandidate);
        assert!(matches!(reconcile_elided("So111", "11112", &map), Reconciled::Unique(id, _) if id == ID_B));
    }
}
