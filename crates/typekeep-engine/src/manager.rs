// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine manager — drives every matched run through redaction, rendering and
// fidelity checking, and records one audit entry per invocation.
//
// Per run:
//
//   Located → Redacted → RenderedA → Faithful
//                                  → Drifted → RenderedB → Faithful (recovered)
//                                                        → Unrecoverable
//
// plus Rejected for runs that fail before anything is drawn, including runs
// whose font resource is missing and, in strict mode, runs whose font would
// be substituted. The input is
// snapshotted before the first run and the snapshot is released only after
// the audit entry has been written.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, info_span, instrument, warn};

use typekeep_audit::{
    AuditLog, BackupGuard, BackupManager, hash_bytes, is_retained, same_fingerprint,
};
use typekeep_core::human_errors::humanize_error;
use typekeep_core::{
    AuditEntry, BackendAttempt, BackendKind, Cardinality, EditOutcome, EditRequest, EngineConfig,
    EnginePreference, FidelityVerdict, FontMatchQuality, FontReport, OperationId, OperationKind,
    OperationStatus, Overrides, Result, Selector, TextRun, TypekeepError,
};
use typekeep_document::{
    DirectBackend, LocatedRun, Locator, PdfDocument, PreservingBackend, Redactor, RenderResult,
    font_report, run_quality,
};

use crate::cancel::CancelToken;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What one invocation did. Wraps the audit entry that was recorded for it.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct EditReport {
    entry: AuditEntry,
}

impl EditReport {
    pub fn entry(&self) -> &AuditEntry {
        &self.entry
    }

    pub fn operation_id(&self) -> OperationId {
        self.entry.operation_id
    }

    pub fn outcomes(&self) -> &[EditOutcome] {
        &self.entry.outcomes
    }

    pub fn status(&self) -> OperationStatus {
        self.entry.status
    }

    /// Where the input snapshot was kept, if it was.
    pub fn backup_location(&self) -> Option<&str> {
        self.entry.backup_location.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The text-edit engine.
///
/// One manager can serve many documents; the audit log sits behind a mutex
/// so the manager is `Send + Sync`. Runs within one document are processed
/// sequentially.
pub struct EngineManager {
    config: EngineConfig,
    audit: Mutex<AuditLog>,
    backups: BackupManager,
    locator: Locator,
    redactor: Redactor,
    direct: DirectBackend,
    preserving: PreservingBackend,
}

impl EngineManager {
    pub fn new(config: EngineConfig, audit: AuditLog) -> Self {
        Self {
            audit: Mutex::new(audit),
            backups: BackupManager::new(&config.backup_dir),
            locator: Locator::new(&config),
            redactor: Redactor::new(&config),
            direct: DirectBackend::new(&config),
            preserving: PreservingBackend::new(&config),
            config,
        }
    }

    /// Open the audit database named by `config`, creating its directory.
    pub fn open(config: EngineConfig) -> Result<Self> {
        if let Some(parent) = config.audit_db.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let audit = AuditLog::open(&config.audit_db)?;
        info!(audit = %config.audit_db.display(), backups = %config.backup_dir.display(), "engine ready");
        Ok(Self::new(config, audit))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Exclusive access to the audit log.
    pub fn audit_log(&self) -> Result<MutexGuard<'_, AuditLog>> {
        self.audit
            .lock()
            .map_err(|_| TypekeepError::Database("audit log lock poisoned".into()))
    }

    /// Every text run in `doc`.
    pub fn text_runs(&self, doc: &PdfDocument) -> Result<Vec<TextRun>> {
        Ok(self
            .locator
            .extract_runs(doc)?
            .into_iter()
            .map(|located| located.run)
            .collect())
    }

    /// Fonts `doc` draws text with, graded by how faithfully each can be
    /// redrawn.
    pub fn font_report(&self, doc: &PdfDocument) -> Result<FontReport> {
        font_report(&self.locator, doc)
    }

    /// Apply `request` to `doc`.
    ///
    /// Request-level failures (invalid request, no matching run, backup or
    /// audit failure) are returned as errors and leave `doc` unchanged.
    /// Per-run failures are reported in the outcomes and do not stop the
    /// remaining runs.
    pub fn run(&self, doc: &mut PdfDocument, request: &EditRequest) -> Result<EditReport> {
        self.run_with_cancel(doc, request, &CancelToken::new())
    }

    /// [`EngineManager::run`], checking `cancel` before each run.
    pub fn run_with_cancel(
        &self,
        doc: &mut PdfDocument,
        request: &EditRequest,
        cancel: &CancelToken,
    ) -> Result<EditReport> {
        self.execute(doc, request, OperationKind::EditText, Vec::new(), cancel)
    }

    /// Re-run the request recorded in `entry` against `doc`.
    pub fn replay(&self, entry: &AuditEntry, doc: &mut PdfDocument) -> Result<EditReport> {
        let request = entry.request()?;
        let mut notes = vec![format!("replay of operation {}", entry.operation_id)];
        if !same_fingerprint(&hash_bytes(&doc.to_bytes()?), &entry.input_id) {
            notes.push("document differs from the one originally edited".into());
        }
        self.execute(doc, &request, OperationKind::Replay, notes, &CancelToken::new())
    }

    /// Load the input snapshot recorded in `entry`, checking it against the
    /// entry's input fingerprint.
    pub fn restore(&self, entry: &AuditEntry) -> Result<PdfDocument> {
        let location = entry.backup_location.as_deref().ok_or_else(|| {
            TypekeepError::Backup(format!(
                "operation {} kept no snapshot",
                entry.operation_id
            ))
        })?;
        let bytes = self.backups.restore(location, Some(&entry.input_id))?;
        PdfDocument::from_bytes(&bytes)
    }

    // -- Invocation -----------------------------------------------------------

    fn execute(
        &self,
        doc: &mut PdfDocument,
        request: &EditRequest,
        kind: OperationKind,
        notes: Vec<String>,
        cancel: &CancelToken,
    ) -> Result<EditReport> {
        let operation_id = OperationId::new();
        let span = info_span!("edit", operation = %operation_id, kind = kind.as_str());
        let _enter = span.enter();

        let input = doc.to_bytes()?;
        let mut entry = AuditEntry {
            operation_id,
            operation_kind: kind,
            timestamp: Utc::now(),
            status: OperationStatus::Failed,
            input_id: hash_bytes(&input),
            output_id: None,
            input_path: doc.source_path().map(str::to_owned),
            parameters: serde_json::to_value(request)?,
            outcomes: Vec::new(),
            backup_location: None,
            notes,
            error: None,
        };
        info!(input = %entry.input_id, selector = %request.selector, engine = ?request.engine, "edit started");

        if let Err(err) = request.validate() {
            self.record_failure(&mut entry, &err)?;
            return Err(err);
        }

        let backup = match self.backups.snapshot(&operation_id, &input) {
            Ok(backup) => backup,
            Err(err) => {
                self.record_failure(&mut entry, &err)?;
                return Err(err);
            }
        };
        let original = doc.clone();

        let targets = match self.targets(doc, request) {
            Ok(targets) => targets,
            Err(err) => {
                entry.backup_location = self.retained_location(&backup, false);
                self.record_failure(&mut entry, &err)?;
                self.release(backup, false);
                return Err(err);
            }
        };

        let mut cancelled = false;
        for located in &targets {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let outcome = self.process_run(doc, located, request, &mut entry.notes);
            entry.outcomes.push(outcome);
        }
        if cancelled {
            warn!(done = entry.outcomes.len(), total = targets.len(), "edit cancelled");
            entry.notes.push(format!(
                "cancelled after {} of {} runs",
                entry.outcomes.len(),
                targets.len()
            ));
        }

        let applied = entry.outcomes.iter().filter(|o| o.applied).count();
        let changed = applied > 0;
        entry.status = status_of(&entry.outcomes, cancelled);

        let output_id = match doc.to_bytes() {
            Ok(output) => hash_bytes(&output),
            Err(err) => {
                *doc = original;
                return Err(err);
            }
        };
        for outcome in &mut entry.outcomes {
            outcome.document_id = output_id.clone();
        }
        entry.output_id = Some(output_id);
        entry.backup_location = self.retained_location(&backup, changed);

        if let Err(err) = self.append(&entry) {
            warn!(error = %err, "audit entry not recorded; restoring input");
            *doc = original;
            return Err(err);
        }
        self.release(backup, changed);

        info!(
            status = entry.status.as_str(),
            runs = entry.outcomes.len(),
            applied,
            "edit finished"
        );
        Ok(EditReport { entry })
    }

    /// The runs `request` applies to, in document order.
    ///
    /// Runs that already carry the replacement at every occurrence of the
    /// search text are skipped, so repeating a request does not compound.
    fn targets(&self, doc: &PdfDocument, request: &EditRequest) -> Result<Vec<LocatedRun>> {
        let widened = match &request.selector {
            Selector::Content { page, text, .. } => Selector::Content {
                page: *page,
                text: text.clone(),
                cardinality: Cardinality::All,
            },
            by_id => by_id.clone(),
        };
        let mut runs = self.locator.locate(doc, &widened, true)?;

        if let Selector::Content { text, .. } = &request.selector {
            let found = runs.len();
            runs.retain(|located| !already_applied(&located.run.content, text, &request.replacement));
            if runs.len() < found {
                debug!(skipped = found - runs.len(), "runs already carry the replacement");
            }
        }
        if request.selector.cardinality() == Cardinality::First {
            runs.truncate(1);
        }
        if runs.is_empty() && !request.allow_empty {
            return Err(TypekeepError::NotFound {
                selector: request.selector.to_string(),
            });
        }
        Ok(runs)
    }

    // -- Per-run state machine ------------------------------------------------

    #[instrument(skip_all, fields(run = %located.run.id, page = located.run.page))]
    fn process_run(
        &self,
        doc: &mut PdfDocument,
        located: &LocatedRun,
        request: &EditRequest,
        notes: &mut Vec<String>,
    ) -> EditOutcome {
        let mut outcome = EditOutcome {
            run_id: located.run.id.clone(),
            page: located.run.page,
            before: located.run.clone(),
            after: None,
            backend: None,
            font: None,
            verdict: None,
            attempts: Vec::new(),
            applied: false,
            error: None,
            document_id: String::new(),
        };
        let pristine = doc.clone();

        match self.drive(doc, located, request, &mut outcome) {
            Ok(None) => debug!(verdict = ?outcome.verdict, "run committed"),
            Ok(Some(err)) => {
                warn!(error = %err, "run committed with a substituted font");
                notes.push(humanize_error(&err).as_note());
                outcome.error = Some(err.to_failure());
            }
            Err(err) => {
                warn!(error = %err, "run rejected; reverting");
                *doc = pristine;
                outcome.applied = false;
                outcome.after = None;
                outcome.backend = None;
                outcome.font = None;
                notes.push(humanize_error(&err).as_note());
                outcome.error = Some(err.to_failure());
            }
        }
        outcome
    }

    /// Redact and render one run. `Ok(Some(_))` is a committed render that
    /// still carries a failure worth recording.
    fn drive(
        &self,
        doc: &mut PdfDocument,
        located: &LocatedRun,
        request: &EditRequest,
        outcome: &mut EditOutcome,
    ) -> Result<Option<TypekeepError>> {
        let current = self.relocate(doc, located)?;
        check_font(&current, request.strict)?;
        let text = new_content(&current.run.content, &request.selector, &request.replacement);
        let expected = request
            .overrides
            .font_name
            .clone()
            .unwrap_or_else(|| current.run.font_name.clone());

        self.redactor.redact(doc, &current)?;
        debug!(state = "redacted", new_text = %text);

        let attempt = Attempt {
            located: &current,
            text: &text,
            expected: &expected,
            overrides: &request.overrides,
        };
        match request.engine {
            EnginePreference::Auto => self.auto(doc, &attempt, outcome),
            EnginePreference::ForceDirect => self.forced(BackendKind::Direct, doc, &attempt, outcome),
            EnginePreference::ForcePreserving => {
                self.forced(BackendKind::Preserving, doc, &attempt, outcome)
            }
        }
    }

    /// Direct render first; on drift (or a direct render that cannot draw
    /// the text at all) start again from the redacted page with the
    /// preserving render.
    fn auto(
        &self,
        doc: &mut PdfDocument,
        attempt: &Attempt<'_>,
        outcome: &mut EditOutcome,
    ) -> Result<Option<TypekeepError>> {
        let redacted = doc.clone();
        let direct = self.render(BackendKind::Direct, doc, attempt);
        outcome.attempts.push(attempt.record(BackendKind::Direct, &direct));

        let direct_observed = match direct {
            Ok(result) if result.verify(attempt.expected).is_faithful() => {
                debug!(state = "faithful", backend = "direct");
                commit(outcome, result, FidelityVerdict::Faithful);
                return Ok(None);
            }
            Ok(result) => {
                warn!(expected = attempt.expected, observed = %result.observed_font, "direct render drifted");
                Some(result.observed_font)
            }
            Err(err @ (TypekeepError::Render(_) | TypekeepError::UnsupportedFont { .. })) => {
                warn!(error = %err, "direct render failed; escalating");
                None
            }
            Err(err) => return Err(err),
        };
        *doc = redacted;

        let preserving = self.render(BackendKind::Preserving, doc, attempt);
        outcome.attempts.push(attempt.record(BackendKind::Preserving, &preserving));

        let (preserving_observed, reason) = match preserving {
            Ok(result) if result.verify(attempt.expected).is_faithful() => {
                info!(font = %result.observed_font, "drift recovered by preserving render");
                commit(outcome, result, FidelityVerdict::DriftedAndRecovered);
                return Ok(None);
            }
            Ok(result) => (
                Some(result.observed_font),
                "preserving render also substituted the font".to_string(),
            ),
            Err(err) => (None, err.to_string()),
        };
        outcome.verdict = Some(FidelityVerdict::DriftedAndUnrecoverable);
        Err(TypekeepError::DriftUnrecoverable {
            run_id: attempt.located.run.id.clone(),
            expected: attempt.expected.to_string(),
            direct_observed,
            preserving_observed,
            reason,
        })
    }

    /// Exactly one backend. A drifted render is kept, since the caller
    /// asked for that backend; a failed render rejects the run.
    fn forced(
        &self,
        backend: BackendKind,
        doc: &mut PdfDocument,
        attempt: &Attempt<'_>,
        outcome: &mut EditOutcome,
    ) -> Result<Option<TypekeepError>> {
        let rendered = self.render(backend, doc, attempt);
        outcome.attempts.push(attempt.record(backend, &rendered));
        let result = rendered?;

        if result.verify(attempt.expected).is_faithful() {
            debug!(state = "faithful", %backend);
            commit(outcome, result, FidelityVerdict::Faithful);
            return Ok(None);
        }

        let observed = Some(result.observed_font.clone());
        let (direct_observed, preserving_observed) = match backend {
            BackendKind::Direct => (observed, None),
            BackendKind::Preserving => (None, observed),
        };
        let err = TypekeepError::DriftUnrecoverable {
            run_id: attempt.located.run.id.clone(),
            expected: attempt.expected.to_string(),
            direct_observed,
            preserving_observed,
            reason: format!("the {backend} engine was forced, so no fallback was tried"),
        };
        commit(outcome, result, FidelityVerdict::DriftedAndUnrecoverable);
        Ok(Some(err))
    }

    fn render(
        &self,
        backend: BackendKind,
        doc: &mut PdfDocument,
        attempt: &Attempt<'_>,
    ) -> Result<RenderResult> {
        match backend {
            BackendKind::Direct => {
                self.direct
                    .render(doc, attempt.located, attempt.text, attempt.overrides)
            }
            BackendKind::Preserving => {
                self.preserving
                    .render(doc, attempt.located, attempt.text, attempt.overrides)
            }
        }
    }

    /// Find `located` again on the current state of its page. Earlier runs
    /// may have shifted operator indices.
    fn relocate(&self, doc: &PdfDocument, located: &LocatedRun) -> Result<LocatedRun> {
        self.locator
            .page_runs(doc, located.run.page)?
            .into_iter()
            .find(|current| {
                current.run.id == located.run.id && current.run.content == located.run.content
            })
            .ok_or_else(|| TypekeepError::GeometryConflict {
                run_id: located.run.id.clone(),
                reason: "run moved or changed while earlier runs were edited".into(),
            })
    }

    // -- Audit and backup -----------------------------------------------------

    fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.audit_log()?.append(entry)?;
        Ok(())
    }

    fn record_failure(&self, entry: &mut AuditEntry, err: &TypekeepError) -> Result<()> {
        warn!(error = %err, "edit rejected");
        entry.status = OperationStatus::Failed;
        entry.error = Some(err.to_failure());
        entry.notes.push(humanize_error(err).as_note());
        self.append(entry)
    }

    fn retained_location(&self, backup: &BackupGuard, changed: bool) -> Option<String> {
        is_retained(self.config.backup_retention, changed)
            .then(|| backup.location().display().to_string())
    }

    fn release(&self, backup: BackupGuard, changed: bool) {
        if let Err(err) = backup.release(self.config.backup_retention, changed) {
            warn!(error = %err, "snapshot release failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One run's render inputs, shared by both backends.
struct Attempt<'a> {
    located: &'a LocatedRun,
    text: &'a str,
    expected: &'a str,
    overrides: &'a Overrides,
}

impl Attempt<'_> {
    fn record(&self, backend: BackendKind, result: &Result<RenderResult>) -> BackendAttempt {
        match result {
            Ok(result) => BackendAttempt {
                backend,
                observed_font: Some(result.observed_font.clone()),
                faithful: result.verify(self.expected).is_faithful(),
                error: None,
            },
            Err(err) => BackendAttempt {
                backend,
                observed_font: None,
                faithful: false,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Refuse a run whose font resource is missing, or in strict mode whose
/// font would not be redrawn exactly.
fn check_font(located: &LocatedRun, strict: bool) -> Result<()> {
    let run = &located.run;
    if located.font.is_none() {
        return Err(TypekeepError::Validation {
            run_id: Some(run.id.clone()),
            reason: format!(
                "font resource /{} is not defined on page {}",
                located.font_resource().unwrap_or_default(),
                run.page
            ),
        });
    }
    if strict {
        let (quality, substitute) = run_quality(located);
        if quality != FontMatchQuality::Exact {
            return Err(TypekeepError::Validation {
                run_id: Some(run.id.clone()),
                reason: format!(
                    "strict mode: {} is only a {} match (substitute {})",
                    run.font_name,
                    quality,
                    substitute.unwrap_or("none")
                ),
            });
        }
    }
    Ok(())
}

fn commit(outcome: &mut EditOutcome, result: RenderResult, verdict: FidelityVerdict) {
    outcome.backend = Some(result.backend);
    outcome.font = result.font;
    outcome.after = Some(result.after);
    outcome.verdict = Some(verdict);
    outcome.applied = true;
}

/// The run's text after the edit. Content selectors replace every
/// occurrence of the search text not already inside the replacement; id
/// selectors replace the whole run.
fn new_content(content: &str, selector: &Selector, replacement: &str) -> String {
    match selector {
        Selector::Content { text, .. } => replace_bare(content, text, replacement),
        Selector::Id { .. } => replacement.to_string(),
    }
}

/// Byte spans of `replacement` in `content`, when the replacement itself
/// contains `search`.
fn replacement_spans(content: &str, search: &str, replacement: &str) -> Vec<(usize, usize)> {
    if !replacement.contains(search) {
        return Vec::new();
    }
    content
        .match_indices(replacement)
        .map(|(start, m)| (start, start + m.len()))
        .collect()
}

/// Occurrences of `search` that no replacement span covers.
fn bare_matches<'a>(
    content: &'a str,
    search: &'a str,
    spans: &'a [(usize, usize)],
) -> impl Iterator<Item = (usize, usize)> + 'a {
    content
        .match_indices(search)
        .map(|(start, m)| (start, start + m.len()))
        .filter(move |&(start, end)| !spans.iter().any(|&(from, to)| from <= start && end <= to))
}

fn replace_bare(content: &str, search: &str, replacement: &str) -> String {
    let spans = replacement_spans(content, search, replacement);
    let mut out = String::with_capacity(content.len() + replacement.len());
    let mut last = 0;
    for (start, end) in bare_matches(content, search, &spans) {
        out.push_str(&content[last..start]);
        out.push_str(replacement);
        last = end;
    }
    out.push_str(&content[last..]);
    out
}

/// Whether every occurrence of `search` in `content` lies inside an
/// occurrence of `replacement`.
fn already_applied(content: &str, search: &str, replacement: &str) -> bool {
    if !replacement.contains(search) {
        return false;
    }
    let spans = replacement_spans(content, search, replacement);
    bare_matches(content, search, &spans).next().is_none()
}

fn status_of(outcomes: &[EditOutcome], cancelled: bool) -> OperationStatus {
    let applied = outcomes.iter().filter(|o| o.applied).count();
    if cancelled {
        OperationStatus::Cancelled
    } else if applied == outcomes.len() {
        OperationStatus::Success
    } else if applied == 0 {
        OperationStatus::Failed
    } else {
        OperationStatus::Partial
    }
}
