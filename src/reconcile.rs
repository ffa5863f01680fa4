//! Override and draft reconciliation.
//!
//! A [`PayrollSession`] owns the state of one pay period between
//! calculation and save: the computed baseline rows, the sparse layer
//! of user overrides on top of them, the selection of rows to save,
//! and the per-employee cash flags.  Three layers of truth are merged
//! into what the user sees: computed value, then local draft override,
//! then (on period entry) whatever was previously persisted.
//!
//! Edits never touch the computed rows.  Every edit schedules a
//! debounced write of the draft snapshot through the injected
//! [`KvStore`]; a save pushes the selected display rows through the
//! injected [`PayrollStore`] as one unit and, only on success, retires
//! the draft.  Any failure leaves both the draft and the in-memory
//! state exactly as they were so the user can retry.

use crate::engine;
use crate::models::{
    canonical_id, AttendanceRecord, Draft, Employee, OverrideMap, PayField, PaymentMethod,
    PayPeriod, PayrollRow, SavedRow, DRAFT_SCHEMA_VERSION,
};
use crate::report::{self, PaymentFilter, PayrollTotals};
use crate::sched::{Scheduler, TaskHandle};
use crate::store::{KvStore, PayrollStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between the last edit and the draft write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Shared handle to the draft key-value store.
pub type SharedKvStore = Arc<Mutex<dyn KvStore>>;

/// Shared handle to the saved-payroll store.
pub type SharedPayrollStore = Arc<Mutex<dyn PayrollStore>>;

/// Which layer of persisted truth seeded the session after a
/// calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoredFrom {
    /// A local draft with edits was restored.
    Draft,
    /// Cash flags were restored from a previously saved run.
    SavedRun,
    /// Nothing persisted existed; defaults apply.
    Fresh,
}

/// Failure to save a payroll run.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no employees selected to save")]
    NothingSelected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    pub rows: usize,
    pub cash_rows: usize,
}

#[derive(Debug, Default)]
struct DraftStatus {
    exists: bool,
    saved_at: Option<DateTime<Utc>>,
}

/// Reconciliation engine for one pay period.
///
/// Period identity is fixed at construction; entering a different
/// period means constructing a new session, which re-evaluates the
/// load precedence for that period's keys.
pub struct PayrollSession {
    period: PayPeriod,
    computed: Vec<PayrollRow>,
    overrides: OverrideMap,
    selected: HashSet<String>,
    cash: HashSet<String>,
    drafts: SharedKvStore,
    payroll: SharedPayrollStore,
    scheduler: Box<dyn Scheduler>,
    debounce: Duration,
    pending: Option<Box<dyn TaskHandle>>,
    status: Arc<Mutex<DraftStatus>>,
}

impl PayrollSession {
    pub fn new(
        period: PayPeriod,
        drafts: SharedKvStore,
        payroll: SharedPayrollStore,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let session = Self {
            period,
            computed: Vec::new(),
            overrides: OverrideMap::new(),
            selected: HashSet::new(),
            cash: HashSet::new(),
            drafts,
            payroll,
            scheduler,
            debounce: DEFAULT_DEBOUNCE,
            pending: None,
            status: Arc::new(Mutex::new(DraftStatus::default())),
        };
        // Surface an existing draft immediately so the caller can show
        // the indicator before the first calculation.
        if let Some(draft) = session.read_draft() {
            if let Ok(mut status) = session.status.lock() {
                status.exists = true;
                status.saved_at = Some(draft.saved_at);
            }
        }
        session
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn period(&self) -> PayPeriod {
        self.period
    }

    /// Runs the period's calculator over the roster, then applies the
    /// load precedence: a valid draft with edits wins, else cash flags
    /// from a previously saved run, else defaults (everything
    /// selected, no overrides, no cash flags).
    pub fn calculate(
        &mut self,
        employees: &[Employee],
        attendance: &[AttendanceRecord],
    ) -> RestoredFrom {
        self.cancel_pending();
        self.computed = engine::calculate(self.period.employee_type, employees, attendance);
        self.restore_state()
    }

    /// Adopts a previously saved run as the new computed baseline, the
    /// way the app loads a period that was already saved: rows come
    /// straight from the store, overrides stay empty, cash flags come
    /// from the rows' own markers.  Returns the row count, or `None`
    /// when nothing is saved for the period.  State is untouched on
    /// error.
    pub fn load_saved_run(&mut self) -> Result<Option<usize>, StoreError> {
        let rows = self
            .payroll
            .lock()
            .map_err(|_| StoreError::Unavailable("payroll store lock poisoned".into()))?
            .load(self.period)?;
        if rows.is_empty() {
            return Ok(None);
        }
        self.cancel_pending();
        self.cash = rows
            .iter()
            .filter(|r| r.is_cash || r.payment_method.is_cash())
            .map(|r| canonical_id(&r.row.employee_id))
            .collect();
        self.computed = rows.into_iter().map(|r| r.row).collect();
        self.selected = self.computed_ids();
        self.overrides.clear();
        info!(period = %self.period, rows = self.computed.len(), "loaded saved payroll run");
        Ok(Some(self.computed.len()))
    }

    // --- Display merge ---

    /// The rows the user sees: computed values with overrides layered
    /// on top.  Pure; the computed baseline is never mutated.
    pub fn display_rows(&self) -> Vec<PayrollRow> {
        self.computed
            .iter()
            .map(|row| row.with_overrides(self.overrides.get(&canonical_id(&row.employee_id))))
            .collect()
    }

    pub fn display_row(&self, employee_id: &str) -> Option<PayrollRow> {
        let key = canonical_id(employee_id);
        self.computed
            .iter()
            .find(|row| canonical_id(&row.employee_id) == key)
            .map(|row| row.with_overrides(self.overrides.get(&key)))
    }

    /// The computed baseline, before overrides.
    pub fn computed_rows(&self) -> &[PayrollRow] {
        &self.computed
    }

    // --- Overrides ---

    /// Records an override, whether or not the value differs from the
    /// computed one.  Overrides are deliberately not smart: an
    /// override equal to the computed value still persists as an
    /// override.
    pub fn set_override(&mut self, employee_id: &str, field: PayField, value: f64) {
        self.overrides
            .entry(canonical_id(employee_id))
            .or_default()
            .insert(field, value);
        self.queue_draft_save();
    }

    pub fn remove_override(&mut self, employee_id: &str, field: PayField) {
        let key = canonical_id(employee_id);
        if let Some(fields) = self.overrides.get_mut(&key) {
            fields.remove(&field);
            if fields.is_empty() {
                self.overrides.remove(&key);
            }
            self.queue_draft_save();
        }
    }

    pub fn override_value(&self, employee_id: &str, field: PayField) -> Option<f64> {
        self.overrides
            .get(&canonical_id(employee_id))
            .and_then(|fields| fields.get(&field))
            .copied()
    }

    pub fn is_overridden(&self, employee_id: &str, field: PayField) -> bool {
        self.override_value(employee_id, field).is_some()
    }

    /// Employees carrying at least one override.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    // --- Selection ---

    pub fn is_selected(&self, employee_id: &str) -> bool {
        self.selected.contains(&canonical_id(employee_id))
    }

    pub fn toggle_selected(&mut self, employee_id: &str) {
        let key = canonical_id(employee_id);
        if !self.selected.remove(&key) {
            self.selected.insert(key);
        }
        self.queue_draft_save();
    }

    pub fn select_all(&mut self) {
        self.selected = self.computed_ids();
        self.queue_draft_save();
    }

    /// All rows selected flips to none; anything else flips to all.
    pub fn toggle_select_all(&mut self) {
        if self.selected.len() == self.computed.len() {
            self.selected.clear();
        } else {
            self.selected = self.computed_ids();
        }
        self.queue_draft_save();
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    // --- Cash flags ---

    pub fn is_cash(&self, employee_id: &str) -> bool {
        self.cash.contains(&canonical_id(employee_id))
    }

    pub fn toggle_cash(&mut self, employee_id: &str) {
        let key = canonical_id(employee_id);
        if !self.cash.remove(&key) {
            self.cash.insert(key);
        }
        self.queue_draft_save();
    }

    pub fn set_cash(&mut self, employee_id: &str, cash: bool) {
        let key = canonical_id(employee_id);
        let changed = if cash {
            self.cash.insert(key)
        } else {
            self.cash.remove(&key)
        };
        if changed {
            self.queue_draft_save();
        }
    }

    pub fn cash_count(&self) -> usize {
        self.cash.len()
    }

    // --- Reporting ---

    /// Totals over the selected display rows, with the bank/cash
    /// split.  An empty selection yields zero totals.
    pub fn totals(&self) -> PayrollTotals {
        let selected: Vec<PayrollRow> = self
            .display_rows()
            .into_iter()
            .filter(|row| self.selected.contains(&canonical_id(&row.employee_id)))
            .collect();
        report::summarize(&selected, &self.cash)
    }

    /// Display rows narrowed to a payment-method partition.
    pub fn rows_for(&self, filter: PaymentFilter) -> Vec<PayrollRow> {
        report::filter_rows(self.display_rows(), &self.cash, filter)
    }

    // --- Save ---

    /// Persists the selected display rows, each annotated with its
    /// cash/bank classification, as a single unit.  Refused before any
    /// write when the selection is empty.  On success the draft is
    /// retired and overrides and cash flags reset; the persisted run
    /// is the period's new source of truth.  On failure every piece of
    /// local state is left untouched for retry.
    pub fn save(&mut self) -> Result<SaveReceipt, SaveError> {
        let rows: Vec<SavedRow> = self
            .display_rows()
            .into_iter()
            .filter(|row| self.selected.contains(&canonical_id(&row.employee_id)))
            .map(|row| {
                let is_cash = self.cash.contains(&canonical_id(&row.employee_id));
                SavedRow {
                    row,
                    is_cash,
                    payment_method: if is_cash {
                        PaymentMethod::Cash
                    } else {
                        PaymentMethod::BankTransfer
                    },
                }
            })
            .collect();
        if rows.is_empty() {
            return Err(SaveError::NothingSelected);
        }
        let cash_rows = rows.iter().filter(|r| r.is_cash).count();
        {
            let mut store = self
                .payroll
                .lock()
                .map_err(|_| StoreError::Unavailable("payroll store lock poisoned".into()))?;
            store.save(self.period, &rows)?;
        }
        info!(period = %self.period, rows = rows.len(), cash = cash_rows, "payroll run saved");
        self.forget_draft();
        self.overrides.clear();
        self.cash.clear();
        Ok(SaveReceipt { rows: rows.len(), cash_rows })
    }

    // --- Draft lifecycle ---

    pub fn has_draft(&self) -> bool {
        self.status.lock().map(|s| s.exists).unwrap_or(false)
    }

    pub fn draft_saved_at(&self) -> Option<DateTime<Utc>> {
        self.status.lock().ok().and_then(|s| s.saved_at)
    }

    /// Discards the period's draft unconditionally and resets edits:
    /// overrides and cash flags cleared, selection back to every
    /// computed row.
    pub fn clear_draft(&mut self) {
        self.forget_draft();
        self.overrides.clear();
        self.cash.clear();
        self.selected = self.computed_ids();
    }

    fn computed_ids(&self) -> HashSet<String> {
        self.computed
            .iter()
            .map(|row| canonical_id(&row.employee_id))
            .collect()
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }

    /// Deletes the persisted draft and drops any pending write, without
    /// touching overrides, cash flags or selection.
    fn forget_draft(&mut self) {
        self.cancel_pending();
        let key = self.period.draft_key();
        match self.drafts.lock() {
            Ok(mut store) => {
                if let Err(err) = store.delete(&key) {
                    warn!(%err, "draft delete failed");
                }
            }
            Err(_) => warn!("draft store lock poisoned"),
        }
        if let Ok(mut status) = self.status.lock() {
            status.exists = false;
            status.saved_at = None;
        }
    }

    fn read_draft(&self) -> Option<Draft> {
        let key = self.period.draft_key();
        let raw = match self.drafts.lock() {
            Ok(store) => match store.get(&key) {
                Ok(value) => value?,
                Err(err) => {
                    warn!(%err, "draft read failed");
                    return None;
                }
            },
            Err(_) => {
                warn!("draft store lock poisoned");
                return None;
            }
        };
        match serde_json::from_str::<Draft>(&raw) {
            Ok(draft) if draft.version == DRAFT_SCHEMA_VERSION => Some(draft),
            Ok(draft) => {
                debug!(version = draft.version, "ignoring draft with foreign schema version");
                None
            }
            Err(err) => {
                warn!(%err, "ignoring unreadable draft");
                None
            }
        }
    }

    /// Load precedence for a freshly calculated period, evaluated in
    /// order with short-circuiting.
    fn restore_state(&mut self) -> RestoredFrom {
        let valid = self.computed_ids();

        if let Some(draft) = self.read_draft() {
            if !draft.overrides.is_empty() || !draft.cash_employee_ids.is_empty() {
                let restored: HashSet<String> = draft
                    .selected_ids
                    .iter()
                    .map(|id| canonical_id(id))
                    .filter(|id| valid.contains(id))
                    .collect();
                self.selected = if restored.is_empty() { valid.clone() } else { restored };
                self.cash = draft
                    .cash_employee_ids
                    .iter()
                    .map(|id| canonical_id(id))
                    .filter(|id| valid.contains(id))
                    .collect();
                self.overrides = draft.overrides;
                if let Ok(mut status) = self.status.lock() {
                    status.exists = true;
                    status.saved_at = Some(draft.saved_at);
                }
                info!(period = %self.period, "restored draft edits");
                return RestoredFrom::Draft;
            }
        }

        self.overrides.clear();
        self.selected = valid.clone();
        let saved = match self.payroll.lock() {
            Ok(store) => store.load(self.period),
            Err(_) => Err(StoreError::Unavailable("payroll store lock poisoned".into())),
        };
        match saved {
            Ok(rows) if !rows.is_empty() => {
                // The saved run is the period's baseline truth; only
                // its cash markers carry over as restorable edits.
                self.cash = rows
                    .iter()
                    .filter(|r| r.is_cash || r.payment_method.is_cash())
                    .map(|r| canonical_id(&r.row.employee_id))
                    .filter(|id| valid.contains(id))
                    .collect();
                info!(period = %self.period, "restored cash flags from saved run");
                RestoredFrom::SavedRun
            }
            Ok(_) => {
                self.cash.clear();
                RestoredFrom::Fresh
            }
            Err(err) => {
                warn!(%err, "could not check for a saved run, starting fresh");
                self.cash.clear();
                RestoredFrom::Fresh
            }
        }
    }

    /// Cancels any pending write and schedules a fresh one carrying a
    /// snapshot of the current edits.  At fire time a snapshot with no
    /// overrides and no cash flags deletes the draft key instead of
    /// writing an empty draft.
    fn queue_draft_save(&mut self) {
        self.cancel_pending();
        let key = self.period.draft_key();
        let store = Arc::clone(&self.drafts);
        let status = Arc::clone(&self.status);
        let snapshot = if self.overrides.is_empty() && self.cash.is_empty() {
            None
        } else {
            let mut selected_ids: Vec<String> = self.selected.iter().cloned().collect();
            selected_ids.sort();
            let mut cash_employee_ids: Vec<String> = self.cash.iter().cloned().collect();
            cash_employee_ids.sort();
            Some((self.overrides.clone(), selected_ids, cash_employee_ids))
        };
        let task = Box::new(move || match snapshot {
            Some((overrides, selected_ids, cash_employee_ids)) => {
                let draft = Draft {
                    overrides,
                    selected_ids,
                    cash_employee_ids,
                    saved_at: Utc::now(),
                    version: DRAFT_SCHEMA_VERSION,
                };
                let raw = match serde_json::to_string(&draft) {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!(%err, "draft serialise failed");
                        return;
                    }
                };
                match store.lock() {
                    Ok(mut guard) => match guard.set(&key, &raw) {
                        Ok(()) => {
                            if let Ok(mut s) = status.lock() {
                                s.exists = true;
                                s.saved_at = Some(draft.saved_at);
                            }
                        }
                        Err(err) => warn!(%err, "draft write failed"),
                    },
                    Err(_) => warn!("draft store lock poisoned"),
                }
            }
            None => match store.lock() {
                Ok(mut guard) => {
                    if let Err(err) = guard.delete(&key) {
                        warn!(%err, "draft delete failed");
                    } else if let Ok(mut s) = status.lock() {
                        s.exists = false;
                        s.saved_at = None;
                    }
                }
                Err(_) => warn!("draft store lock poisoned"),
            },
        });
        self.pending = Some(self.scheduler.schedule(self.debounce, task));
    }
}
