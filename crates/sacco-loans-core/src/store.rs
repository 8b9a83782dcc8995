//! In-memory loan aggregate store.
//!
//! The Loan aggregate (the loan plus its repayments, penalties and
//! guarantees) is the only shared mutable resource in the engine.
//! Each aggregate sits behind its own mutex, keyed by loan reference:
//! operations on the same loan serialize, operations on different
//! loans run fully in parallel.
//!
//! `update` is the single mutation path and behaves like a one-loan
//! transaction: the aggregate is cloned, the closure runs against the
//! clone, and the clone is committed back only on `Ok`. Any error
//! rolls the whole unit of work back — partial balance updates are
//! never visible. A committed update bumps `loan.version`; callers
//! holding a stale version get `ConcurrencyConflict`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::LoanError;
use crate::model::{Guarantor, Loan, LoanRepayment, Penalty};
use crate::types::{GuarantorStatus, LoanRef, Money};
use crate::LoanResult;

/// A loan and every record foreign-keyed to it. Guarantor and approval
/// rows have a single designated writer, so the parent lock is the
/// only lock they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAccount {
    pub loan: Loan,
    pub guarantors: Vec<Guarantor>,
    pub repayments: Vec<LoanRepayment>,
    pub penalties: Vec<Penalty>,
}

impl LoanAccount {
    pub fn new(loan: Loan) -> Self {
        LoanAccount {
            loan,
            guarantors: Vec::new(),
            repayments: Vec::new(),
            penalties: Vec::new(),
        }
    }

    /// Sum of amounts pledged by guarantors who have accepted.
    pub fn accepted_guarantee_total(&self) -> Money {
        self.guarantors
            .iter()
            .filter(|g| g.status == GuarantorStatus::Accepted)
            .map(|g| g.guaranteed_amount)
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct LoanStore {
    accounts: RwLock<HashMap<LoanRef, Arc<Mutex<LoanAccount>>>>,
    next_seq: AtomicU64,
}

impl LoanStore {
    pub fn new() -> Self {
        LoanStore {
            accounts: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Next value of the sequential component of a loan reference.
    pub fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a freshly created aggregate. Loans are never deleted;
    /// closure is a status transition.
    pub fn insert(&self, account: LoanAccount) -> LoanResult<()> {
        let loan_ref = account.loan.loan_ref.clone();
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&loan_ref) {
            return Err(LoanError::InvalidInput {
                field: "loan_ref".into(),
                reason: format!("Loan {loan_ref} already exists"),
            });
        }
        accounts.insert(loan_ref, Arc::new(Mutex::new(account)));
        Ok(())
    }

    /// Read-only access to one aggregate.
    pub fn read<R>(&self, loan_ref: &str, f: impl FnOnce(&LoanAccount) -> R) -> LoanResult<R> {
        let handle = self.handle(loan_ref)?;
        let guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&guard))
    }

    /// Run one transactional unit of work against a single aggregate.
    ///
    /// `expected_version` is the optimistic-lock token: `Some(v)` fails
    /// with `ConcurrencyConflict` when the stored loan has moved past
    /// `v`; `None` skips the check (engine-internal callers that just
    /// read the aggregate under the same lock).
    pub fn update<R>(
        &self,
        loan_ref: &str,
        expected_version: Option<u64>,
        f: impl FnOnce(&mut LoanAccount) -> LoanResult<R>,
    ) -> LoanResult<R> {
        let handle = self.handle(loan_ref)?;
        // Commit-on-Ok below keeps the aggregate consistent even if a
        // previous holder panicked, so a poisoned lock is recoverable.
        let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(expected) = expected_version {
            if guard.loan.version != expected {
                return Err(LoanError::ConcurrencyConflict {
                    loan_ref: loan_ref.to_string(),
                });
            }
        }

        let mut draft = guard.clone();
        let result = f(&mut draft)?;
        draft.loan.version += 1;
        *guard = draft;
        Ok(result)
    }

    /// Current version of a loan, for optimistic submissions.
    pub fn version(&self, loan_ref: &str) -> LoanResult<u64> {
        self.read(loan_ref, |account| account.loan.version)
    }

    /// Snapshot of every loan reference currently in the store.
    pub fn loan_refs(&self) -> Vec<LoanRef> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot clones of every aggregate, for read-only scans
    /// (statistics). Sweeps that mutate must go loan-by-loan through
    /// `update` instead.
    pub fn snapshot(&self) -> Vec<LoanAccount> {
        let handles: Vec<Arc<Mutex<LoanAccount>>> = {
            let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
            accounts.values().cloned().collect()
        };
        handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    fn handle(&self, loan_ref: &str) -> LoanResult<Arc<Mutex<LoanAccount>>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts
            .get(loan_ref)
            .cloned()
            .ok_or_else(|| LoanError::NotFound {
                entity: "Loan",
                reference: loan_ref.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        InterestConvention, LoanStatus, LoanType, MemberId, RepaymentFrequency, RepaymentPeriod,
    };
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::thread;

    fn account(loan_ref: &str) -> LoanAccount {
        LoanAccount::new(Loan {
            loan_ref: loan_ref.to_string(),
            member: MemberId(7),
            loan_type: LoanType::Personal,
            principal: dec!(20000),
            interest_rate: dec!(12),
            interest_convention: InterestConvention::ReducingBalance,
            term_months: 12,
            repayment_frequency: RepaymentFrequency::Monthly,
            repayment_period: RepaymentPeriod::Monthly,
            purpose: "test".into(),
            has_collateral: false,
            collateral_details: None,
            status: LoanStatus::Active,
            total_interest: dec!(1300),
            total_repayable: dec!(21300),
            installment_amount: dec!(1775),
            principal_balance: Some(dec!(20000)),
            interest_balance: Some(dec!(1300)),
            application_date: Utc.with_ymd_and_hms(2026, 8, 25, 8, 0, 0).unwrap(),
            approval_date: None,
            disbursement_date: None,
            first_payment_date: None,
            maturity_date: None,
            due_date: None,
            approver_snapshot: vec![],
            approvals: vec![],
            approvals_completed: true,
            rejection_reason: None,
            version: 0,
        })
    }

    // -----------------------------------------------------------------------
    // 1. Commit bumps the version, rollback leaves everything untouched
    // -----------------------------------------------------------------------
    #[test]
    fn test_commit_and_rollback() {
        let store = LoanStore::new();
        store.insert(account("L1")).unwrap();

        store
            .update("L1", None, |acc| {
                acc.loan.principal_balance = Some(dec!(19000));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.version("L1").unwrap(), 1);

        // Failing unit of work: the draft mutation must not be visible.
        let err = store
            .update("L1", None, |acc| {
                acc.loan.principal_balance = Some(dec!(0));
                Err::<(), _>(LoanError::InvalidInput {
                    field: "payment".into(),
                    reason: "boom".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidInput { .. }));

        let balance = store
            .read("L1", |acc| acc.loan.principal_balance)
            .unwrap();
        assert_eq!(balance, Some(dec!(19000)));
        assert_eq!(store.version("L1").unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // 2. Stale version yields ConcurrencyConflict
    // -----------------------------------------------------------------------
    #[test]
    fn test_stale_version_conflicts() {
        let store = LoanStore::new();
        store.insert(account("L1")).unwrap();

        let v = store.version("L1").unwrap();
        store.update("L1", Some(v), |_| Ok(())).unwrap();

        let err = store.update("L1", Some(v), |_| Ok(())).unwrap_err();
        assert!(matches!(err, LoanError::ConcurrencyConflict { .. }));
    }

    // -----------------------------------------------------------------------
    // 3. Concurrent debits on one loan serialize to an exact total
    // -----------------------------------------------------------------------
    #[test]
    fn test_concurrent_updates_serialize() {
        let store = Arc::new(LoanStore::new());
        store.insert(account("L1")).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .update("L1", None, |acc| {
                            let balance = acc.loan.principal_balance.unwrap();
                            acc.loan.principal_balance = Some(balance - dec!(10));
                            Ok(())
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 8 * 25 * 10 = 2000 debited, no lost updates.
        let balance = store.read("L1", |acc| acc.loan.principal_balance).unwrap();
        assert_eq!(balance, Some(dec!(18000)));
        assert_eq!(store.version("L1").unwrap(), 200);
    }

    // -----------------------------------------------------------------------
    // 4. Unknown loans and duplicate refs
    // -----------------------------------------------------------------------
    #[test]
    fn test_missing_and_duplicate_refs() {
        let store = LoanStore::new();
        let err = store.read("L404", |_| ()).unwrap_err();
        assert!(matches!(err, LoanError::NotFound { .. }));

        store.insert(account("L1")).unwrap();
        let err = store.insert(account("L1")).unwrap_err();
        assert!(matches!(err, LoanError::InvalidInput { .. }));
    }

    // -----------------------------------------------------------------------
    // 5. Accepted guarantee totals
    // -----------------------------------------------------------------------
    #[test]
    fn test_accepted_guarantee_total() {
        let mut acc = account("L1");
        let when = Utc.with_ymd_and_hms(2026, 8, 25, 8, 0, 0).unwrap();
        for (member, amount, status) in [
            (1u64, dec!(8000), GuarantorStatus::Accepted),
            (2, dec!(5000), GuarantorStatus::Requested),
            (3, dec!(12000), GuarantorStatus::Accepted),
            (4, dec!(4000), GuarantorStatus::Rejected),
        ] {
            acc.guarantors.push(Guarantor {
                guarantor: MemberId(member),
                guaranteed_amount: amount,
                status,
                request_date: when,
                response_date: None,
                rejection_reason: None,
            });
        }
        assert_eq!(acc.accepted_guarantee_total(), dec!(20000));
    }
}
