//! Ledger engine - The only entry point for balance mutations.
//!
//! Each public operation opens one database transaction, optionally acquires a
//! cooldown, applies guarded account updates, appends journal entries, and
//! commits. Returning early with an error drops the transaction, which rolls back
//! every effect, so callers observe either the whole operation or nothing.
//!
//! Investment, interest, store and game operations live in their own modules as
//! further `impl Ledger` blocks.

use crate::{
    config::economy::EconomyConfig,
    core::{
        accounts,
        clock::{Clock, SystemClock},
        cooldown::{self, CooldownAction},
        journal::{self, JournalEntry, TransactionId, TransactionKind},
        random::{self, AmountRange},
    },
    entities::account,
    errors::{Bucket, Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rand::{SeedableRng, rngs::StdRng};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, instrument};

/// Result of a single-account credit or debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Account state after the operation
    pub account: account::Model,
    /// Signed amount applied to the wallet
    pub amount: i64,
    /// Journal entry written for the operation
    pub transaction_id: TransactionId,
}

/// How a crime attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrimeOutcome {
    /// Got away with `reward`
    Success {
        /// Amount credited
        reward: i64,
    },
    /// Caught; `fine` is what was actually taken, `assessed` what was rolled
    Caught {
        /// Amount debited, at most the wallet balance
        fine: i64,
        /// Fine before clamping to the wallet
        assessed: i64,
    },
}

/// Result of [`Ledger::attempt_crime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrimeReceipt {
    /// What happened
    pub outcome: CrimeOutcome,
    /// Balance change and journal entry
    pub receipt: Receipt,
}

/// Result of [`Ledger::transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Sender after the transfer
    pub sender: account::Model,
    /// Recipient after the transfer
    pub recipient: account::Model,
    /// Amount moved
    pub amount: i64,
    /// `transfer_sent` entry
    pub sent_id: TransactionId,
    /// `transfer_received` entry
    pub received_id: TransactionId,
}

/// Whether a wager was won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagerOutcome {
    /// Paid `amount * multiplier` (net profit `amount * (multiplier - 1)`)
    Won,
    /// Lost the stake
    Lost,
}

/// The engine. Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct Ledger {
    pub(crate) db: DatabaseConnection,
    pub(crate) config: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl Ledger {
    /// Creates an engine using wall-clock time and an OS-seeded RNG.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Arc<EconomyConfig>) -> Self {
        Self {
            db,
            config,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the RNG with a deterministic one.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Underlying database connection, for read-only queries.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Economy settings in use.
    #[must_use]
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs `f` with the engine's RNG. The lock is never held across an await.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Returns the user's account, creating it on first reference.
    pub async fn account(&self, user_id: &str) -> Result<account::Model> {
        ensure_user_id(user_id)?;
        accounts::get_or_create(&self.db, user_id, self.now()).await
    }

    /// Flags an account as a bot so it can never receive transfers.
    pub async fn register_bot(&self, user_id: &str) -> Result<account::Model> {
        ensure_user_id(user_id)?;
        accounts::register(&self.db, user_id, true, self.now()).await
    }

    /// Time left on a cooldown, `None` when the action is available.
    pub async fn cooldown_remaining(
        &self,
        user_id: &str,
        action: CooldownAction,
        interval: Duration,
    ) -> Result<Option<Duration>> {
        cooldown::remaining(&self.db, user_id, action, interval, self.now()).await
    }

    /// Credits a random amount behind a cooldown, journaled as `kind`.
    async fn credit_with_cooldown(
        &self,
        user_id: &str,
        action: CooldownAction,
        interval: Duration,
        range: AmountRange,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Receipt> {
        ensure_user_id(user_id)?;
        let amount = self.with_rng(|rng| range.sample(rng))?;
        let now = self.now();

        let txn = self.db.begin().await?;
        cooldown::try_acquire(&txn, user_id, action, interval, now).await?;
        let account = accounts::adjust_wallet(&txn, user_id, amount, now).await?;
        let transaction_id = journal::append(
            &txn,
            JournalEntry::new(user_id, kind, amount, description),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(user_id, amount, %kind, "credited");
        Ok(Receipt {
            account,
            amount,
            transaction_id,
        })
    }

    /// Credits a random amount from `range` if `action` is off cooldown.
    ///
    /// # Errors
    /// `OnCooldown` if the action was used less than `interval` ago.
    #[instrument(skip(self))]
    pub async fn earn(
        &self,
        user_id: &str,
        action: CooldownAction,
        interval: Duration,
        range: AmountRange,
    ) -> Result<Receipt> {
        self.credit_with_cooldown(
            user_id,
            action,
            interval,
            range,
            TransactionKind::Earn,
            "Work payout",
        )
        .await
    }

    /// `earn` with the configured work range and cooldown.
    pub async fn work(&self, user_id: &str) -> Result<Receipt> {
        self.earn(
            user_id,
            CooldownAction::Earn,
            self.config.earn_cooldown(),
            self.config.earn_range(),
        )
        .await
    }

    /// Claims the daily bonus (24 hour cooldown).
    #[instrument(skip(self))]
    pub async fn claim_daily(&self, user_id: &str, range: AmountRange) -> Result<Receipt> {
        self.credit_with_cooldown(
            user_id,
            CooldownAction::Daily,
            CooldownAction::Daily.default_interval(),
            range,
            TransactionKind::Daily,
            "Daily bonus claim",
        )
        .await
    }

    /// Claims the weekly bonus (7 day cooldown).
    #[instrument(skip(self))]
    pub async fn claim_weekly(&self, user_id: &str, range: AmountRange) -> Result<Receipt> {
        self.credit_with_cooldown(
            user_id,
            CooldownAction::Weekly,
            CooldownAction::Weekly.default_interval(),
            range,
            TransactionKind::Weekly,
            "Weekly bonus claim",
        )
        .await
    }

    /// `claim_daily` with the configured bonus range.
    pub async fn daily(&self, user_id: &str) -> Result<Receipt> {
        self.claim_daily(user_id, self.config.daily_range()).await
    }

    /// `claim_weekly` with the configured bonus range.
    pub async fn weekly(&self, user_id: &str) -> Result<Receipt> {
        self.claim_weekly(user_id, self.config.weekly_range()).await
    }

    /// Attempts a crime. The configured crime cooldown applies to every attempt,
    /// caught or not.
    ///
    /// A failed attempt takes `min(fine, wallet_balance)`, so this never fails with
    /// `InsufficientFunds`.
    #[instrument(skip(self))]
    pub async fn attempt_crime(
        &self,
        user_id: &str,
        success_rate: f64,
        reward_range: AmountRange,
        fine_range: AmountRange,
    ) -> Result<CrimeReceipt> {
        ensure_user_id(user_id)?;
        let (succeeded, reward, assessed) = self.with_rng(|rng| -> Result<_> {
            Ok((
                random::roll(rng, success_rate)?,
                reward_range.sample(rng)?,
                fine_range.sample(rng)?,
            ))
        })?;
        let now = self.now();

        let txn = self.db.begin().await?;
        cooldown::try_acquire(
            &txn,
            user_id,
            CooldownAction::Crime,
            self.config.crime_cooldown(),
            now,
        )
        .await?;

        let (outcome, amount, entry) = if succeeded {
            (
                CrimeOutcome::Success { reward },
                reward,
                JournalEntry::new(user_id, TransactionKind::CrimeSuccess, reward, "Crime payout"),
            )
        } else {
            let wallet = accounts::get_or_create(&txn, user_id, now).await?.wallet_balance;
            let fine = assessed.min(wallet);
            (
                CrimeOutcome::Caught { fine, assessed },
                -fine,
                JournalEntry::new(user_id, TransactionKind::CrimeFail, -fine, "Crime failure fine"),
            )
        };

        let account = accounts::adjust_wallet(&txn, user_id, amount, now).await?;
        let transaction_id = journal::append(&txn, entry, now).await?;
        txn.commit().await?;

        info!(user_id, amount, succeeded, "crime attempted");
        Ok(CrimeReceipt {
            outcome,
            receipt: Receipt {
                account,
                amount,
                transaction_id,
            },
        })
    }

    /// `attempt_crime` with the configured rates and ranges.
    pub async fn crime(&self, user_id: &str) -> Result<CrimeReceipt> {
        self.attempt_crime(
            user_id,
            self.config.crime_success_rate,
            self.config.crime_reward_range(),
            self.config.crime_fine_range(),
        )
        .await
    }

    /// Moves `amount` from the wallet to the bank.
    ///
    /// # Errors
    /// `InvalidAmount` if `amount <= 0`, `InsufficientFunds` if the wallet is short.
    #[instrument(skip(self))]
    pub async fn deposit(&self, user_id: &str, amount: i64) -> Result<Receipt> {
        self.move_funds(user_id, amount, Bucket::Wallet).await
    }

    /// Moves `amount` from the bank to the wallet.
    ///
    /// # Errors
    /// `InvalidAmount` if `amount <= 0`, `InsufficientFunds` if the bank is short.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, user_id: &str, amount: i64) -> Result<Receipt> {
        self.move_funds(user_id, amount, Bucket::Bank).await
    }

    async fn move_funds(&self, user_id: &str, amount: i64, from: Bucket) -> Result<Receipt> {
        ensure_user_id(user_id)?;
        ensure_positive(amount)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        let (account, entry) = match from {
            Bucket::Wallet => (
                accounts::transfer_wallet_to_bank(&txn, user_id, amount, now).await?,
                JournalEntry::new(user_id, TransactionKind::Deposit, -amount, "Deposit to bank"),
            ),
            Bucket::Bank => (
                accounts::transfer_bank_to_wallet(&txn, user_id, amount, now).await?,
                JournalEntry::new(
                    user_id,
                    TransactionKind::Withdrawal,
                    amount,
                    "Withdrawal from bank",
                ),
            ),
        };
        let wallet_delta = entry.amount;
        let transaction_id = journal::append(&txn, entry, now).await?;
        txn.commit().await?;

        info!(user_id, amount, from = %from, "moved funds between buckets");
        Ok(Receipt {
            account,
            amount: wallet_delta,
            transaction_id,
        })
    }

    /// Moves `amount` from the sender's wallet to the recipient's wallet.
    ///
    /// The two accounts are updated in ascending `user_id` order. A recipient that
    /// has never been seen is not rejected: any non-empty id names a platform user,
    /// so their account is created with a zero balance and then credited. Use
    /// [`Ledger::transfer_to_existing`] to refuse unknown recipients instead.
    ///
    /// # Errors
    /// - `InvalidTarget` for self-transfers, empty ids and bot recipients
    /// - `InvalidAmount` if `amount <= 0`
    /// - `InsufficientFunds` if the sender's wallet is short; nothing changes
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        sender_id: &str,
        recipient_id: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        ensure_user_id(sender_id)?;
        ensure_user_id(recipient_id)?;
        if sender_id == recipient_id {
            return Err(Error::InvalidTarget {
                reason: "cannot transfer to yourself".to_string(),
            });
        }
        ensure_positive(amount)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        if accounts::get_or_create(&txn, recipient_id, now).await?.is_bot {
            return Err(Error::InvalidTarget {
                reason: format!("{recipient_id} is a bot account"),
            });
        }

        let (sender, recipient) = if sender_id < recipient_id {
            let sender = accounts::adjust_wallet(&txn, sender_id, -amount, now).await?;
            let recipient = accounts::adjust_wallet(&txn, recipient_id, amount, now).await?;
            (sender, recipient)
        } else {
            let recipient = accounts::adjust_wallet(&txn, recipient_id, amount, now).await?;
            let sender = accounts::adjust_wallet(&txn, sender_id, -amount, now).await?;
            (sender, recipient)
        };

        let sent_id = journal::append(
            &txn,
            JournalEntry::new(
                sender_id,
                TransactionKind::TransferSent,
                -amount,
                format!("Transfer to {recipient_id}"),
            )
            .with_related(recipient_id),
            now,
        )
        .await?;
        let received_id = journal::append(
            &txn,
            JournalEntry::new(
                recipient_id,
                TransactionKind::TransferReceived,
                amount,
                format!("Transfer from {sender_id}"),
            )
            .with_related(sender_id),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(sender_id, recipient_id, amount, "transfer completed");
        Ok(TransferReceipt {
            sender,
            recipient,
            amount,
            sent_id,
            received_id,
        })
    }

    /// [`Ledger::transfer`] that fails with `InvalidTarget` unless the recipient
    /// already has an account.
    pub async fn transfer_to_existing(
        &self,
        sender_id: &str,
        recipient_id: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        if accounts::find(&self.db, recipient_id).await?.is_none() {
            return Err(Error::InvalidTarget {
                reason: format!("{recipient_id} has no account"),
            });
        }
        self.transfer(sender_id, recipient_id, amount).await
    }

    /// Settles a wager whose outcome was decided by the caller.
    ///
    /// A win credits the net profit `floor(amount * (multiplier - 1))`; a loss
    /// debits the stake. The stake must be covered by the wallet either way.
    ///
    /// # Errors
    /// `InvalidAmount`, `InsufficientFunds`, or `InvalidRate` for a winning
    /// multiplier below 1 or not finite.
    #[instrument(skip(self))]
    pub async fn wager(
        &self,
        user_id: &str,
        amount: i64,
        outcome: WagerOutcome,
        payout_multiplier: f64,
    ) -> Result<Receipt> {
        self.settle_wager(user_id, amount, outcome, payout_multiplier, "Wager")
            .await
    }

    pub(crate) async fn settle_wager(
        &self,
        user_id: &str,
        amount: i64,
        outcome: WagerOutcome,
        payout_multiplier: f64,
        description: &str,
    ) -> Result<Receipt> {
        ensure_user_id(user_id)?;
        ensure_positive(amount)?;
        if !payout_multiplier.is_finite()
            || (outcome == WagerOutcome::Won && payout_multiplier < 1.0)
        {
            return Err(Error::InvalidRate {
                rate: payout_multiplier,
            });
        }
        let now = self.now();

        let txn = self.db.begin().await?;
        let wallet = accounts::get_or_create(&txn, user_id, now).await?.wallet_balance;
        if wallet < amount {
            return Err(Error::InsufficientFunds {
                bucket: Bucket::Wallet,
                available: wallet,
                required: amount,
            });
        }

        let (delta, kind) = match outcome {
            WagerOutcome::Won => (
                random::floor_mul(amount, payout_multiplier - 1.0),
                TransactionKind::WagerWin,
            ),
            WagerOutcome::Lost => (-amount, TransactionKind::WagerLoss),
        };
        let account = accounts::adjust_wallet(&txn, user_id, delta, now).await?;
        let transaction_id =
            journal::append(&txn, JournalEntry::new(user_id, kind, delta, description), now)
                .await?;
        txn.commit().await?;

        info!(user_id, amount, delta, ?outcome, "wager settled");
        Ok(Receipt {
            account,
            amount: delta,
            transaction_id,
        })
    }
}

/// Rejects identifiers no platform would issue.
pub(crate) fn ensure_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::InvalidTarget {
            reason: "empty user id".to_string(),
        });
    }
    Ok(())
}

pub(crate) const fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::journal::{SortOrder, TransactionFilter, count_for_user};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_scenario_earn_deposit_withdraw() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;

        let earned = ledger
            .earn("alice", CooldownAction::Earn, Duration::minutes(5), AmountRange::fixed(50))
            .await?;
        assert_eq!(earned.amount, 50);
        assert_eq!(earned.account.wallet_balance, 50);

        let deposited = ledger.deposit("alice", 30).await?;
        assert_eq!(
            (deposited.account.wallet_balance, deposited.account.bank_balance),
            (20, 30)
        );

        let withdrawn = ledger.withdraw("alice", 10).await?;
        assert_eq!(
            (withdrawn.account.wallet_balance, withdrawn.account.bank_balance),
            (30, 20)
        );

        let account = ledger.account("alice").await?;
        assert_eq!((account.wallet_balance, account.bank_balance), (30, 20));
        assert_eq!(count_for_user(ledger.db(), "alice").await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_earn_cooldown_monotonicity() -> Result<()> {
        let (ledger, clock) = setup_ledger().await?;
        let interval = Duration::minutes(5);

        ledger
            .earn("alice", CooldownAction::Earn, interval, AmountRange::fixed(10))
            .await?;

        let second = ledger
            .earn("alice", CooldownAction::Earn, interval, AmountRange::fixed(10))
            .await;
        assert!(matches!(
            second,
            Err(Error::OnCooldown {
                action: CooldownAction::Earn,
                ..
            })
        ));
        // The failed attempt left no trace
        assert_eq!(count_for_user(ledger.db(), "alice").await?, 1);
        assert_eq!(ledger.account("alice").await?.wallet_balance, 10);

        clock.advance(interval + Duration::seconds(1));
        let third = ledger
            .earn("alice", CooldownAction::Earn, interval, AmountRange::fixed(10))
            .await?;
        assert_eq!(third.account.wallet_balance, 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_daily_and_weekly_claims() -> Result<()> {
        let (ledger, clock) = setup_ledger().await?;

        let daily = ledger.claim_daily("alice", AmountRange::fixed(75)).await?;
        assert_eq!(daily.amount, 75);
        let account = ledger.account("alice").await?;
        assert_eq!(account.last_daily, Some(clock.now()));

        clock.advance(Duration::hours(23));
        match ledger.claim_daily("alice", AmountRange::fixed(75)).await {
            Err(Error::OnCooldown { remaining, .. }) => assert_eq!(remaining, Duration::hours(1)),
            other => panic!("expected cooldown, got {other:?}"),
        }

        // Weekly is tracked separately
        ledger.claim_weekly("alice", AmountRange::fixed(300)).await?;
        clock.advance(Duration::hours(1));
        ledger.claim_daily("alice", AmountRange::fixed(75)).await?;

        let account = ledger.account("alice").await?;
        assert_eq!(account.wallet_balance, 450);

        let weekly = journal::query(
            ledger.db(),
            &TransactionFilter::for_user("alice").with_kind(TransactionKind::Weekly),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(weekly.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_crime_with_zero_success_rate_always_fines() -> Result<()> {
        let (ledger, clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 30).await?;

        let fine_range = AmountRange::new(10, 75)?;
        let mut wallet = 30;
        for _ in 0..5 {
            let receipt = ledger
                .attempt_crime("alice", 0.0, AmountRange::new(25, 150)?, fine_range)
                .await?;
            match receipt.outcome {
                CrimeOutcome::Caught { fine, assessed } => {
                    assert!(fine <= assessed);
                    assert_eq!(fine, assessed.min(wallet));
                    assert_eq!(receipt.receipt.amount, -fine);
                }
                CrimeOutcome::Success { .. } => panic!("crime cannot succeed at rate 0"),
            }
            wallet = receipt.receipt.account.wallet_balance;
            assert!(wallet >= 0);
            clock.advance(Duration::minutes(10));
        }
        assert_eq!(ledger.account("alice").await?.wallet_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_crime_success_and_cooldown() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;

        let receipt = ledger
            .attempt_crime("alice", 1.0, AmountRange::fixed(100), AmountRange::fixed(10))
            .await?;
        assert_eq!(receipt.outcome, CrimeOutcome::Success { reward: 100 });
        assert_eq!(receipt.receipt.account.wallet_balance, 100);

        let again = ledger
            .attempt_crime("alice", 1.0, AmountRange::fixed(100), AmountRange::fixed(10))
            .await;
        assert!(matches!(
            again,
            Err(Error::OnCooldown {
                action: CooldownAction::Crime,
                ..
            })
        ));

        let invalid = ledger
            .attempt_crime("bob", 1.5, AmountRange::fixed(100), AmountRange::fixed(10))
            .await;
        assert!(matches!(invalid, Err(Error::InvalidRate { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_deposit_withdraw_inverse_and_validation() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 120).await?;
        let before = ledger.account("alice").await?;

        ledger.deposit("alice", 70).await?;
        ledger.withdraw("alice", 70).await?;
        let after = ledger.account("alice").await?;
        assert_eq!(before.wallet_balance, after.wallet_balance);
        assert_eq!(before.bank_balance, after.bank_balance);

        assert!(matches!(
            ledger.deposit("alice", 0).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            ledger.deposit("alice", -5).await,
            Err(Error::InvalidAmount { amount: -5 })
        ));
        assert!(matches!(
            ledger.withdraw("alice", 1).await,
            Err(Error::InsufficientFunds {
                bucket: Bucket::Bank,
                ..
            })
        ));
        let result = ledger.deposit("alice", 121).await;
        assert_eq!(result.unwrap_err().shortfall(), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_conserves_funds() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "bob", 100).await?;
        fund_wallet(&ledger, "alice", 40).await?;
        let alice_entries = count_for_user(ledger.db(), "alice").await?;

        // "bob" > "alice", so this exercises the credit-first ordering
        let receipt = ledger.transfer("bob", "alice", 60).await?;
        assert_eq!(receipt.sender.wallet_balance, 40);
        assert_eq!(receipt.recipient.wallet_balance, 100);
        assert_eq!(
            receipt.sender.wallet_balance + receipt.recipient.wallet_balance,
            140
        );

        let sent = journal::history(ledger.db(), "bob", 1).await?;
        assert_eq!(sent[0].id, receipt.sent_id);
        assert_eq!(sent[0].amount, -60);
        assert_eq!(sent[0].related_user_id.as_deref(), Some("alice"));
        assert_eq!(count_for_user(ledger.db(), "alice").await?, alice_entries + 1);

        let back = ledger.transfer("alice", "bob", 100).await?;
        assert_eq!(back.sender.wallet_balance, 0);
        assert_eq!(back.recipient.wallet_balance, 140);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;
        let bob_before = ledger.account("bob").await?;
        let entries_before = journal::query(
            ledger.db(),
            &TransactionFilter::default(),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?
        .len();

        let result = ledger.transfer("alice", "bob", 150).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                available: 100,
                required: 150,
                ..
            })
        ));

        assert_eq!(ledger.account("alice").await?.wallet_balance, 100);
        assert_eq!(ledger.account("bob").await?, bob_before);
        let entries_after = journal::query(
            ledger.db(),
            &TransactionFilter::default(),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?
        .len();
        assert_eq!(entries_before, entries_after);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_rejects_invalid_targets() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;
        ledger.register_bot("helper-bot").await?;

        assert!(matches!(
            ledger.transfer("alice", "alice", 10).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            ledger.transfer("alice", "helper-bot", 10).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            ledger.transfer("alice", "  ", 10).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            ledger.transfer("alice", "bob", 0).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert_eq!(ledger.account("alice").await?.wallet_balance, 100);
        assert_eq!(ledger.account("helper-bot").await?.wallet_balance, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_recipient_created_unless_existing_required() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;

        assert!(matches!(
            ledger.transfer_to_existing("alice", "carol", 10).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(crate::core::accounts::find(ledger.db(), "carol").await?.is_none());

        let receipt = ledger.transfer("alice", "carol", 10).await?;
        assert_eq!(receipt.recipient.wallet_balance, 10);

        let receipt = ledger.transfer_to_existing("alice", "carol", 5).await?;
        assert_eq!(receipt.recipient.wallet_balance, 15);
        assert_eq!(receipt.sender.wallet_balance, 85);

        Ok(())
    }

    #[tokio::test]
    async fn test_wager_win_and_loss() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;

        let win = ledger.wager("alice", 40, WagerOutcome::Won, 2.5).await?;
        assert_eq!(win.amount, 60);
        assert_eq!(win.account.wallet_balance, 160);

        let loss = ledger.wager("alice", 50, WagerOutcome::Lost, 2.0).await?;
        assert_eq!(loss.amount, -50);
        assert_eq!(loss.account.wallet_balance, 110);

        assert!(matches!(
            ledger.wager("alice", 111, WagerOutcome::Won, 2.0).await,
            Err(Error::InsufficientFunds { .. })
        ));
        assert!(matches!(
            ledger.wager("alice", 10, WagerOutcome::Won, 0.5).await,
            Err(Error::InvalidRate { .. })
        ));
        assert!(matches!(
            ledger.wager("alice", 0, WagerOutcome::Lost, 2.0).await,
            Err(Error::InvalidAmount { .. })
        ));

        let wins = journal::query(
            ledger.db(),
            &TransactionFilter::for_user("alice").with_kind(TransactionKind::WagerWin),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(wins.len(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move { ledger.deposit("alice", 30).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(Error::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(succeeded, 3);
        let account = ledger.account("alice").await?;
        assert_eq!((account.wallet_balance, account.bank_balance), (10, 90));
        let deposits = journal::query(
            ledger.db(),
            &TransactionFilter::for_user("alice").with_kind(TransactionKind::Deposit),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(deposits.len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_configured_shortcuts_use_settings() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;

        let receipt = ledger.work("alice").await?;
        let config = ledger.config();
        assert!((config.earn_min..=config.earn_max).contains(&receipt.amount));

        let remaining = ledger
            .cooldown_remaining("alice", CooldownAction::Earn, config.earn_cooldown())
            .await?;
        assert_eq!(remaining, Some(config.earn_cooldown()));

        assert!(matches!(
            ledger.account("").await,
            Err(Error::InvalidTarget { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_daily_and_weekly_shortcuts_use_configured_ranges() -> Result<()> {
        let config = EconomyConfig {
            daily_bonus_min: 70,
            daily_bonus_max: 75,
            weekly_bonus_min: 900,
            weekly_bonus_max: 901,
            ..EconomyConfig::default()
        };
        let (ledger, clock) = setup_ledger_with(config).await?;

        for _ in 0..3 {
            let daily = ledger.daily("alice").await?;
            assert!((70..=75).contains(&daily.amount));
            assert!(matches!(
                ledger.daily("alice").await,
                Err(Error::OnCooldown {
                    action: CooldownAction::Daily,
                    ..
                })
            ));
            clock.advance(Duration::days(1));
        }

        let weekly = ledger.weekly("alice").await?;
        assert!((900..=901).contains(&weekly.amount));
        assert!(matches!(
            ledger.weekly("alice").await,
            Err(Error::OnCooldown {
                action: CooldownAction::Weekly,
                ..
            })
        ));

        Ok(())
    }
}
