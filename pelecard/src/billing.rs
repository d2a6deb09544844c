//! Subscription and transaction records.
//!
//! These are plain data types; persisting them is up to the host
//! application. State transitions on [`Subscription`] return the
//! [`BillingEvent`] to dispatch. Every time-dependent check takes `now`
//! explicitly.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::BillingEvent;
use crate::response::Response;

/// A subscription operation is not allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// `resume` outside the grace period.
    #[error("Cannot resume a subscription that is not on grace period.")]
    NotOnGracePeriod,
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Within the trial period.
    Trial,
    /// Billing normally.
    Active,
    /// Cancelled, possibly still within the grace period.
    Cancelled,
}

/// A recurring-billing subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Id of the subscribing owner.
    pub owner_id: String,
    /// Subscription name, `default` unless the owner has several.
    pub name: String,
    /// Gateway-side subscription id.
    pub pelecard_subscription_id: Option<String>,
    /// Plan identifier.
    #[serde(rename = "pelecard_plan")]
    pub plan: String,
    /// Seats or units billed.
    pub quantity: u32,
    /// End of the trial period.
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// End of service after cancellation.
    pub ends_at: Option<DateTime<Utc>>,
    /// Additional plans billed with this subscription.
    #[serde(default)]
    pub items: Vec<SubscriptionItem>,
}

impl Subscription {
    /// Whether the trial is still running.
    #[must_use]
    pub fn on_trial(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.is_some_and(|t| t > now)
    }

    /// Whether the subscription was cancelled.
    #[must_use]
    pub const fn cancelled(&self) -> bool {
        self.ends_at.is_some()
    }

    /// Whether the subscription was cancelled but service has not ended yet.
    #[must_use]
    pub fn on_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|t| t > now)
    }

    /// Whether the subscription bills normally: not on trial and not cancelled.
    #[must_use]
    pub fn recurring(&self, now: DateTime<Utc>) -> bool {
        !self.on_trial(now) && !self.cancelled()
    }

    /// Whether the owner should have access.
    #[must_use]
    pub fn valid(&self, now: DateTime<Utc>) -> bool {
        self.on_trial(now) || self.recurring(now)
    }

    /// Alias of [`Self::valid`].
    #[must_use]
    pub fn active(&self, now: DateTime<Utc>) -> bool {
        self.valid(now)
    }

    /// Lifecycle state. Cancellation takes precedence over the trial.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        if self.cancelled() {
            SubscriptionStatus::Cancelled
        } else if self.on_trial(now) {
            SubscriptionStatus::Trial
        } else {
            SubscriptionStatus::Active
        }
    }

    /// Whether the subscription is on `plan`.
    #[must_use]
    pub fn has_plan(&self, plan: &str) -> bool {
        self.plan == plan
    }

    /// Cancels at the end of the trial, or one month from `now` when not on trial.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> BillingEvent {
        self.ends_at = if self.on_trial(now) {
            self.trial_ends_at
        } else {
            Some(
                now.checked_add_months(Months::new(1))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
        };
        self.cancelled_event()
    }

    /// Cancels with immediate effect.
    pub fn cancel_now(&mut self, now: DateTime<Utc>) -> BillingEvent {
        self.ends_at = Some(now);
        self.cancelled_event()
    }

    /// Undoes a cancellation during the grace period.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::NotOnGracePeriod`] if the subscription
    /// is not cancelled or service has already ended.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<BillingEvent, SubscriptionError> {
        if !self.on_grace_period(now) {
            return Err(SubscriptionError::NotOnGracePeriod);
        }
        self.ends_at = None;
        Ok(self.updated_event(None))
    }

    /// Moves to another plan.
    pub fn swap(&mut self, plan: impl Into<String>) -> BillingEvent {
        let previous = std::mem::replace(&mut self.plan, plan.into());
        self.updated_event(Some(previous))
    }

    /// Sets the quantity.
    pub fn update_quantity(&mut self, quantity: u32) -> BillingEvent {
        self.quantity = quantity;
        self.updated_event(None)
    }

    /// Adds `count` to the quantity.
    pub fn increment_quantity(&mut self, count: u32) -> BillingEvent {
        self.update_quantity(self.quantity.saturating_add(count))
    }

    /// Subtracts `count` from the quantity, never going below 1.
    pub fn decrement_quantity(&mut self, count: u32) -> BillingEvent {
        self.update_quantity(self.quantity.saturating_sub(count).max(1))
    }

    /// Ends the trial immediately.
    pub const fn skip_trial(&mut self) {
        self.trial_ends_at = None;
    }

    fn cancelled_event(&self) -> BillingEvent {
        BillingEvent::SubscriptionCancelled {
            subscription: self.clone(),
        }
    }

    fn updated_event(&self, previous_plan: Option<String>) -> BillingEvent {
        BillingEvent::SubscriptionUpdated {
            subscription: self.clone(),
            previous_plan,
        }
    }
}

/// An extra plan billed as part of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    /// Plan identifier.
    #[serde(rename = "pelecard_plan")]
    pub plan: String,
    /// Units billed.
    pub quantity: u32,
}

impl SubscriptionItem {
    /// Creates an item.
    #[must_use]
    pub fn new(plan: impl Into<String>, quantity: u32) -> Self {
        Self {
            plan: plan.into(),
            quantity,
        }
    }

    /// Sets the quantity.
    pub const fn update_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    /// Adds `count` to the quantity.
    pub const fn increment_quantity(&mut self, count: u32) {
        self.quantity = self.quantity.saturating_add(count);
    }

    /// Subtracts `count`, never going below 1.
    pub fn decrement_quantity(&mut self, count: u32) {
        self.quantity = self.quantity.saturating_sub(count).max(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trial {
    None,
    Days(u32),
    Until(DateTime<Utc>),
}

/// Builds a new [`Subscription`].
#[derive(Debug, Clone)]
pub struct SubscriptionBuilder {
    name: String,
    plan: String,
    quantity: u32,
    trial: Trial,
    skip_trial: bool,
    items: Vec<SubscriptionItem>,
}

impl SubscriptionBuilder {
    /// Starts a subscription named `name` on `plan`, quantity 1, no trial.
    #[must_use]
    pub fn new(name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plan: plan.into(),
            quantity: 1,
            trial: Trial::None,
            skip_trial: false,
            items: Vec::new(),
        }
    }

    /// Trial lasting `days` from creation.
    #[must_use]
    pub const fn trial_days(mut self, days: u32) -> Self {
        self.trial = Trial::Days(days);
        self
    }

    /// Trial ending at `date`.
    #[must_use]
    pub const fn trial_until(mut self, date: DateTime<Utc>) -> Self {
        self.trial = Trial::Until(date);
        self
    }

    /// No trial, not even the owner's generic one.
    #[must_use]
    pub const fn skip_trial(mut self) -> Self {
        self.skip_trial = true;
        self.trial = Trial::None;
        self
    }

    /// Sets the quantity.
    #[must_use]
    pub const fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Adds an extra plan.
    #[must_use]
    pub fn add(mut self, plan: impl Into<String>, quantity: u32) -> Self {
        self.items.push(SubscriptionItem::new(plan, quantity));
        self
    }

    /// Creates the subscription for `owner_id`.
    ///
    /// Without an explicit trial, an unexpired `generic_trial_ends_at` of
    /// the owner becomes the trial end. Returns the subscription and its
    /// creation event.
    #[must_use]
    pub fn create(
        self,
        owner_id: impl Into<String>,
        now: DateTime<Utc>,
        generic_trial_ends_at: Option<DateTime<Utc>>,
    ) -> (Subscription, BillingEvent) {
        let trial_ends_at = if self.skip_trial {
            None
        } else {
            match self.trial {
                Trial::Days(days) => Some(
                    now.checked_add_days(Days::new(u64::from(days)))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                ),
                Trial::Until(date) => Some(date),
                Trial::None => generic_trial_ends_at.filter(|t| *t > now),
            }
        };

        let subscription = Subscription {
            owner_id: owner_id.into(),
            name: self.name,
            pelecard_subscription_id: None,
            plan: self.plan,
            quantity: self.quantity,
            trial_ends_at,
            ends_at: None,
            items: self.items,
        };
        let event = BillingEvent::SubscriptionCreated {
            subscription: subscription.clone(),
        };
        (subscription, event)
    }
}

/// Kind of a recorded gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Debit.
    Charge,
    /// Credit back to the card.
    Refund,
    /// Authorization without capture.
    Authorize,
    /// Capture of an authorization.
    Capture,
    /// Void of an authorization.
    Void,
    /// Card tokenization.
    Token,
}

/// Outcome of a recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Approved.
    Completed,
    /// Declined or errored.
    Failed,
    /// Awaiting confirmation.
    Pending,
}

/// A gateway transaction as recorded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Id of the owner the transaction belongs to.
    pub owner_id: Option<String>,
    /// Gateway transaction id.
    pub pelecard_transaction_id: Option<String>,
    /// Transaction kind.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Amount in minor units.
    pub amount: i64,
    /// ISO 4217 currency.
    pub currency: String,
    /// Outcome.
    pub status: TransactionStatus,
    /// Full gateway reply or host metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Transaction {
    /// Records a gateway reply.
    ///
    /// Amount and currency come from the `Amount` / `amount` and `Currency`
    /// fields, falling back to 0 and `default_currency`. The full data is
    /// kept as metadata.
    #[must_use]
    pub fn from_response(kind: TransactionType, response: &Response, default_currency: &str) -> Self {
        let amount = response
            .first_of(&["Amount", "amount"])
            .and_then(|a| a.trim().parse().ok())
            .unwrap_or(0);
        Self {
            owner_id: None,
            pelecard_transaction_id: response.transaction_id(),
            kind,
            amount,
            currency: response
                .get_str("Currency")
                .unwrap_or_else(|| default_currency.to_owned()),
            status: if response.successful() {
                TransactionStatus::Completed
            } else {
                TransactionStatus::Failed
            },
            metadata: response.data().clone(),
        }
    }

    /// Assigns the owner.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Whether the transaction completed.
    #[must_use]
    pub fn successful(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Whether the transaction failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == TransactionStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn subscription() -> Subscription {
        let (sub, _) =
            SubscriptionBuilder::new("default", "basic").create("1", at(2025, 1, 1), None);
        sub
    }

    #[test]
    fn test_new_subscription_is_active() {
        let sub = subscription();
        let now = at(2025, 1, 2);
        assert!(!sub.on_trial(now));
        assert!(sub.recurring(now));
        assert!(sub.valid(now));
        assert!(sub.active(now));
        assert_eq!(sub.status(now), SubscriptionStatus::Active);
        assert!(sub.has_plan("basic"));
        assert_eq!(sub.quantity, 1);
    }

    #[test]
    fn test_trial_days() {
        let now = at(2025, 1, 1);
        let (sub, event) = SubscriptionBuilder::new("default", "pro")
            .trial_days(14)
            .quantity(3)
            .add("addon", 2)
            .create("1", now, None);
        assert_eq!(sub.trial_ends_at, Some(at(2025, 1, 15)));
        assert!(sub.on_trial(at(2025, 1, 10)));
        assert!(!sub.recurring(at(2025, 1, 10)));
        assert!(sub.valid(at(2025, 1, 10)));
        assert_eq!(sub.status(at(2025, 1, 10)), SubscriptionStatus::Trial);
        assert_eq!(sub.items, vec![SubscriptionItem::new("addon", 2)]);
        assert_eq!(event.name(), "subscription.created");
    }

    #[test]
    fn test_trial_days_saturate() {
        let now = at(2025, 1, 1);
        let (sub, _) = SubscriptionBuilder::new("default", "pro")
            .trial_days(u32::MAX)
            .create("1", now, None);
        assert_eq!(sub.trial_ends_at, Some(DateTime::<Utc>::MAX_UTC));
        assert!(sub.on_trial(at(2100, 1, 1)));
        assert_eq!(sub.status(now), SubscriptionStatus::Trial);
    }

    #[test]
    fn test_generic_trial() {
        let now = at(2025, 1, 1);
        let (sub, _) =
            SubscriptionBuilder::new("default", "pro").create("1", now, Some(at(2025, 2, 1)));
        assert_eq!(sub.trial_ends_at, Some(at(2025, 2, 1)));

        let (sub, _) =
            SubscriptionBuilder::new("default", "pro").create("1", now, Some(at(2024, 12, 1)));
        assert_eq!(sub.trial_ends_at, None);

        let (sub, _) = SubscriptionBuilder::new("default", "pro")
            .trial_days(5)
            .skip_trial()
            .create("1", now, Some(at(2025, 2, 1)));
        assert_eq!(sub.trial_ends_at, None);
    }

    #[test]
    fn test_cancel_outside_trial_grants_a_month() {
        let mut sub = subscription();
        let now = at(2025, 1, 31);
        let event = sub.cancel(now);
        assert_eq!(sub.ends_at, Some(at(2025, 2, 28)));
        assert!(sub.cancelled());
        assert!(sub.on_grace_period(now));
        assert!(!sub.valid(now));
        assert_eq!(sub.status(now), SubscriptionStatus::Cancelled);
        assert!(matches!(event, BillingEvent::SubscriptionCancelled { .. }));
    }

    #[test]
    fn test_cancel_on_trial_ends_with_trial() {
        let now = at(2025, 1, 1);
        let (mut sub, _) = SubscriptionBuilder::new("default", "pro")
            .trial_until(at(2025, 1, 20))
            .create("1", now, None);
        sub.cancel(now);
        assert_eq!(sub.ends_at, Some(at(2025, 1, 20)));
    }

    #[test]
    fn test_resume() {
        let mut sub = subscription();
        let now = at(2025, 3, 1);
        assert_eq!(sub.resume(now), Err(SubscriptionError::NotOnGracePeriod));

        sub.cancel(now);
        let event = sub.resume(at(2025, 3, 15)).unwrap();
        assert!(!sub.cancelled());
        assert!(matches!(
            event,
            BillingEvent::SubscriptionUpdated {
                previous_plan: None,
                ..
            }
        ));

        sub.cancel_now(now);
        assert!(sub.resume(at(2025, 3, 2)).is_err());
    }

    #[test]
    fn test_swap_reports_previous_plan() {
        let mut sub = subscription();
        let event = sub.swap("premium");
        assert!(sub.has_plan("premium"));
        match event {
            BillingEvent::SubscriptionUpdated {
                subscription,
                previous_plan,
            } => {
                assert_eq!(previous_plan.as_deref(), Some("basic"));
                assert_eq!(subscription.plan, "premium");
            }
            other => panic!("unexpected event {other}"),
        }
    }

    #[test]
    fn test_quantity_floor() {
        let mut sub = subscription();
        sub.increment_quantity(4);
        assert_eq!(sub.quantity, 5);
        sub.decrement_quantity(10);
        assert_eq!(sub.quantity, 1);
        sub.update_quantity(7);
        assert_eq!(sub.quantity, 7);

        let mut item = SubscriptionItem::new("seat", 2);
        item.decrement_quantity(5);
        assert_eq!(item.quantity, 1);
        item.increment_quantity(2);
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_skip_trial() {
        let now = at(2025, 1, 1);
        let (mut sub, _) = SubscriptionBuilder::new("default", "pro")
            .trial_days(30)
            .create("1", now, None);
        sub.skip_trial();
        assert!(!sub.on_trial(now));
        assert!(sub.recurring(now));
    }

    #[test]
    fn test_subscription_serde() {
        let value = serde_json::to_value(subscription()).unwrap();
        assert_eq!(value["pelecard_plan"], json!("basic"));
        assert_eq!(value["ends_at"], json!(null));
    }

    #[test]
    fn test_transaction_from_response() {
        let data = json!({
            "StatusCode": "000",
            "PelecardTransactionId": "tx-9",
            "Amount": "1500",
            "Currency": "USD",
        });
        let Value::Object(map) = data else { unreachable!() };
        let tx = Transaction::from_response(TransactionType::Charge, &Response::new(map, 200), "ILS")
            .with_owner("7");
        assert!(tx.successful());
        assert_eq!(tx.amount, 1500);
        assert_eq!(tx.currency, "USD");
        assert_eq!(tx.pelecard_transaction_id.as_deref(), Some("tx-9"));
        assert_eq!(tx.owner_id.as_deref(), Some("7"));
        assert_eq!(serde_json::to_value(&tx).unwrap()["type"], json!("charge"));

        let Value::Object(map) = json!({"StatusCode": "006"}) else { unreachable!() };
        let tx = Transaction::from_response(TransactionType::Refund, &Response::new(map, 200), "ILS");
        assert!(tx.failed());
        assert_eq!(tx.amount, 0);
        assert_eq!(tx.currency, "ILS");
    }
}
