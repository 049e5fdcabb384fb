//! # Payment Confirmation Reconciler
//!
//! Single authority for "has this payment been fulfilled". Two entry points
//! feed it the same way:
//!
//! - [`PaymentReconciler::confirm`]: the customer's browser returns from the
//!   provider with a payment id (user present, errors surface to the caller);
//! - [`PaymentReconciler::handle_notification`]: the provider pushes a
//!   notification (always acknowledged, the outcome goes in the body).
//!
//! ```text
//!  UNSEEN ──approved + delivered──────▶ DELIVERED   (terminal, re-entry is a no-op)
//!    │  └───approved + delivery failed─▶ RETRYABLE   (next call tries again)
//!    └──────not approved───────────────▶ PENDING/REJECTED (re-checked on next call)
//! ```
//!
//! The processed-store check, the delivery and the processed-store insert
//! run under one per-payment lock, so concurrent confirmations for the same
//! payment cannot both send.

use crate::dispatcher::{DeliveryOutcome, FulfillmentAttempt, FulfillmentDispatcher};
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::order::{BlockedReason, FulfillmentOrder};
use crate::payment::{PaymentNotification, PaymentRecord, PaymentStatus};
use crate::provider::BoxedPaymentProvider;
use crate::store::{BoxedProcessedStore, PaymentLocks};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default bound on a provider payment lookup
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// What reconciliation decided for an existing payment
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Files were sent and the payment is now marked processed
    Delivered { attempt: FulfillmentAttempt },
    /// A previous call already delivered; nothing was sent
    AlreadyDelivered,
    /// Payment is not approved; nothing was sent
    NotApproved,
    /// Approved, but delivery needs manual intervention
    Blocked { reason: BlockedReason },
    /// Approved, delivery attempted and failed; a later call will retry
    DeliveryFailed { attempt: FulfillmentAttempt },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Delivered { .. } => "delivered",
            ReconcileOutcome::AlreadyDelivered => "already_delivered",
            ReconcileOutcome::NotApproved => "not_approved",
            ReconcileOutcome::Blocked { .. } => "blocked",
            ReconcileOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    /// Whether the customer has (now or earlier) been sent their files
    pub fn email_sent(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Delivered { .. } | ReconcileOutcome::AlreadyDelivered
        )
    }
}

/// Reconciliation result for one payment
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub payment_id: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

impl Reconciliation {
    fn new(payment_id: &str, payment: &PaymentRecord, outcome: ReconcileOutcome) -> Self {
        Self {
            payment_id: payment_id.to_string(),
            status: payment.status,
            amount: payment.transaction_amount,
            reference: payment.external_reference.clone(),
            outcome,
        }
    }

    /// Approved payment whose files have been delivered
    pub fn is_success(&self) -> bool {
        self.status.is_approved() && self.outcome.email_sent()
    }

    pub fn email_sent(&self) -> bool {
        self.outcome.email_sent()
    }

    /// Human-readable summary for API responses and logs
    pub fn message(&self) -> String {
        match &self.outcome {
            ReconcileOutcome::Delivered { .. } => {
                "Payment approved, files sent by email".to_string()
            }
            ReconcileOutcome::AlreadyDelivered => {
                "Payment approved, files were already sent".to_string()
            }
            ReconcileOutcome::NotApproved => self.status.describe().to_string(),
            ReconcileOutcome::Blocked { reason } => {
                format!("Payment approved, delivery blocked: {}", reason)
            }
            ReconcileOutcome::DeliveryFailed { .. } => {
                "Payment approved, sending the files failed and will be retried".to_string()
            }
        }
    }
}

/// Acknowledgement status for a provider notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Notification was reconciled (whatever the business outcome)
    Ok,
    /// Notification was not of interest or unusable
    Ignored,
    /// Reconciliation failed; the provider still gets a success response
    Error,
}

/// Body returned to the provider for every notification
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub status: AckStatus,
    pub message: String,
    #[serde(rename = "paymentId", skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl WebhookAck {
    pub fn ignored(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Ignored,
            message: message.into(),
            payment_id: None,
            outcome: None,
            error: None,
        }
    }

    pub fn failed(payment_id: Option<String>, err: &FulfillmentError) -> Self {
        Self {
            status: AckStatus::Error,
            message: err.to_string(),
            payment_id,
            outcome: None,
            error: Some(err.kind()),
        }
    }

    /// Failure that is not a `FulfillmentError` (task panic, ...)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: message.into(),
            payment_id: None,
            outcome: None,
            error: Some("internal"),
        }
    }

    fn processed(reconciliation: &Reconciliation) -> Self {
        Self {
            status: AckStatus::Ok,
            message: reconciliation.message(),
            payment_id: Some(reconciliation.payment_id.clone()),
            outcome: Some(reconciliation.outcome.label()),
            error: None,
        }
    }
}

/// Confirms payments with the provider and fulfills each approved one once
pub struct PaymentReconciler {
    provider: BoxedPaymentProvider,
    dispatcher: Arc<FulfillmentDispatcher>,
    store: BoxedProcessedStore,
    locks: PaymentLocks,
    provider_timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(
        provider: BoxedPaymentProvider,
        dispatcher: Arc<FulfillmentDispatcher>,
        store: BoxedProcessedStore,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            store,
            locks: PaymentLocks::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Builder: set the provider lookup timeout
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Redirect entry point: the customer returned with a payment id.
    pub async fn confirm(&self, payment_id: Option<&str>) -> FulfillmentResult<Reconciliation> {
        let payment_id = payment_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(FulfillmentError::MissingIdentifier)?;

        self.reconcile(payment_id).await
    }

    /// Notification entry point. Never fails; the returned ack describes
    /// what happened and is sent to the provider with a success status.
    #[instrument(skip(self, notification), fields(topic = ?notification.topic, action = ?notification.action))]
    pub async fn handle_notification(&self, notification: &PaymentNotification) -> WebhookAck {
        if !notification.is_payment() {
            info!("Ignoring non-payment notification");
            return WebhookAck::ignored(format!(
                "notification type {} ignored",
                notification.topic.as_deref().unwrap_or("<none>")
            ));
        }

        match self.confirm(notification.resource_id.as_deref()).await {
            Ok(reconciliation) => WebhookAck::processed(&reconciliation),
            Err(FulfillmentError::MissingIdentifier) => {
                warn!("Payment notification without payment id, dropping");
                WebhookAck::ignored("payment notification without payment id")
            }
            Err(e) => {
                error!(
                    "Notification for payment {:?} not reconciled: {}",
                    notification.resource_id, e
                );
                WebhookAck::failed(notification.resource_id.clone(), &e)
            }
        }
    }

    #[instrument(skip(self), fields(provider = self.provider.provider_name()))]
    async fn reconcile(&self, payment_id: &str) -> FulfillmentResult<Reconciliation> {
        let payment = self.fetch_payment(payment_id).await?;

        if !payment.status.is_approved() {
            info!("Payment {} is {}, nothing to deliver", payment_id, payment.status);
            return Ok(Reconciliation::new(
                payment_id,
                &payment,
                ReconcileOutcome::NotApproved,
            ));
        }

        let _lock = self.locks.acquire(payment_id).await;

        if self.store.contains(payment_id).await? {
            info!("Payment {} already delivered, skipping", payment_id);
            return Ok(Reconciliation::new(
                payment_id,
                &payment,
                ReconcileOutcome::AlreadyDelivered,
            ));
        }

        let order = match FulfillmentOrder::from_payment(&payment, self.dispatcher.catalog()) {
            Ok(order) => order,
            Err(reason) => {
                error!("Payment {} approved but delivery blocked: {}", payment_id, reason);
                return Ok(Reconciliation::new(
                    payment_id,
                    &payment,
                    ReconcileOutcome::Blocked { reason },
                ));
            }
        };

        let attempt = self.dispatcher.deliver(&order).await;
        let outcome = match &attempt.outcome {
            DeliveryOutcome::Delivered { .. } => {
                match self.store.mark_processed(payment_id).await {
                    Ok(true) => info!("Payment {} delivered and marked processed", payment_id),
                    Ok(false) => warn!("Payment {} was already marked processed", payment_id),
                    // The email is out; report the delivery even though a later call may resend.
                    Err(e) => error!("Payment {} delivered but not recorded: {}", payment_id, e),
                }
                ReconcileOutcome::Delivered { attempt }
            }
            DeliveryOutcome::NoAttachments => ReconcileOutcome::Blocked {
                reason: BlockedReason::NoDeliverableFiles {
                    product_id: order.product_id.clone(),
                },
            },
            _ => {
                warn!("Delivery for payment {} failed, left retryable", payment_id);
                ReconcileOutcome::DeliveryFailed { attempt }
            }
        };

        Ok(Reconciliation::new(payment_id, &payment, outcome))
    }

    async fn fetch_payment(&self, payment_id: &str) -> FulfillmentResult<PaymentRecord> {
        match tokio::time::timeout(self.provider_timeout, self.provider.get_payment(payment_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FulfillmentError::UpstreamUnavailable {
                provider: self.provider.provider_name().to_string(),
                message: format!(
                    "payment lookup timed out after {}s",
                    self.provider_timeout.as_secs()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::files::MemoryFileStore;
    use crate::gateway::{GatewayReceipt, NotificationGateway, OutboundEmail};
    use crate::order::{CheckoutOrder, CheckoutSession};
    use crate::product::ProductCatalog;
    use crate::provider::{CheckoutUrls, PaymentProvider};
    use crate::store::{InMemoryProcessedStore, ProcessedStore};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves payments from a map; `down` simulates an unreachable provider
    #[derive(Default)]
    struct FakeProvider {
        payments: Mutex<HashMap<String, PaymentRecord>>,
        down: bool,
        delay: Option<Duration>,
        lookups: AtomicUsize,
    }

    impl FakeProvider {
        fn with_payment(payment: PaymentRecord) -> Self {
            let provider = Self::default();
            provider.put(payment);
            provider
        }

        fn put(&self, payment: PaymentRecord) {
            self.payments
                .lock()
                .unwrap()
                .insert(payment.id.clone(), payment);
        }
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_checkout(
            &self,
            _order: &CheckoutOrder,
            _urls: &CheckoutUrls,
        ) -> FulfillmentResult<CheckoutSession> {
            Err(FulfillmentError::Internal("not used".into()))
        }

        async fn get_payment(&self, payment_id: &str) -> FulfillmentResult<PaymentRecord> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.down {
                return Err(FulfillmentError::UpstreamUnavailable {
                    provider: "fake".into(),
                    message: "connection refused".into(),
                });
            }
            self.payments
                .lock()
                .unwrap()
                .get(payment_id)
                .cloned()
                .ok_or_else(|| FulfillmentError::PaymentNotFound {
                    payment_id: payment_id.to_string(),
                })
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    /// Counts sends; replies are taken from a script, then default to accepted
    #[derive(Default)]
    struct CountingGateway {
        sends: AtomicUsize,
        script: Mutex<VecDeque<Result<GatewayReceipt, GatewayError>>>,
        delay: Option<Duration>,
    }

    impl CountingGateway {
        fn failing_once() -> Self {
            let gateway = Self::default();
            gateway
                .script
                .lock()
                .unwrap()
                .push_back(Err(GatewayError::Transport("smtp down".into())));
            gateway
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationGateway for CountingGateway {
        async fn send(&self, _email: &OutboundEmail) -> Result<GatewayReceipt, GatewayError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GatewayReceipt::accepted(Some("msg".into()))))
        }

        fn gateway_name(&self) -> &'static str {
            "counting"
        }
    }

    fn approved(id: &str) -> PaymentRecord {
        PaymentRecord::new(id, PaymentStatus::Approved)
            .with_amount(2450.0)
            .with_reference("order_tracker-habitos_abc")
            .with_metadata("customer_email", "a@b.com")
            .with_metadata("first_name", "Ana")
            .with_metadata("product_id", "tracker-habitos")
            .with_metadata("product_title", "Tracker de Hábitos")
    }

    struct Harness {
        reconciler: Arc<PaymentReconciler>,
        provider: Arc<FakeProvider>,
        gateway: Arc<CountingGateway>,
        store: InMemoryProcessedStore,
    }

    fn harness_with(provider: FakeProvider, gateway: CountingGateway, files: MemoryFileStore) -> Harness {
        let provider = Arc::new(provider);
        let gateway = Arc::new(gateway);
        let store = InMemoryProcessedStore::new();
        let dispatcher = FulfillmentDispatcher::new(
            Arc::new(ProductCatalog::builtin()),
            Arc::new(files),
            gateway.clone(),
        );
        let reconciler =
            PaymentReconciler::new(provider.clone(), Arc::new(dispatcher), Arc::new(store.clone()));
        Harness {
            reconciler: Arc::new(reconciler),
            provider,
            gateway,
            store,
        }
    }

    fn harness(provider: FakeProvider) -> Harness {
        harness_with(
            provider,
            CountingGateway::default(),
            MemoryFileStore::new().with_file("tracker-habitos.xlsx", b"habits".to_vec()),
        )
    }

    fn payment_notification(id: &str) -> PaymentNotification {
        PaymentNotification {
            topic: Some("payment".into()),
            action: Some("payment.updated".into()),
            resource_id: Some(id.into()),
        }
    }

    #[tokio::test]
    async fn test_second_confirmation_does_not_resend() {
        let h = harness(FakeProvider::with_payment(approved("123")));

        let first = h.reconciler.confirm(Some("123")).await.unwrap();
        assert!(matches!(first.outcome, ReconcileOutcome::Delivered { .. }));
        assert!(first.is_success());
        assert!(h.store.contains("123").await.unwrap());

        let second = h.reconciler.confirm(Some("123")).await.unwrap();
        assert!(matches!(second.outcome, ReconcileOutcome::AlreadyDelivered));
        assert!(second.is_success());
        assert!(second.email_sent());

        let ack = h.reconciler.handle_notification(&payment_notification("123")).await;
        assert_eq!(ack.status, AckStatus::Ok);
        assert_eq!(ack.outcome, Some("already_delivered"));

        assert_eq!(h.gateway.sends(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_entries_send_once() {
        let gateway = CountingGateway {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let h = harness_with(
            FakeProvider::with_payment(approved("123")),
            gateway,
            MemoryFileStore::new().with_file("tracker-habitos.xlsx", b"habits".to_vec()),
        );

        let mut tasks = Vec::new();
        for i in 0..16 {
            let reconciler = h.reconciler.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    reconciler.confirm(Some("123")).await.unwrap().email_sent()
                } else {
                    reconciler
                        .handle_notification(&payment_notification("123"))
                        .await
                        .status
                        == AckStatus::Ok
                }
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(h.gateway.sends(), 1);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_non_approved_statuses_never_send() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::InProcess,
            PaymentStatus::Rejected,
            PaymentStatus::Cancelled,
            PaymentStatus::Refunded,
            PaymentStatus::Unknown,
        ] {
            let mut payment = approved("456");
            payment.status = status;
            let h = harness(FakeProvider::with_payment(payment));

            let result = h.reconciler.confirm(Some("456")).await.unwrap();
            assert!(matches!(result.outcome, ReconcileOutcome::NotApproved));
            assert!(!result.is_success());
            assert_eq!(result.status, status);

            let ack = h.reconciler.handle_notification(&payment_notification("456")).await;
            assert_eq!(ack.outcome, Some("not_approved"));

            assert_eq!(h.gateway.sends(), 0);
            assert!(h.store.is_empty());
        }
    }

    #[tokio::test]
    async fn test_pending_then_approved_delivers() {
        let mut pending = approved("456");
        pending.status = PaymentStatus::Pending;
        let h = harness(FakeProvider::with_payment(pending));

        let result = h.reconciler.confirm(Some("456")).await.unwrap();
        assert!(matches!(result.outcome, ReconcileOutcome::NotApproved));

        h.provider.put(approved("456"));
        let result = h.reconciler.confirm(Some("456")).await.unwrap();
        assert!(matches!(result.outcome, ReconcileOutcome::Delivered { .. }));
        assert_eq!(h.gateway.sends(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_blocks_and_does_not_mark() {
        let h = harness_with(
            FakeProvider::with_payment(approved("123")),
            CountingGateway::default(),
            MemoryFileStore::new(),
        );

        let result = h.reconciler.confirm(Some("123")).await.unwrap();
        match result.outcome {
            ReconcileOutcome::Blocked {
                reason: BlockedReason::NoDeliverableFiles { ref product_id },
            } => assert_eq!(product_id, "tracker-habitos"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.gateway.sends(), 0);
        assert!(!h.store.contains("123").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_recipient_blocks_and_allows_retry() {
        let mut payment = approved("123");
        payment.metadata.remove("customer_email");
        let h = harness(FakeProvider::with_payment(payment));

        let result = h.reconciler.confirm(Some("123")).await.unwrap();
        assert!(matches!(
            result.outcome,
            ReconcileOutcome::Blocked {
                reason: BlockedReason::MissingRecipient
            }
        ));
        assert!(result.status.is_approved());
        assert!(result.message().contains("missing recipient"));
        assert!(!h.store.contains("123").await.unwrap());

        h.provider.put(approved("123"));
        let result = h.reconciler.confirm(Some("123")).await.unwrap();
        assert!(matches!(result.outcome, ReconcileOutcome::Delivered { .. }));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_retried() {
        let h = harness_with(
            FakeProvider::with_payment(approved("123")),
            CountingGateway::failing_once(),
            MemoryFileStore::new().with_file("tracker-habitos.xlsx", b"habits".to_vec()),
        );

        let first = h.reconciler.confirm(Some("123")).await.unwrap();
        assert!(matches!(first.outcome, ReconcileOutcome::DeliveryFailed { .. }));
        assert!(!first.email_sent());
        assert!(!h.store.contains("123").await.unwrap());

        let ack = h.reconciler.handle_notification(&payment_notification("123")).await;
        assert_eq!(ack.outcome, Some("delivered"));
        assert_eq!(h.gateway.sends(), 2);
        assert!(h.store.contains("123").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_identifier() {
        let h = harness(FakeProvider::default());

        assert!(matches!(
            h.reconciler.confirm(None).await,
            Err(FulfillmentError::MissingIdentifier)
        ));
        assert!(matches!(
            h.reconciler.confirm(Some("  ")).await,
            Err(FulfillmentError::MissingIdentifier)
        ));

        let mut notification = payment_notification("x");
        notification.resource_id = None;
        let ack = h.reconciler.handle_notification(&notification).await;
        assert_eq!(ack.status, AckStatus::Ignored);
        assert_eq!(h.provider.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_payment_notification_ignored() {
        let h = harness(FakeProvider::with_payment(approved("123")));
        let notification = PaymentNotification {
            topic: Some("merchant_order".into()),
            action: None,
            resource_id: Some("123".into()),
        };

        let ack = h.reconciler.handle_notification(&notification).await;
        assert_eq!(ack.status, AckStatus::Ignored);
        assert_eq!(h.provider.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(h.gateway.sends(), 0);
    }

    #[tokio::test]
    async fn test_provider_down() {
        let h = harness(FakeProvider {
            down: true,
            ..Default::default()
        });

        let err = h.reconciler.confirm(Some("789")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::UpstreamUnavailable { .. }));
        assert!(err.is_retryable());

        let ack = h.reconciler.handle_notification(&payment_notification("789")).await;
        assert_eq!(ack.status, AckStatus::Error);
        assert_eq!(ack.error, Some("upstream_unavailable"));
        assert_eq!(ack.payment_id.as_deref(), Some("789"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_is_upstream_unavailable() {
        let provider = FakeProvider {
            delay: Some(Duration::from_secs(60)),
            ..FakeProvider::default()
        };
        provider.put(approved("789"));
        let h = harness(provider);
        let reconciler = Arc::try_unwrap(h.reconciler)
            .ok()
            .unwrap()
            .with_provider_timeout(Duration::from_secs(2));

        let err = reconciler.confirm(Some("789")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::UpstreamUnavailable { .. }));
        assert_eq!(h.gateway.sends(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_provider_timeout_acks_error() {
        let provider = FakeProvider {
            delay: Some(Duration::from_secs(60)),
            ..FakeProvider::default()
        };
        provider.put(approved("789"));
        let h = harness(provider);
        let reconciler = Arc::try_unwrap(h.reconciler)
            .ok()
            .unwrap()
            .with_provider_timeout(Duration::from_secs(2));

        let ack = reconciler
            .handle_notification(&payment_notification("789"))
            .await;
        assert_eq!(ack.status, AckStatus::Error);
        assert_eq!(ack.error, Some("upstream_unavailable"));
        assert_eq!(ack.payment_id.as_deref(), Some("789"));
        assert_eq!(h.gateway.sends(), 0);
        assert!(!h.store.contains("789").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let h = harness(FakeProvider::default());
        let err = h.reconciler.confirm(Some("nope")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::PaymentNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_reconciliation_serializes_flat() {
        let payment = approved("123");
        let reconciliation = Reconciliation::new(
            "123",
            &payment,
            ReconcileOutcome::Blocked {
                reason: BlockedReason::MissingRecipient,
            },
        );
        let json = serde_json::to_value(&reconciliation).unwrap();
        assert_eq!(json["outcome"], "blocked");
        assert_eq!(json["reason"]["kind"], "missing_recipient");
        assert_eq!(json["status"], "approved");
    }
}
