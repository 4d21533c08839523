use crate::config::NotificationConfig;
use crate::notify::mailer::{EmailMessage, Mailer};
use crate::observability::MetricsRecorder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Configuration for the background notification worker
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&NotificationConfig> for DispatcherConfig {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Best-effort email delivery off the request path.
///
/// Messages are queued without waiting; a worker task sends them one at a
/// time and retries failures with exponential backoff. A message that
/// still fails after `max_attempts` is logged and dropped. The worker
/// exits once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<EmailMessage>,
    depth: Arc<AtomicUsize>,
}

impl NotificationDispatcher {
    /// Start the delivery worker
    pub fn spawn(mailer: Arc<dyn Mailer>, config: DispatcherConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        let handle = tokio::spawn(delivery_worker(receiver, depth.clone(), mailer, config));
        (Self { sender, depth }, handle)
    }

    /// Queue a message. Returns false when the queue is full or closed;
    /// the message is then dropped.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        // Counted before sending so the worker never decrements past zero
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.sender.try_send(message);
        if result.is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }

        match result {
            Ok(()) => {
                MetricsRecorder::set_notification_queue_depth(depth as i64);
                true
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(subject = %message.subject, "Notification queue full, dropping message");
                MetricsRecorder::record_notification("dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                error!(subject = %message.subject, "Notification worker stopped, dropping message");
                MetricsRecorder::record_notification("dropped");
                false
            }
        }
    }

    /// Messages waiting for the worker
    pub fn queued(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

async fn delivery_worker(
    mut receiver: mpsc::Receiver<EmailMessage>,
    depth: Arc<AtomicUsize>,
    mailer: Arc<dyn Mailer>,
    config: DispatcherConfig,
) {
    info!(
        "Notification worker started (max_attempts={}, backoff_ms={})",
        config.max_attempts,
        config.retry_backoff.as_millis()
    );

    while let Some(message) = receiver.recv().await {
        let remaining = depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        MetricsRecorder::set_notification_queue_depth(remaining as i64);
        deliver_with_retry(mailer.as_ref(), &message, &config).await;
    }

    info!("Notification worker stopped");
}

/// Returns whether the message was eventually accepted
async fn deliver_with_retry(
    mailer: &dyn Mailer,
    message: &EmailMessage,
    config: &DispatcherConfig,
) -> bool {
    let mut delay = config.retry_backoff;

    for attempt in 1..=config.max_attempts {
        match mailer.send(message).await {
            Ok(()) => {
                MetricsRecorder::record_notification("delivered");
                return true;
            }
            Err(e) if attempt < config.max_attempts => {
                warn!(
                    subject = %message.subject,
                    attempt,
                    "Notification delivery failed, retrying in {:?}: {}",
                    delay,
                    e
                );
                MetricsRecorder::record_notification("retried");
                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => {
                error!(
                    subject = %message.subject,
                    attempts = attempt,
                    "Giving up on notification: {}",
                    e
                );
                MetricsRecorder::record_notification("failed");
            }
        }
    }

    false
}
