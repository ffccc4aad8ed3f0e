use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use storeflow::errors::Result;
use storeflow::notify::{AssignmentNotice, Notifier};

/// A fake notifier that records every notice it is asked to deliver.
///
/// Set `fail` to make every delivery return an error, which the engine must
/// log and otherwise ignore.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<AssignmentNotice>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<AssignmentNotice> {
        self.sent.lock().unwrap().clone()
    }

    /// Names of the notified tasks, in delivery order.
    pub fn task_names(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.task_name).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_assignment(
        &self,
        notice: AssignmentNotice,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let sent = Arc::clone(&self.sent);
        let fail = self.fail;

        Box::pin(async move {
            {
                let mut guard = sent.lock().unwrap();
                guard.push(notice);
            }
            if fail {
                return Err(anyhow::anyhow!("notification transport unavailable").into());
            }
            Ok(())
        })
    }
}
