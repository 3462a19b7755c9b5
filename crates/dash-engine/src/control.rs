//! Control action coordinator.
//!
//! Issues start/stop/restart/remove commands against records.  Every
//! command kills the record's preview session before the backend request is
//! sent, so a stale engine never holds the sink across a state transition.
//! On success the registry is re-fetched whole (replace, not merge) so
//! downstream state — including `pid` — reflects the new encoder state.
//! Failures are logged and never retried; the dashboard stays stale until
//! the next channel batch or refresh corrects it.

use dash_proto::record::{RecordId, StreamRecord};
use tracing::{debug, warn};

use crate::http::ApiClient;
use crate::pool::SessionPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start(RecordId),
    Stop(RecordId),
    Restart(RecordId),
    Remove(RecordId),
}

impl ControlCommand {
    pub fn record_id(&self) -> RecordId {
        match self {
            ControlCommand::Start(id)
            | ControlCommand::Stop(id)
            | ControlCommand::Restart(id)
            | ControlCommand::Remove(id) => *id,
        }
    }
}

/// A validated request, with the stop pid already extracted from the record.
enum BackendCall {
    Start(RecordId),
    Stop(u32),
    Restart(RecordId),
    Remove(RecordId),
}

pub struct ControlCoordinator {
    api: ApiClient,
}

impl ControlCoordinator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Run one command.  Returns the fresh record list when the backend
    /// accepted it, `None` when it was a local no-op or failed.
    pub async fn run(
        &self,
        command: ControlCommand,
        record: &StreamRecord,
        pool: &mut SessionPool,
    ) -> Option<Vec<StreamRecord>> {
        // Resolve the backend call up front.  Stopping something that is
        // not running is a full local no-op: the preview is left alone and
        // nothing is sent.
        let call = match command {
            ControlCommand::Start(id) => BackendCall::Start(id),
            ControlCommand::Stop(id) => match record.pid {
                Some(pid) => BackendCall::Stop(pid),
                None => {
                    debug!("control: stop {} with no pid, ignoring", id);
                    return None;
                }
            },
            ControlCommand::Restart(id) => BackendCall::Restart(id),
            ControlCommand::Remove(id) => BackendCall::Remove(id),
        };

        // Destroy the preview first; this completes before any request goes
        // out.
        pool.reset(record.id);

        let result = match call {
            BackendCall::Start(id) => self.api.start_stream(id).await,
            BackendCall::Stop(pid) => self.api.stop_stream(pid).await,
            BackendCall::Restart(id) => self.api.restart(id).await,
            BackendCall::Remove(id) => self.api.delete_record(id).await,
        };

        if let Err(e) = result {
            warn!("control: {:?} failed: {}", command, e);
            return None;
        }

        self.refresh().await
    }

    /// Full re-fetch of the record list.
    pub async fn refresh(&self) -> Option<Vec<StreamRecord>> {
        match self.api.get_records().await {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("control: record refresh failed: {}", e);
                None
            }
        }
    }
}
