// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Dispatch fan-out to infrastructure subscribers
//
// Provides in-memory request streaming using tokio broadcast channels.
// Each connected infrastructure agent holds a filtered receiver and picks
// up the create/update/delete requests addressed to it.
//
// In-memory only: requests published while no agent is listening are lost.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::dispatch::{DispatchRequest, ExperimentNotifier, NotifyError};
use crate::domain::experiment::InfraId;

/// Default number of buffered requests before slow receivers lag
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1000;

/// Event bus carrying dispatch requests to subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DispatchRequest>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many requests can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }

    /// Publish a request to all subscribers; returns how many received it
    pub fn publish(&self, request: DispatchRequest) -> usize {
        debug!(
            infra_id = %request.infra_id,
            intent = %request.intent,
            "Publishing dispatch request"
        );

        // send() only fails when there are no receivers at all
        let receiver_count = self.sender.send(request).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to dispatch request");
        }
        receiver_count
    }

    /// Subscribe to every dispatch request
    pub fn subscribe(&self) -> DispatchReceiver {
        DispatchReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for one infrastructure
    pub fn subscribe_infra(&self, infra_id: InfraId) -> InfraDispatchReceiver {
        InfraDispatchReceiver {
            receiver: self.sender.subscribe(),
            infra_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ExperimentNotifier for EventBus {
    fn notify(&self, request: DispatchRequest) -> Result<(), NotifyError> {
        let infra_id = request.infra_id.clone();
        match self.publish(request) {
            0 => Err(NotifyError::NoSubscriber(infra_id)),
            _ => Ok(()),
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Dispatch receiver lagged by {} requests", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all dispatch requests
pub struct DispatchReceiver {
    receiver: broadcast::Receiver<DispatchRequest>,
}

impl DispatchReceiver {
    /// Receive the next request (waits until one is available)
    pub async fn recv(&mut self) -> Result<DispatchRequest, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive a request without waiting
    pub fn try_recv(&mut self) -> Result<DispatchRequest, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Dispatch receiver lagged by {} requests", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for one infrastructure's requests (filtered)
pub struct InfraDispatchReceiver {
    receiver: broadcast::Receiver<DispatchRequest>,
    infra_id: InfraId,
}

impl InfraDispatchReceiver {
    /// Receive the next request addressed to this receiver's infrastructure
    pub async fn recv(&mut self) -> Result<DispatchRequest, EventBusError> {
        loop {
            let request = self.receiver.recv().await.map_err(map_recv_error)?;
            if request.infra_id == self.infra_id {
                return Ok(request);
            }
        }
    }

    pub fn infra_id(&self) -> &InfraId {
        &self.infra_id
    }
}

/// Errors that can occur when receiving requests
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No requests available")]
    Empty,

    #[error("Receiver lagged by {0} requests (requests were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
