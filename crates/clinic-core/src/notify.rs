//! Notification boundary for appointment events.
//!
//! The core only emits events; delivery (WhatsApp, email, ...) lives behind a
//! [`NotificationSink`]. Emission happens after the owning transaction commits
//! and a failing sink never fails the scheduling operation.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Appointment, DATE_FORMAT, TIME_FORMAT};

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    Closed,

    #[error("Notification delivery failed: {0}")]
    Failed(String),
}

/// Kind of appointment event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentCreated,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AppointmentCreated => "appointment_created",
            NotificationKind::AppointmentConfirmed => "appointment_confirmed",
            NotificationKind::AppointmentCancelled => "appointment_cancelled",
            NotificationKind::AppointmentRescheduled => "appointment_rescheduled",
        }
    }
}

/// Event handed to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub appointment_id: String,
    pub contact_id: String,
    /// Date, time, type and status of the appointment
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    pub fn for_appointment(kind: NotificationKind, appointment: &Appointment) -> Self {
        Self {
            kind,
            appointment_id: appointment.id.clone(),
            contact_id: appointment.contact_id.clone(),
            payload: json!({
                "date": appointment.date.format(DATE_FORMAT).to_string(),
                "time": appointment.time.format(TIME_FORMAT).to_string(),
                "type": appointment.appointment_type.as_str(),
                "status": appointment.status.as_str(),
                "provider_id": appointment.provider_id,
            }),
        }
    }
}

/// Receiver of appointment events. Fire-and-forget from the core's view.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

impl<F> NotificationSink for F
where
    F: Fn(&NotificationEvent) -> Result<(), NotifyError> + Send + Sync,
{
    fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self(event)
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn emit(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Queues events on a channel for a delivery worker to drain.
pub struct ChannelNotifier {
    sender: Mutex<Sender<NotificationEvent>>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its queue.
    pub fn new() -> (Self, Receiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl NotificationSink for ChannelNotifier {
    fn emit(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| NotifyError::Failed(e.to_string()))?;
        sender.send(event.clone()).map_err(|_| NotifyError::Closed)
    }
}

/// Emit an event, logging and swallowing any failure.
pub(crate) fn emit_logged(sink: &dyn NotificationSink, event: NotificationEvent) {
    match sink.emit(&event) {
        Ok(()) => debug!(
            "Emitted {} for appointment {}",
            event.kind.as_str(),
            event.appointment_id
        ),
        Err(e) => warn!(
            "Failed to emit {} for appointment {}: {}",
            event.kind.as_str(),
            event.appointment_id,
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, AppointmentType, BookingSource};
    use chrono::{NaiveDate, NaiveTime};

    fn appointment() -> Appointment {
        Appointment {
            id: "a1".into(),
            contact_id: "c1".into(),
            patient_id: None,
            provider_id: Some("p1".into()),
            slot_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            appointment_type: AppointmentType::Consultation,
            source: BookingSource::Public,
            status: AppointmentStatus::Scheduled,
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_event_payload() {
        let event = NotificationEvent::for_appointment(
            NotificationKind::AppointmentCreated,
            &appointment(),
        );
        assert_eq!(event.payload["date"], "2024-01-15");
        assert_eq!(event.payload["time"], "09:00");
        assert_eq!(event.payload["type"], "CONSULTATION");
        assert_eq!(event.payload["status"], "SCHEDULED");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "appointment_created");
    }

    #[test]
    fn test_channel_notifier() {
        let (notifier, receiver) = ChannelNotifier::new();
        let event = NotificationEvent::for_appointment(
            NotificationKind::AppointmentConfirmed,
            &appointment(),
        );
        notifier.emit(&event).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), event);

        drop(receiver);
        assert!(matches!(notifier.emit(&event), Err(NotifyError::Closed)));
    }

    #[test]
    fn test_closure_sink_failure_is_swallowed() {
        let failing = |_: &NotificationEvent| -> Result<(), NotifyError> {
            Err(NotifyError::Failed("gateway down".into()))
        };
        let event = NotificationEvent::for_appointment(
            NotificationKind::AppointmentCancelled,
            &appointment(),
        );
        // Must not panic or propagate
        emit_logged(&failing, event);
    }
}
