use raidbook_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::{info, warn};

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let raid_id = event.raid_id.as_ref().map_or("unknown", |id| id.0.as_str());
        let channel_id = event.channel_id.as_ref().map_or("unknown", |id| id.as_str());
        let metadata = format!("{:?}", event.metadata);

        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = %event.event_type,
                category = ?event.category,
                correlation_id = %event.correlation_id,
                raid_id,
                channel_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit event"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => warn!(
                event_name = %event.event_type,
                category = ?event.category,
                outcome = ?event.outcome,
                correlation_id = %event.correlation_id,
                raid_id,
                channel_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}
