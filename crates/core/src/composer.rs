//! Synthesizes a missing session end event from a session's event history.
//!
//! The composer keeps no state of its own. It re-derives its answer from the
//! recorded events every time it is asked, so calling it again after the end
//! event has landed yields nothing.

use crate::event::{
    AuditEvent, DesktopSessionEnd, DesktopSessionStart, EventMetadata, SessionEnd, SessionStart,
};
use time::OffsetDateTime;

/// The start event that determines which end event a session needs.
enum StartClass<'a> {
    Interactive(&'a SessionStart),
    Desktop(&'a DesktopSessionStart),
}

/// Return the end event `events` is missing, stamped with `now`.
///
/// Returns `None` when the session has no start event or already has the end
/// event matching its start.
pub fn compose_session_end(events: &[AuditEvent], now: OffsetDateTime) -> Option<AuditEvent> {
    let mut start: Option<StartClass<'_>> = None;
    let mut participants: Vec<String> = Vec::new();
    let mut interactive_ended = false;
    let mut desktop_ended = false;

    for event in events {
        match event {
            AuditEvent::SessionStart(e) => {
                if start.is_none() {
                    start = Some(StartClass::Interactive(e));
                }
                add_participant(&mut participants, &e.user);
            }
            AuditEvent::DesktopSessionStart(e) => {
                if start.is_none() {
                    start = Some(StartClass::Desktop(e));
                }
                add_participant(&mut participants, &e.user);
            }
            AuditEvent::SessionJoin(e) => add_participant(&mut participants, &e.user),
            AuditEvent::SessionEnd(_) => interactive_ended = true,
            AuditEvent::DesktopSessionEnd(_) => desktop_ended = true,
            AuditEvent::SessionUpload(_) => {}
        }
    }

    match start? {
        StartClass::Interactive(_) if interactive_ended => None,
        StartClass::Desktop(_) if desktop_ended => None,
        StartClass::Interactive(s) => Some(AuditEvent::SessionEnd(SessionEnd {
            metadata: EventMetadata::new(s.metadata.session_id, now),
            user: s.user.clone(),
            server_hostname: s.server_hostname.clone(),
            participants,
            session_start: s.metadata.time,
            session_stop: now,
        })),
        StartClass::Desktop(s) => Some(AuditEvent::DesktopSessionEnd(DesktopSessionEnd {
            metadata: EventMetadata::new(s.metadata.session_id, now),
            user: s.user.clone(),
            desktop_addr: s.desktop_addr.clone(),
            desktop_name: s.desktop_name.clone(),
            participants,
            start_time: s.metadata.time,
            end_time: now,
            recorded: true,
        })),
    }
}

fn add_participant(participants: &mut Vec<String>, user: &str) {
    if !user.is_empty() && !participants.iter().any(|p| p == user) {
        participants.push(user.to_string());
    }
}
