//! Subject filters with NATS wildcards: `*` matches one token, a trailing
//! `>` matches one or more.

use shared_types::Component;

/// Subject a consumer for `component` listens on.
pub fn consumer_subject(component: &Component) -> String {
    component.subject()
}

/// Durable consumer name; unique per subject.
pub fn consumer_name(subject: &str) -> String {
    subject.replace(['.', '*', '>'], "_")
}

pub fn archive_subject(evt_id: &str) -> String {
    format!("{}.{evt_id}", crate::ARCHIVE_SUBJECT_PREFIX)
}

pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split('.');
    let mut subject_tokens = subject.split('.');
    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return filter_tokens.next().is_none(),
            (Some("*"), Some(_)) => {}
            (Some(f), Some(s)) if f == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
