//! Decoding of Splunk's XML (Atom) responses: the submit response carrying the
//! search id, and the job document carrying `dispatchState`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::ProtocolError;
use crate::models::splunk::{DispatchState, JobHandle};

const REST_NAMESPACE: &[u8] = b"http://dev.splunk.com/ns/rest";
const DISPATCH_STATE_KEY: &[u8] = b"dispatchState";

fn markup_error(e: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::Markup(e.to_string())
}

fn is_dispatch_state_key(element: &BytesStart<'_>) -> Result<bool, ProtocolError> {
    let name = element.try_get_attribute("name").map_err(markup_error)?;
    Ok(name.is_some_and(|attr| attr.value.as_ref() == DISPATCH_STATE_KEY))
}

/// Extract `<s:key name="dispatchState">` from a job document.
///
/// Unknown values are rejected rather than mapped to a default: treating them
/// as "still running" could poll forever, treating them as done could fetch
/// results that do not exist.
pub fn parse_dispatch_state(raw: &str) -> Result<DispatchState, ProtocolError> {
    let mut reader = NsReader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_resolved_event().map_err(markup_error)? {
            (ResolveResult::Bound(Namespace(ns)), Event::Start(element))
                if !capturing && ns == REST_NAMESPACE && element.local_name().as_ref() == b"key" =>
            {
                capturing = is_dispatch_state_key(&element)?;
            }
            (ResolveResult::Bound(Namespace(ns)), Event::Empty(element))
                if ns == REST_NAMESPACE && element.local_name().as_ref() == b"key" =>
            {
                if is_dispatch_state_key(&element)? {
                    return Err(ProtocolError::UnknownDispatchState(String::new()));
                }
            }
            (_, Event::Text(t)) if capturing => {
                text.push_str(&t.unescape().map_err(markup_error)?);
            }
            (_, Event::CData(c)) if capturing => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            (_, Event::Start(_)) if capturing => {
                return Err(ProtocolError::Markup(
                    "dispatchState key contains nested elements".to_string(),
                ));
            }
            (_, Event::End(_)) if capturing => {
                let value = text.trim();
                return value
                    .parse()
                    .map_err(|_| ProtocolError::UnknownDispatchState(value.to_string()));
            }
            (_, Event::Eof) => return Err(ProtocolError::MissingField("dispatchState")),
            _ => {}
        }
    }
}

/// Extract the `<sid>` of a freshly created job.
pub fn parse_job_handle(raw: &str) -> Result<JobHandle, ProtocolError> {
    let mut reader = NsReader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut capturing = false;
    let mut sid = String::new();

    loop {
        match reader.read_event().map_err(markup_error)? {
            Event::Start(element) if !capturing && element.local_name().as_ref() == b"sid" => {
                capturing = true;
            }
            Event::Text(t) if capturing => sid.push_str(&t.unescape().map_err(markup_error)?),
            Event::End(_) if capturing => break,
            Event::Eof => break,
            _ => {}
        }
    }

    let sid = sid.trim();
    if sid.is_empty() {
        return Err(ProtocolError::MissingField("sid"));
    }
    Ok(JobHandle::new(sid.to_string()))
}
