use super::message::{Headers, NotificationKind};
use std::fmt::Write;

pub const SEARCH_REQUEST_LINE: &str = "M-SEARCH * HTTP/1.1";
pub const NOTIFY_REQUEST_LINE: &str = "NOTIFY * HTTP/1.1";
pub const RESPONSE_STATUS_LINE: &str = "HTTP/1.1 200 OK";
/// Inbound queries are recognised by this status-line prefix.
pub const SEARCH_STATUS_PREFIX: &str = "M-SEARCH * HTTP";

pub const HEADER_HOST: &str = "Host";
pub const HEADER_MAN: &str = "Man";
pub const HEADER_SEARCH_TARGET: &str = "ST";
pub const HEADER_NOTIFICATION_TYPE: &str = "NT";
pub const HEADER_NOTIFICATION_SUBTYPE: &str = "NTS";
pub const HEADER_USN: &str = "USN";

pub const DISCOVER_DIRECTIVE: &str = "\"ssdp:discover\"";
/// Search target matching every service a producer advertises.
pub const WILDCARD_TARGET: &str = "ssdp:all";

const CRLF: &str = "\r\n";

/// Builds an `M-SEARCH` query addressed to the multicast group.
pub fn compose_search(
    service_type: Option<&str>,
    broadcast_host: &str,
    broadcast_port: u16,
    extra_params: &Headers,
) -> Vec<u8> {
    let mut out = String::with_capacity(128);
    push_line(&mut out, SEARCH_REQUEST_LINE);
    push_header(&mut out, HEADER_HOST, &format!("{}:{}", broadcast_host, broadcast_port));
    push_header(&mut out, HEADER_MAN, DISCOVER_DIRECTIVE);
    if let Some(st) = service_type {
        push_header(&mut out, HEADER_SEARCH_TARGET, st);
    }
    push_params(&mut out, extra_params);
    out.push_str(CRLF);
    out.into_bytes()
}

/// Builds an `alive` or `byebye` advertisement for one service.
pub fn compose_notify(
    kind: NotificationKind,
    service_type: &str,
    uuid: &str,
    broadcast_host: &str,
    broadcast_port: u16,
    params: &Headers,
) -> Vec<u8> {
    let mut out = String::with_capacity(160);
    push_line(&mut out, NOTIFY_REQUEST_LINE);
    push_header(&mut out, HEADER_HOST, &format!("{}:{}", broadcast_host, broadcast_port));
    push_header(&mut out, HEADER_NOTIFICATION_SUBTYPE, kind.as_str());
    push_header(&mut out, HEADER_NOTIFICATION_TYPE, service_type);
    push_header(&mut out, HEADER_USN, &format_usn(uuid));
    push_params(&mut out, params);
    out.push_str(CRLF);
    out.into_bytes()
}

/// Builds the unicast reply a producer sends to a matching query.
pub fn compose_response(service_type: &str, uuid: &str, params: &Headers) -> Vec<u8> {
    let mut out = String::with_capacity(128);
    push_line(&mut out, RESPONSE_STATUS_LINE);
    push_header(&mut out, HEADER_SEARCH_TARGET, service_type);
    push_header(&mut out, HEADER_USN, &format_usn(uuid));
    push_params(&mut out, params);
    out.push_str(CRLF);
    out.into_bytes()
}

pub fn format_usn(uuid: &str) -> String {
    format!("uuid:{}", uuid)
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

fn push_header(out: &mut String, key: &str, value: &str) {
    // Writing into a String cannot fail.
    let _ = write!(out, "{}: {}{}", key, value, CRLF);
}

fn push_params(out: &mut String, params: &Headers) {
    for (key, value) in params.iter() {
        push_header(out, key, value);
    }
}
