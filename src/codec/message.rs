use serde::{Serialize, Serializer};

/// Insertion-ordered header map.
///
/// Keys are case-sensitive and unique; inserting an existing key replaces its
/// value in place, so the first position wins and the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers { entries: Vec::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Headers {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Notification subtype carried in the `NTS` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Alive,
    ByeBye,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Alive => "ssdp:alive",
            NotificationKind::ByeBye => "ssdp:byebye",
        }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "ssdp:alive" => Some(NotificationKind::Alive),
            "ssdp:byebye" => Some(NotificationKind::ByeBye),
            _ => None,
        }
    }
}

/// One parsed discovery datagram. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    status: String,
    headers: Headers,
    body: Option<String>,
}

impl Message {
    /// Parses raw datagram text.
    ///
    /// Line endings are normalised to `\n`, the header block ends at the first
    /// blank line, and header lines that do not match `key: value` are skipped.
    /// A value wrapped in double quotes is stored without them.
    pub fn parse(raw: &[u8]) -> Message {
        let text = String::from_utf8_lossy(raw).replace("\r\n", "\n");

        let (head, body) = match text.split_once("\n\n") {
            Some((head, rest)) => (head, (!rest.is_empty()).then(|| rest.to_string())),
            None => (text.as_str(), None),
        };

        let mut lines = head.split('\n');
        let status = lines.next().unwrap_or_default().to_string();

        let mut headers = Headers::new();
        for line in lines {
            if let Some((key, value)) = parse_header_line(line) {
                headers.insert(key, unquote(value));
            }
        }

        Message { status, headers, body }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn is_search_request(&self) -> bool {
        self.status.starts_with(super::SEARCH_STATUS_PREFIX)
    }

    /// `ST` header: the service type a query or response refers to.
    pub fn search_target(&self) -> Option<&str> {
        self.header(super::HEADER_SEARCH_TARGET)
    }

    /// `NT` header: the service type a notification refers to.
    pub fn notification_type(&self) -> Option<&str> {
        self.header(super::HEADER_NOTIFICATION_TYPE)
    }

    pub fn notification_kind(&self) -> Option<NotificationKind> {
        self.header(super::HEADER_NOTIFICATION_SUBTYPE)
            .and_then(NotificationKind::from_header)
    }

    pub fn usn(&self) -> Option<&str> {
        self.header(super::HEADER_USN)
    }
}

fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    if key.is_empty() {
        return None;
    }
    let last = rest.chars().next_back()?;
    let value = match rest.trim_start() {
        // An all-whitespace value keeps its final character.
        "" => &rest[rest.len() - last.len_utf8()..],
        value => value,
    };
    Some((key, value))
}

fn unquote(value: &str) -> &str {
    if value == "\"" {
        return "";
    }
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
