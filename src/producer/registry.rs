use crate::codec::Headers;

/// Headers a plain location string is stored under.
pub const AL_HEADER: &str = "AL";
pub const LOCATION_HEADER: &str = "LOCATION";

/// The headers a producer sends along with a service.
///
/// Built from a location string (stored as both `AL` and `LOCATION`) or from
/// an explicit header map, which is used as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceParams(Headers);

impl ServiceParams {
    pub fn location(location: &str) -> Self {
        ServiceParams(Headers::from([(AL_HEADER, location), (LOCATION_HEADER, location)]))
    }

    pub fn into_headers(self) -> Headers {
        self.0
    }
}

impl From<&str> for ServiceParams {
    fn from(location: &str) -> Self {
        ServiceParams::location(location)
    }
}

impl From<String> for ServiceParams {
    fn from(location: String) -> Self {
        ServiceParams::location(&location)
    }
}

impl From<Headers> for ServiceParams {
    fn from(headers: Headers) -> Self {
        ServiceParams(headers)
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ServiceParams {
    fn from(pairs: [(K, V); N]) -> Self {
        ServiceParams(Headers::from(pairs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service_type: String,
    pub params: Headers,
}

/// Services keyed by type, kept in the order they were first added.
#[derive(Debug, Default)]
pub(crate) struct ServiceRegistry {
    records: Vec<ServiceRecord>,
}

impl ServiceRegistry {
    /// Insert or replace; a replaced service keeps its position.
    pub(crate) fn insert(&mut self, record: ServiceRecord) {
        match self.records.iter_mut().find(|r| r.service_type == record.service_type) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub(crate) fn remove(&mut self, service_type: &str) -> Option<ServiceRecord> {
        let idx = self.records.iter().position(|r| r.service_type == service_type)?;
        Some(self.records.remove(idx))
    }

    pub(crate) fn get(&self, service_type: &str) -> Option<&ServiceRecord> {
        self.records.iter().find(|r| r.service_type == service_type)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<ServiceRecord> {
        self.records.clone()
    }
}
