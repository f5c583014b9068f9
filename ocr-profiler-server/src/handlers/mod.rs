pub mod health;
pub mod jobs;
pub mod languages;
pub mod profile;
pub mod queries;

/// Values of every `name=value` pair of a query string, in order.
pub(crate) fn values<'a>(
    params: &'a [(String, String)],
    name: &'a str,
) -> impl Iterator<Item = &'a str> {
    params
        .iter()
        .filter(move |(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
