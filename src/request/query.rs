//! Ordered query parameters.

// crates.io
use url::form_urlencoded::{self, Serializer};
// self
use crate::_prelude::*;

/// Ordered list of query parameters; duplicate keys are allowed and order is preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);
impl QueryParams {
	/// Creates an empty parameter list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a parameter and returns the list (builder style).
	pub fn add(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.push(key, value);

		self
	}

	/// Appends a parameter in place.
	pub fn push(&mut self, key: impl Into<String>, value: impl Display) {
		self.0.push((key.into(), value.to_string()));
	}

	/// Returns every value stored under `key`, in insertion order.
	pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Iterates over `(key, value)` pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Returns the number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no parameters are stored.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Encodes the parameters as `application/x-www-form-urlencoded`.
	pub fn encode(&self) -> String {
		let mut serializer = Serializer::new(String::new());

		for (key, value) in &self.0 {
			serializer.append_pair(key, value);
		}

		serializer.finish()
	}

	/// Returns a copy where every `key` parameter equal to `old` now holds `new`.
	pub fn replace_value(&self, key: &str, old: &str, new: &str) -> Self {
		Self(
			self.0
				.iter()
				.map(|(k, v)| {
					if k == key && v == old { (k.clone(), new.to_owned()) } else { (k.clone(), v.clone()) }
				})
				.collect(),
		)
	}
}
impl Extend<(String, String)> for QueryParams {
	fn extend<I>(&mut self, iter: I)
	where
		I: IntoIterator<Item = (String, String)>,
	{
		self.0.extend(iter);
	}
}
impl IntoIterator for QueryParams {
	type IntoIter = std::vec::IntoIter<(String, String)>;
	type Item = (String, String);

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Display,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut params = Self::new();

		for (key, value) in iter {
			params.push(key, value);
		}

		params
	}
}

/// Rewrites `key=old` segments of a raw query string, leaving every other byte as-is.
pub(crate) fn rewrite_raw_query(raw: &str, key: &str, old: &str, new: &str) -> String {
	raw.split('&')
		.map(|segment| match form_urlencoded::parse(segment.as_bytes()).next() {
			Some((k, v)) if k == key && v == old => {
				let encoded = form_urlencoded::byte_serialize(new.as_bytes()).collect::<String>();

				format!("{key}={encoded}")
			},
			_ => segment.to_owned(),
		})
		.collect::<Vec<_>>()
		.join("&")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn duplicates_and_order_survive_encoding() {
		let params = QueryParams::new().add("ids", "MLA1").add("b", 2).add("ids", "MLA2");

		assert_eq!(params.encode(), "ids=MLA1&b=2&ids=MLA2");
		assert_eq!(params.get_all("ids").collect::<Vec<_>>(), ["MLA1", "MLA2"]);
		assert_eq!(params.len(), 3);
	}

	#[test]
	fn collects_from_pairs() {
		let params: QueryParams = [("q", "ipod nano"), ("limit", "5")].into_iter().collect();

		assert_eq!(params.encode(), "q=ipod+nano&limit=5");
	}

	#[test]
	fn raw_rewrite_keeps_foreign_segments_verbatim() {
		let rewritten =
			rewrite_raw_query("a=%7E&access_token=old&b&access_token=other", "access_token", "old", "n w");

		assert_eq!(rewritten, "a=%7E&access_token=n+w&b&access_token=other");
	}
}
