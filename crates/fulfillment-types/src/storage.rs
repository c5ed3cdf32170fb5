//! Document-store collections and query types.
//!
//! The store speaks a small filter/update language instead of exposing
//! backend-native queries. Filters are conjunctions of per-field
//! conditions; updates are `$set`/`$push`-style mutations. A filtered
//! update is the engine's only concurrency primitive: a precondition that
//! no longer holds simply matches zero documents.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Document collections used by the fulfillment engine.
///
/// Collection names are shared with the unmigrated cart/catalog system and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
	/// Order documents.
	Orders,
	/// Notification documents.
	Notifications,
	/// Registered accounts (read-only collaborator data).
	Accounts,
	/// Persistent carts (best-effort collaborator data).
	Carts,
}

impl Collection {
	/// Returns the wire name of the collection.
	pub fn as_str(&self) -> &'static str {
		match self {
			Collection::Orders => "orders",
			Collection::Notifications => "notifications",
			Collection::Accounts => "users",
			Collection::Carts => "carts",
		}
	}
}

impl FromStr for Collection {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"notifications" => Ok(Self::Notifications),
			"users" => Ok(Self::Accounts),
			"carts" => Ok(Self::Carts),
			_ => Err(()),
		}
	}
}

impl From<Collection> for &'static str {
	fn from(collection: Collection) -> Self {
		collection.as_str()
	}
}

/// A single per-field condition.
#[derive(Debug, Clone)]
pub enum Condition {
	/// Field equals the value.
	Eq(Value),
	/// Field differs from the value (a missing field differs from any
	/// value).
	Ne(Value),
	/// Field equals one of the values.
	In(Vec<Value>),
	/// Field orders at or below the value.
	Lte(Value),
	/// Field presence check.
	Exists(bool),
}

/// Conjunction of per-field conditions; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
	clauses: Vec<(String, Condition)>,
}

impl Filter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an arbitrary condition on a field.
	pub fn field(mut self, name: impl Into<String>, condition: Condition) -> Self {
		self.clauses.push((name.into(), condition));
		self
	}

	/// Adds an equality condition.
	pub fn eq(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.field(name, Condition::Eq(value.into()))
	}

	/// Matches a document against every clause.
	pub fn matches(&self, document: &Value) -> bool {
		self.clauses.iter().all(|(name, condition)| {
			let field = lookup(document, name);
			match condition {
				Condition::Eq(value) => field == Some(value),
				Condition::Ne(value) => field != Some(value),
				Condition::In(values) => field.is_some_and(|f| values.iter().any(|v| f == v)),
				Condition::Lte(value) => field.is_some_and(|f| {
					compare(f, value).is_some_and(|ord| ord != Ordering::Greater)
				}),
				Condition::Exists(expected) => {
					(field.is_some_and(|f| !f.is_null())) == *expected
				},
			}
		})
	}
}

/// A `$set`/`$push`-style document mutation.
#[derive(Debug, Clone, Default)]
pub struct Update {
	sets: Vec<(String, Value)>,
	pushes: Vec<(String, Value)>,
}

impl Update {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a field to a value, creating it when absent.
	pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.sets.push((name.into(), value.into()));
		self
	}

	/// Appends a value to an array field, creating the array when absent.
	pub fn push(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.pushes.push((name.into(), value.into()));
		self
	}

	/// Applies the mutation to a document in place.
	pub fn apply(&self, document: &mut Value) {
		for (name, value) in &self.sets {
			if let Some(object) = document.as_object_mut() {
				object.insert(name.clone(), value.clone());
			}
		}
		for (name, value) in &self.pushes {
			if let Some(object) = document.as_object_mut() {
				let entry = object
					.entry(name.clone())
					.or_insert_with(|| Value::Array(Vec::new()));
				if let Some(array) = entry.as_array_mut() {
					array.push(value.clone());
				}
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.sets.is_empty() && self.pushes.is_empty()
	}
}

/// Sort direction for `find_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	Ascending,
	Descending,
}

/// Pagination and ordering options for `find_many`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
	pub sort: Option<(String, SortOrder)>,
	pub limit: Option<usize>,
	pub skip: usize,
}

impl FindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
		self.sort = Some((field.into(), order));
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn skip(mut self, skip: usize) -> Self {
		self.skip = skip;
		self
	}
}

/// Resolves a possibly dotted field path inside a document.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
	let mut current = document;
	for segment in path.split('.') {
		current = current.get(segment)?;
	}
	Some(current)
}

/// Orders two JSON scalars.
///
/// Numbers compare numerically. Strings that both parse as RFC 3339
/// timestamps compare as instants (serialized timestamps may differ in
/// subsecond precision, which breaks lexicographic order); other strings
/// compare lexicographically. Mixed types do not compare.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
	match (left, right) {
		(Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
		(Value::String(l), Value::String(r)) => {
			match (parse_instant(l), parse_instant(r)) {
				(Some(lt), Some(rt)) => Some(lt.cmp(&rt)),
				_ => Some(l.cmp(r)),
			}
		},
		_ => None,
	}
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.ok()
		.map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn filter_matches_conjunction() {
		let doc = json!({"id": "o1", "status": "pending", "pricing": {"total": 5}});
		assert!(Filter::new().eq("id", "o1").eq("status", "pending").matches(&doc));
		assert!(!Filter::new().eq("id", "o1").eq("status", "shipping").matches(&doc));
		assert!(Filter::new().eq("pricing.total", 5).matches(&doc));
	}

	#[test]
	fn filter_in_and_exists() {
		let doc = json!({"status": "shipping"});
		let filter = Filter::new()
			.field(
				"status",
				Condition::In(vec![json!("processing"), json!("shipping")]),
			)
			.field("deliveredAt", Condition::Exists(false));
		assert!(filter.matches(&doc));

		let delivered = json!({"status": "shipping", "deliveredAt": "2026-01-01T00:00:00Z"});
		assert!(!filter.matches(&delivered));
	}

	#[test]
	fn lte_compares_timestamps_across_precision() {
		let earlier = json!("2026-01-01T00:00:00.123456Z");
		let later = json!("2026-01-02T00:00:00Z");
		assert_eq!(compare(&earlier, &later), Some(Ordering::Less));

		let doc = json!({"confirmedAt": "2026-01-01T00:00:00.123456Z"});
		assert!(Filter::new()
			.field("confirmedAt", Condition::Lte(json!("2026-01-01T12:00:00Z")))
			.matches(&doc));
	}

	#[test]
	fn update_sets_and_pushes() {
		let mut doc = json!({"status": "pending", "statusHistory": [{"status": "pending"}]});
		Update::new()
			.set("status", "confirmed")
			.push("statusHistory", json!({"status": "confirmed"}))
			.apply(&mut doc);
		assert_eq!(doc["status"], "confirmed");
		assert_eq!(doc["statusHistory"].as_array().unwrap().len(), 2);
	}
}
