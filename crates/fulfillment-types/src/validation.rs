//! Configuration validation types for type-safe TOML configs.
//!
//! Each pluggable implementation describes its configuration table as a
//! small schema of required and optional fields, validated before the
//! implementation is constructed.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong type.
	#[error("Type mismatch for field '{field}': expected {expected}")]
	TypeMismatch { field: String, expected: String },
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
}

/// One field of a configuration schema.
#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		match &self.field_type {
			FieldType::String => {
				if !value.is_str() {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "string".into(),
					});
				}
			},
			FieldType::Integer { min, max } => {
				let Some(n) = value.as_integer() else {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "integer".into(),
					});
				};
				if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
					return Err(ValidationError::InvalidValue {
						field: self.name.clone(),
						message: format!("{} is out of range", n),
					});
				}
			},
			FieldType::Boolean => {
				if !value.is_bool() {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "boolean".into(),
					});
				}
			},
		}
		Ok(())
	}
}

/// A validation schema: required fields that must be present and optional
/// fields that are checked only when present.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		for field in &self.required {
			match config.get(&field.name) {
				Some(value) => field.check(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}
		for field in &self.optional {
			if let Some(value) = config.get(&field.name) {
				field.check(value)?;
			}
		}
		Ok(())
	}
}

/// Trait implemented by every pluggable module's configuration schema.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("path", FieldType::String)],
			vec![Field::new(
				"limit",
				FieldType::Integer {
					min: Some(1),
					max: Some(100),
				},
			)],
		)
	}

	#[test]
	fn missing_required_field_is_rejected() {
		let config: toml::Value = toml::from_str("limit = 10").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::MissingField(f)) if f == "path"
		));
	}

	#[test]
	fn bounds_are_enforced() {
		let config: toml::Value = toml::from_str("path = \"/tmp\"\nlimit = 500").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::InvalidValue { .. })
		));

		let ok: toml::Value = toml::from_str("path = \"/tmp\"\nlimit = 50").unwrap();
		assert!(schema().validate(&ok).is_ok());
	}
}
