//! Field-scoped validation errors and the messages reported to callers.
//!
//! Errors are collected per request into a [`FieldErrors`] map so every
//! problem is reported at once, keyed by the offending field name.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;
use serde_json::Value;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";
pub const NOT_A_STRING: &str = "Not a valid string.";
pub const OBJECT_DOES_NOT_EXIST: &str =
  "Invalid hyperlink - Object does not exist.";

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub fn invalid_choice(value: &str) -> String {
  format!("Select a valid choice. {value} is not one of the available choices.")
}

/// Map from field name to the human-readable problems found with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_owned()).or_default().push(message.into());
  }

  pub fn single(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.add(field, message);
    errors
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn get(&self, field: &str) -> Option<&[String]> {
    self.0.get(field).map(Vec::as_slice)
  }

  /// `Ok(value)` if no errors were recorded, otherwise `Err(self)`.
  pub fn finish<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }

  /// Check a mandatory string field: absent → required, empty → blank.
  pub fn required<'a>(
    &mut self,
    field: &str,
    value: Option<&'a str>,
  ) -> Option<&'a str> {
    match value {
      None => {
        self.add(field, REQUIRED);
        None
      }
      Some(v) => self.not_blank(field, v),
    }
  }

  /// Check that a supplied string field is not empty.
  pub fn not_blank<'a>(&mut self, field: &str, value: &'a str) -> Option<&'a str> {
    if value.trim().is_empty() {
      self.add(field, BLANK);
      None
    } else {
      Some(value)
    }
  }

  /// Parse an enumerated field, recording a choice error on failure.
  pub fn choice<T: FromStr>(&mut self, field: &str, value: &str) -> Option<T> {
    match value.parse() {
      Ok(v) => Some(v),
      Err(_) => {
        self.add(field, invalid_choice(value));
        None
      }
    }
  }

  /// A mandatory enumerated field.
  pub fn required_choice<T: FromStr>(
    &mut self,
    field: &str,
    value: Option<&str>,
  ) -> Option<T> {
    self.required(field, value).and_then(|v| self.choice(field, v))
  }

  // Body fields arrive as raw JSON; a mistyped value is an error on its field.

  /// An optional text field. Absent and `null` both read as `None`; numbers
  /// are taken in their decimal form.
  pub fn text(&mut self, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) => Some(s.clone()),
      Some(Value::Number(n)) => Some(n.to_string()),
      Some(_) => {
        self.add(field, NOT_A_STRING);
        None
      }
    }
  }

  /// A mandatory, non-blank text field.
  pub fn required_text(&mut self, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
      None => {
        self.add(field, REQUIRED);
        None
      }
      Some(Value::Null) => {
        self.add(field, NULL);
        None
      }
      Some(v) => self.present_text(field, v),
    }
  }

  /// A text field that must not be blank when it is given.
  pub fn present_text(&mut self, field: &str, value: &Value) -> Option<String> {
    let text = self.text(field, Some(value))?;
    self.not_blank(field, &text).map(str::to_owned)
  }

  /// An optional enumerated field. Anything but a string is an invalid
  /// choice, named by its JSON form.
  pub fn value_choice<T: FromStr>(&mut self, field: &str, value: Option<&Value>) -> Option<T> {
    match value {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) => self.choice(field, s),
      Some(other) => {
        self.add(field, invalid_choice(&other.to_string()));
        None
      }
    }
  }

  /// A mandatory enumerated field given as a JSON value.
  pub fn required_value_choice<T: FromStr>(
    &mut self,
    field: &str,
    value: Option<&Value>,
  ) -> Option<T> {
    match value {
      None => {
        self.add(field, REQUIRED);
        None
      }
      Some(Value::Null) => {
        self.add(field, NULL);
        None
      }
      Some(Value::String(s)) => self.required_choice(field, Some(s)),
      other => self.value_choice(field, other),
    }
  }
}

impl fmt::Display for FieldErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.0 {
      for m in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {m}")?;
        first = false;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::widget::WidgetType;

  #[test]
  fn missing_and_blank_are_distinguished() {
    let mut errors = FieldErrors::new();
    assert_eq!(errors.required("column", None), None);
    assert_eq!(errors.required("title", Some("  ")), None);
    assert_eq!(errors.required("view_type", Some("pie")), Some("pie"));

    assert_eq!(errors.get("column").unwrap(), [REQUIRED]);
    assert_eq!(errors.get("title").unwrap(), [BLANK]);
    assert!(errors.get("view_type").is_none());
  }

  #[test]
  fn choice_error_names_the_value() {
    let mut errors = FieldErrors::new();
    let parsed: Option<WidgetType> = errors.choice("widget_type", "table");
    assert!(parsed.is_none());
    assert_eq!(
      errors.get("widget_type").unwrap(),
      ["Select a valid choice. table is not one of the available choices."]
    );
  }

  #[test]
  fn serialises_as_plain_map() {
    let errors = FieldErrors::single("column", REQUIRED);
    assert_eq!(
      serde_json::to_value(&errors).unwrap(),
      serde_json::json!({ "column": ["This field is required."] })
    );
    assert_eq!(errors.to_string(), "column: This field is required.");
  }

  #[test]
  fn non_string_choice_is_named_by_its_json_form() {
    let mut errors = FieldErrors::new();
    let wt: Option<WidgetType> =
      errors.required_value_choice("widget_type", Some(&serde_json::json!(5)));
    let vt: Option<crate::widget::ViewType> =
      errors.value_choice("view_type", Some(&serde_json::json!(false)));
    assert!(wt.is_none() && vt.is_none());
    assert_eq!(
      errors.get("widget_type").unwrap(),
      ["Select a valid choice. 5 is not one of the available choices."]
    );
    assert_eq!(
      errors.get("view_type").unwrap(),
      ["Select a valid choice. false is not one of the available choices."]
    );
  }

  #[test]
  fn text_fields_accept_numbers_and_reject_structures() {
    let mut errors = FieldErrors::new();
    assert_eq!(errors.required_text("column", Some(&serde_json::json!(42))), Some("42".into()));
    assert_eq!(errors.required_text("group_by", Some(&serde_json::json!(["a"]))), None);
    assert_eq!(errors.required_text("title", Some(&Value::Null)), None);
    assert_eq!(errors.required_text("aggregation", None), None);
    assert_eq!(errors.text("description", Some(&Value::Null)), None);

    assert!(errors.get("column").is_none());
    assert!(errors.get("description").is_none());
    assert_eq!(errors.get("group_by").unwrap(), [NOT_A_STRING]);
    assert_eq!(errors.get("title").unwrap(), [NULL]);
    assert_eq!(errors.get("aggregation").unwrap(), [REQUIRED]);
  }

  #[test]
  fn present_text_rejects_blank() {
    let mut errors = FieldErrors::new();
    assert_eq!(errors.present_text("column", &serde_json::json!(" ")), None);
    assert_eq!(errors.get("column").unwrap(), [BLANK]);
  }

  #[test]
  fn finish_reports_collected_errors() {
    assert_eq!(FieldErrors::new().finish(3), Ok(3));
    assert!(FieldErrors::single("x", BLANK).finish(3).is_err());
  }
}
