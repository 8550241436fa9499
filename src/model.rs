//! Domain form of the cached entity.

use serde::{Deserialize, Serialize};

/// Primary key of an employee.
pub type EmployeeId = i64;

/// An employee as seen by callers of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub id: EmployeeId,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  /// Job title (e.g., "Android Developer")
  #[serde(default)]
  pub position: Option<String>,
  #[serde(default)]
  pub avatar_url: Option<String>,
}

impl Employee {
  /// Create an employee with only the required fields set.
  pub fn new(id: EmployeeId, name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      email: email.into(),
      phone: None,
      position: None,
      avatar_url: None,
    }
  }

  pub fn with_position(mut self, position: impl Into<String>) -> Self {
    self.position = Some(position.into());
    self
  }

  pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
    self.phone = Some(phone.into());
    self
  }
}
