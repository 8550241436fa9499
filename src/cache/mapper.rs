//! Conversion between the domain [`Employee`] and its persisted row form.

use rusqlite::Row;

use crate::model::{Employee, EmployeeId};

/// Persisted form of an employee: one row of the `employees` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRecord {
  pub id: EmployeeId,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub position: Option<String>,
  pub avatar_url: Option<String>,
}

impl EmployeeRecord {
  /// Column list matching [`EmployeeRecord::from_row`].
  pub(crate) const COLUMNS: &'static str = "id, name, email, phone, position, avatar_url";

  pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      name: row.get(1)?,
      email: row.get(2)?,
      phone: row.get(3)?,
      position: row.get(4)?,
      avatar_url: row.get(5)?,
    })
  }
}

/// Stateless mapper between [`Employee`] and [`EmployeeRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmployeeMapper;

impl EmployeeMapper {
  pub fn map_to_cached(&self, employee: &Employee) -> EmployeeRecord {
    EmployeeRecord {
      id: employee.id,
      name: employee.name.clone(),
      email: employee.email.clone(),
      phone: employee.phone.clone(),
      position: employee.position.clone(),
      avatar_url: employee.avatar_url.clone(),
    }
  }

  pub fn map_from_cached(&self, record: EmployeeRecord) -> Employee {
    Employee {
      id: record.id,
      name: record.name,
      email: record.email,
      phone: record.phone,
      position: record.position,
      avatar_url: record.avatar_url,
    }
  }
}
