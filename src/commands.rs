use chrono::{DateTime, Utc};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use staffcache::cache::{EmployeeCache, PreferenceStore, RecordStore};
use staffcache::Employee;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Load employees from a YAML list, save them, and mark the cache fresh
  Seed { file: PathBuf },
  /// Print every cached employee
  List,
  /// Print one employee
  Get {
    id: i64,
    /// Keep printing whenever the employee changes (Ctrl-C to stop)
    #[arg(short, long)]
    watch: bool,
  },
  /// Show whether the cache is populated and expired
  Status,
  /// Mark the cache fresh without writing records
  Touch,
}

pub async fn run<S, P, W>(command: Command, cache: &EmployeeCache<S, P>, out: &mut W) -> Result<()>
where
  S: RecordStore,
  P: PreferenceStore,
  W: Write,
{
  match command {
    Command::Seed { file } => {
      let employees = load_seed(&file)?;
      let count = employees.len();
      cache.save_employees(employees).await?;
      cache.mark_fresh().await?;
      writeln!(out, "Cached {} employees", count)?;
    }
    Command::List => {
      let employees = cache.get_employees().await?;
      if employees.is_empty() {
        writeln!(out, "No cached employees")?;
      }
      for employee in &employees {
        writeln!(out, "{}", format_employee(employee))?;
      }
    }
    Command::Get { id, watch: false } => match cache.find_employee_by_id(id).await? {
      Some(employee) => writeln!(out, "{}", format_employee(&employee))?,
      None => return Err(eyre!("Employee {} not found", id)),
    },
    Command::Get { id, watch: true } => {
      let mut employees = cache.get_employee_by_id(id);
      loop {
        tokio::select! {
          _ = tokio::signal::ctrl_c() => break,
          next = employees.next() => match next {
            Some(employee) => {
              writeln!(out, "{}", format_employee(&employee?))?;
              out.flush()?;
            }
            None => break,
          },
        }
      }
    }
    Command::Status => {
      let populated = cache.is_cache().await?;
      let last = cache.last_cache_time();
      writeln!(out, "populated:  {}", populated)?;
      writeln!(out, "last cache: {}", format_timestamp(last))?;
      writeln!(out, "expired:    {}", cache.is_expired())?;
    }
    Command::Touch => {
      cache.mark_fresh().await?;
      writeln!(
        out,
        "Marked fresh at {}",
        format_timestamp(cache.last_cache_time())
      )?;
    }
  }

  Ok(())
}

fn load_seed(path: &Path) -> Result<Vec<Employee>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read seed file {}: {}", path.display(), e))?;

  serde_yaml::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse seed file {}: {}", path.display(), e))
}

fn format_employee(employee: &Employee) -> String {
  let mut line = format!("{:>6}  {}  <{}>", employee.id, employee.name, employee.email);
  if let Some(position) = &employee.position {
    line.push_str(&format!("  {}", position));
  }
  if let Some(phone) = &employee.phone {
    line.push_str(&format!("  {}", phone));
  }
  line
}

fn format_timestamp(millis: i64) -> String {
  if millis == 0 {
    return "never".to_string();
  }
  DateTime::<Utc>::from_timestamp_millis(millis)
    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use staffcache::cache::{EmployeeMapper, MemoryPreferences, SqliteRecordStore};
  use std::sync::Arc;
  use tokio::runtime::Handle;

  fn cache() -> EmployeeCache<SqliteRecordStore, MemoryPreferences> {
    EmployeeCache::new(
      Arc::new(SqliteRecordStore::open_in_memory().unwrap()),
      EmployeeMapper,
      Arc::new(MemoryPreferences::new()),
      Handle::current(),
    )
  }

  async fn run_to_string<S: RecordStore, P: PreferenceStore>(
    command: Command,
    cache: &EmployeeCache<S, P>,
  ) -> Result<String> {
    let mut out = Vec::new();
    run(command, cache, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
  }

  #[test]
  fn test_format_employee() {
    let e = Employee::new(12, "Linus", "linus@example.com").with_position("Maintainer");
    assert_eq!(
      format_employee(&e),
      "    12  Linus  <linus@example.com>  Maintainer"
    );
  }

  #[test]
  fn test_format_timestamp() {
    assert_eq!(format_timestamp(0), "never");
    assert_eq!(format_timestamp(86_400_000), "1970-01-02 00:00:00 UTC");
  }

  #[tokio::test]
  async fn test_seed_marks_fresh_and_lists() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("staff.yaml");
    std::fs::write(
      &seed,
      "- id: 2\n  name: Bob\n  email: bob@example.com\n- id: 1\n  name: Alice\n  email: alice@example.com\n",
    )
    .unwrap();

    let cache = cache();
    assert!(cache.is_expired());

    let out = run_to_string(Command::Seed { file: seed }, &cache).await.unwrap();
    assert_eq!(out, "Cached 2 employees\n");
    assert!(!cache.is_expired());

    let listed = run_to_string(Command::List, &cache).await.unwrap();
    let lines: Vec<_> = listed.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Alice"));
    assert!(lines[1].contains("Bob"));
  }

  #[tokio::test]
  async fn test_get_missing_employee_fails() {
    let cache = cache();
    let result = run_to_string(Command::Get { id: 5, watch: false }, &cache).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_get_existing_employee() {
    let cache = cache();
    cache
      .save_employees(vec![Employee::new(5, "Eve", "eve@example.com")])
      .await
      .unwrap();

    let out = run_to_string(Command::Get { id: 5, watch: false }, &cache)
      .await
      .unwrap();
    assert_eq!(out, "     5  Eve  <eve@example.com>\n");
  }

  #[tokio::test]
  async fn test_status_on_empty_cache() {
    let cache = cache();
    let out = run_to_string(Command::Status, &cache).await.unwrap();
    assert!(out.contains("populated:  false"));
    assert!(out.contains("last cache: never"));
    assert!(out.contains("expired:    true"));
  }
}
