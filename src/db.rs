// ==========================================
// 资产层级导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 幂等建表：asset_node / import_job / config_kv
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接、建表，并包装为各仓储共享的连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 幂等建表
///
/// 说明：
/// - asset_node 的上级外键为 DEFERRABLE INITIALLY DEFERRED，
///   同一事务内子节点可以先于上级插入
/// - (company_id, external_id) 唯一性只约束未删除节点（部分索引）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS asset_node (
            internal_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            external_id TEXT NOT NULL,
            parent_internal_id TEXT
                REFERENCES asset_node(internal_id) DEFERRABLE INITIALLY DEFERRED,
            level INTEGER NOT NULL DEFAULT 0 CHECK (level >= 0),
            name TEXT NOT NULL,
            description TEXT,
            category TEXT,
            location TEXT,
            manufacturer TEXT,
            serial_number TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_asset_node_company_external_active
          ON asset_node(company_id, external_id) WHERE deleted_at IS NULL;

        CREATE INDEX IF NOT EXISTS idx_asset_node_parent
          ON asset_node(parent_internal_id);

        CREATE TABLE IF NOT EXISTS import_job (
            job_id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            file_name TEXT NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('uploading', 'processing', 'completed', 'error')),
            error_message TEXT,
            row_errors_json TEXT,
            result_summary_json TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_import_job_company_created
          ON import_job(company_id, created_at DESC);
        "#,
    )?;

    if read_schema_version(conn)?.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_active_external_id_unique_but_deleted_reusable() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        let insert = "INSERT INTO asset_node (internal_id, company_id, external_id, name, created_at, updated_at, deleted_at) \
                      VALUES (?1, 'c1', 'A1', 'Pump', 't', 't', ?2)";
        conn.execute(insert, rusqlite::params!["i-1", "t"]).unwrap();
        conn.execute(insert, rusqlite::params!["i-2", Option::<String>::None])
            .unwrap();

        // 第二个活动节点违反部分唯一索引
        assert!(conn
            .execute(insert, rusqlite::params!["i-3", Option::<String>::None])
            .is_err());
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
