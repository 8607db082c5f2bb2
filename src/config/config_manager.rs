// ==========================================
// 资产层级导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigError, ImportConfigReader};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Clone)]
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        tracing::info!(key = %key, value = %value, "配置已更新");
        Ok(())
    }

    /// 读取数值配置；缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key = %key, value = %raw, default = %default, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有导入配置的快照（用于日志/排查）
    pub fn get_config_snapshot(&self) -> Result<HashMap<String, String>, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut snapshot = HashMap::new();
        for row in rows {
            let (k, v) = row?;
            snapshot.insert(k, v);
        }
        Ok(snapshot)
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_notify_threshold_secs(&self) -> Result<u64, ConfigError> {
        self.get_parsed_or_default(
            config_keys::NOTIFY_THRESHOLD_SECS,
            defaults::NOTIFY_THRESHOLD_SECS,
        )
    }

    async fn get_history_limit(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::HISTORY_LIMIT, defaults::HISTORY_LIMIT)
    }

    async fn get_max_file_bytes(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::MAX_FILE_BYTES, defaults::MAX_FILE_BYTES)
    }

    async fn get_max_rows(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::MAX_ROWS, defaults::MAX_ROWS)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const NOTIFY_THRESHOLD_SECS: &str = "import/notify_threshold_secs";
    pub const HISTORY_LIMIT: &str = "import/history_limit";
    pub const MAX_FILE_BYTES: &str = "import/max_file_bytes";
    pub const MAX_ROWS: &str = "import/max_rows";
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const NOTIFY_THRESHOLD_SECS: u64 = 30;
    pub const HISTORY_LIMIT: usize = 20;
    pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
    pub const MAX_ROWS: usize = 50_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let config = create_manager();

        assert_eq!(config.get_notify_threshold_secs().await.unwrap(), 30);
        assert_eq!(config.get_history_limit().await.unwrap(), 20);
        assert_eq!(config.get_max_file_bytes().await.unwrap(), 10 * 1024 * 1024);
        assert_eq!(config.get_max_rows().await.unwrap(), 50_000);
    }

    #[tokio::test]
    async fn test_override_and_malformed_value() {
        let config = create_manager();

        config
            .set_global_config_value(config_keys::NOTIFY_THRESHOLD_SECS, "5")
            .unwrap();
        assert_eq!(config.get_notify_threshold_secs().await.unwrap(), 5);

        // 覆盖写入
        config
            .set_global_config_value(config_keys::NOTIFY_THRESHOLD_SECS, "0")
            .unwrap();
        assert_eq!(config.get_notify_threshold_secs().await.unwrap(), 0);

        config
            .set_global_config_value(config_keys::MAX_ROWS, "lots")
            .unwrap();
        assert_eq!(config.get_max_rows().await.unwrap(), defaults::MAX_ROWS);

        let snapshot = config.get_config_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
    }
}
