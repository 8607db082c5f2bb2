// ==========================================
// 资产层级导入系统 - 资产节点 Repository 实现
// ==========================================
// 职责: 实现资产节点数据访问（使用 rusqlite）
// 事务: apply_plan / soft_delete_subtree 各自一个事务，失败整体回滚
// ==========================================

use crate::domain::asset::{AssetAttributes, AssetNode, ExistingNode, ExistingState, NodeChange, ReconcilePlan};
use crate::domain::types::ChangeKind;
use crate::repository::asset_node_repo::AssetNodeRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

const NODE_COLUMNS: &str = "internal_id, company_id, external_id, parent_internal_id, level, \
     name, description, category, location, manufacturer, serial_number, \
     created_at, updated_at, deleted_at";

// ==========================================
// AssetNodeRepositoryImpl
// ==========================================
pub struct AssetNodeRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl AssetNodeRepositoryImpl {
    /// 使用共享连接创建 Repository
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn insert_node_tx(
        tx: &Transaction,
        company_id: &str,
        change: &NodeChange,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let attrs = &change.attributes;
        tx.execute(
            r#"
            INSERT INTO asset_node (
                internal_id, company_id, external_id, parent_internal_id, level,
                name, description, category, location, manufacturer, serial_number,
                created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, NULL)
            "#,
            params![
                change.internal_id,
                company_id,
                change.external_id,
                change.parent_internal_id,
                change.level,
                attrs.name,
                attrs.description,
                attrs.category,
                attrs.location,
                attrs.manufacturer,
                attrs.serial_number,
                now,
            ],
        )?;
        Ok(())
    }

    fn update_node_tx(
        tx: &Transaction,
        company_id: &str,
        change: &NodeChange,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let attrs = &change.attributes;
        let affected = tx.execute(
            r#"
            UPDATE asset_node SET
                parent_internal_id = ?3,
                level = ?4,
                name = ?5,
                description = ?6,
                category = ?7,
                location = ?8,
                manufacturer = ?9,
                serial_number = ?10,
                updated_at = ?11
            WHERE internal_id = ?1 AND company_id = ?2 AND deleted_at IS NULL
            "#,
            params![
                change.internal_id,
                company_id,
                change.parent_internal_id,
                change.level,
                attrs.name,
                attrs.description,
                attrs.category,
                attrs.location,
                attrs.manufacturer,
                attrs.serial_number,
                now,
            ],
        )?;

        // 读取快照之后节点被并发删除
        if affected == 0 {
            return Err(RepositoryError::ConstraintViolation(format!(
                "节点 {} ({}) 已不存在或已删除",
                change.external_id, change.internal_id
            )));
        }
        Ok(())
    }

    /// 提交前校验: 活动节点的上级必须是本公司的活动节点
    ///
    /// 外键只保证上级记录存在；读取快照之后上级被并发软删除时在此拦截
    fn check_parents_active_tx(tx: &Transaction, company_id: &str) -> RepositoryResult<()> {
        let orphan: Option<(String, String)> = tx
            .query_row(
                r#"
                SELECT c.external_id, c.parent_internal_id
                FROM asset_node c
                JOIN asset_node p ON p.internal_id = c.parent_internal_id
                WHERE c.company_id = ?1
                  AND c.deleted_at IS NULL
                  AND (p.deleted_at IS NOT NULL OR p.company_id <> ?1)
                LIMIT 1
                "#,
                params![company_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match orphan {
            Some((external_id, parent_internal_id)) => Err(RepositoryError::ConstraintViolation(
                format!("节点 {} 的上级 {} 已删除或不属于本公司", external_id, parent_internal_id),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AssetNodeRepository for AssetNodeRepositoryImpl {
    async fn load_existing_state(&self, company_id: &str) -> RepositoryResult<ExistingState> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM asset_node WHERE company_id = ?1",
            NODE_COLUMNS
        ))?;

        let nodes = stmt
            .query_map(params![company_id], map_node_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let existing: Vec<ExistingNode> = nodes
            .into_iter()
            .map(|n| ExistingNode {
                deleted: n.is_deleted(),
                internal_id: n.internal_id,
                external_id: n.external_id,
                parent_internal_id: n.parent_internal_id,
                parent_external_id: None,
                level: n.level,
                attributes: n.attributes,
            })
            .collect();

        tracing::debug!(company_id = %company_id, node_count = existing.len(), "读取现有层级");
        Ok(ExistingState::from_nodes(existing))
    }

    async fn apply_plan(&self, company_id: &str, plan: &ReconcilePlan) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now();

        let mut written = 0;
        for change in plan.writes() {
            match change.kind {
                ChangeKind::Created => Self::insert_node_tx(&tx, company_id, change, now)?,
                ChangeKind::Updated | ChangeKind::Relevelled => {
                    Self::update_node_tx(&tx, company_id, change, now)?
                }
                ChangeKind::Unchanged => continue,
            }
            written += 1;
        }

        Self::check_parents_active_tx(&tx, company_id)?;

        // 延迟外键在提交时检查
        tx.commit()?;
        Ok(written)
    }

    async fn find_by_external_id(
        &self,
        company_id: &str,
        external_id: &str,
    ) -> RepositoryResult<Option<AssetNode>> {
        let conn = self.get_conn()?;
        let node = conn
            .query_row(
                &format!(
                    "SELECT {} FROM asset_node \
                     WHERE company_id = ?1 AND external_id = ?2 AND deleted_at IS NULL",
                    NODE_COLUMNS
                ),
                params![company_id, external_id],
                map_node_row,
            )
            .optional()?;
        Ok(node)
    }

    async fn list_active_nodes(&self, company_id: &str) -> RepositoryResult<Vec<AssetNode>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM asset_node WHERE company_id = ?1 AND deleted_at IS NULL \
             ORDER BY level, external_id",
            NODE_COLUMNS
        ))?;

        let nodes = stmt
            .query_map(params![company_id], map_node_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(nodes)
    }

    async fn soft_delete_subtree(
        &self,
        company_id: &str,
        internal_id: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            r#"
            WITH RECURSIVE subtree(internal_id) AS (
                SELECT internal_id FROM asset_node
                WHERE internal_id = ?1 AND company_id = ?2 AND deleted_at IS NULL
                UNION
                SELECT n.internal_id FROM asset_node n
                JOIN subtree s ON n.parent_internal_id = s.internal_id
                WHERE n.company_id = ?2 AND n.deleted_at IS NULL
            )
            UPDATE asset_node SET deleted_at = ?3, updated_at = ?3
            WHERE internal_id IN (SELECT internal_id FROM subtree)
            "#,
            params![internal_id, company_id, Utc::now()],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "AssetNode".to_string(),
                id: internal_id.to_string(),
            });
        }

        tx.commit()?;
        Ok(affected)
    }
}

fn map_node_row(row: &Row) -> SqliteResult<AssetNode> {
    Ok(AssetNode {
        internal_id: row.get(0)?,
        company_id: row.get(1)?,
        external_id: row.get(2)?,
        parent_internal_id: row.get(3)?,
        level: row.get(4)?,
        attributes: AssetAttributes {
            name: row.get(5)?,
            description: row.get(6)?,
            category: row.get(7)?,
            location: row.get(8)?,
            manufacturer: row.get(9)?,
            serial_number: row.get(10)?,
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        deleted_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::ValidatedRow;
    use crate::engine::reconciler::{Reconciler, SequentialAllocator};

    fn create_repo() -> AssetNodeRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        AssetNodeRepositoryImpl::new(Arc::new(Mutex::new(conn)))
    }

    fn row(id: &str, parent: Option<&str>) -> ValidatedRow {
        ValidatedRow {
            line_number: 0,
            external_id: id.to_string(),
            parent_external_id: parent.map(|p| p.to_string()),
            attributes: AssetAttributes {
                name: format!("{} name", id),
                ..Default::default()
            },
        }
    }

    async fn import(repo: &AssetNodeRepositoryImpl, company: &str, rows: &[ValidatedRow]) -> ReconcilePlan {
        let existing = repo.load_existing_state(company).await.unwrap();
        let plan = Reconciler::new(Box::new(SequentialAllocator::new(company)))
            .plan(rows, &existing)
            .unwrap();
        repo.apply_plan(company, &plan).await.unwrap();
        plan
    }

    #[tokio::test]
    async fn test_apply_plan_child_before_parent() {
        let repo = create_repo();

        // 子节点排在上级之前，依赖延迟外键
        import(&repo, "c1", &[row("A2", Some("A1")), row("A1", None)]).await;

        let nodes = repo.list_active_nodes("c1").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].external_id, "A1");
        assert_eq!(nodes[1].level, 1);
        assert_eq!(nodes[1].parent_internal_id.as_ref(), Some(&nodes[0].internal_id));
    }

    #[tokio::test]
    async fn test_unchanged_rows_keep_updated_at() {
        let repo = create_repo();
        import(&repo, "c1", &[row("A1", None)]).await;
        let before = repo.find_by_external_id("c1", "A1").await.unwrap().unwrap();

        let plan = import(&repo, "c1", &[row("A1", None)]).await;

        assert_eq!(plan.count(ChangeKind::Unchanged), 1);
        let after = repo.find_by_external_id("c1", "A1").await.unwrap().unwrap();
        assert_eq!(before.updated_at, after.updated_at);
        assert_eq!(before.internal_id, after.internal_id);
    }

    #[tokio::test]
    async fn test_update_of_missing_node_rolls_back_whole_plan() {
        let repo = create_repo();
        let plan = ReconcilePlan {
            changes: vec![
                NodeChange {
                    kind: ChangeKind::Created,
                    internal_id: "n-1".into(),
                    external_id: "NEW".into(),
                    parent_internal_id: None,
                    level: 0,
                    attributes: AssetAttributes {
                        name: "new".into(),
                        ..Default::default()
                    },
                },
                NodeChange {
                    kind: ChangeKind::Updated,
                    internal_id: "ghost".into(),
                    external_id: "GHOST".into(),
                    parent_internal_id: None,
                    level: 0,
                    attributes: AssetAttributes::default(),
                },
            ],
        };

        let result = repo.apply_plan("c1", &plan).await;

        assert!(matches!(result, Err(RepositoryError::ConstraintViolation(_))));
        assert!(repo.list_active_nodes("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dangling_parent_fails_at_commit() {
        let repo = create_repo();
        let plan = ReconcilePlan {
            changes: vec![NodeChange {
                kind: ChangeKind::Created,
                internal_id: "n-1".into(),
                external_id: "A1".into(),
                parent_internal_id: Some("missing".into()),
                level: 1,
                attributes: AssetAttributes {
                    name: "a".into(),
                    ..Default::default()
                },
            }],
        };

        let result = repo.apply_plan("c1", &plan).await;

        assert!(matches!(result, Err(RepositoryError::ForeignKeyViolation(_))));
        assert!(repo.list_active_nodes("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parent_deleted_after_snapshot_fails_at_commit() {
        let repo = create_repo();
        import(&repo, "c1", &[row("P", None)]).await;

        // 快照之后、提交之前删除上级
        let existing = repo.load_existing_state("c1").await.unwrap();
        let plan = Reconciler::new(Box::new(SequentialAllocator::new("late")))
            .plan(&[row("C", Some("P"))], &existing)
            .unwrap();
        let p = repo.find_by_external_id("c1", "P").await.unwrap().unwrap();
        repo.soft_delete_subtree("c1", &p.internal_id).await.unwrap();

        let result = repo.apply_plan("c1", &plan).await;

        assert!(matches!(result, Err(RepositoryError::ConstraintViolation(_))));
        assert!(repo.find_by_external_id("c1", "C").await.unwrap().is_none());
        assert!(repo.list_active_nodes("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_subtree_and_existing_state() {
        let repo = create_repo();
        import(
            &repo,
            "c1",
            &[row("R", None), row("A", Some("R")), row("B", Some("A")), row("X", None)],
        )
        .await;
        let a = repo.find_by_external_id("c1", "A").await.unwrap().unwrap();

        let deleted = repo.soft_delete_subtree("c1", &a.internal_id).await.unwrap();

        assert_eq!(deleted, 2);
        let state = repo.load_existing_state("c1").await.unwrap();
        assert!(state.is_deleted_only("A"));
        assert!(state.is_deleted_only("B"));
        assert!(state.is_active("R"));
        assert!(state.is_active("X"));

        // 再次删除: 已不存在活动节点
        let again = repo.soft_delete_subtree("c1", &a.internal_id).await;
        assert!(matches!(again, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_company_isolation() {
        let repo = create_repo();
        import(&repo, "c1", &[row("A1", None)]).await;
        import(&repo, "c2", &[row("A1", None)]).await;

        let a1 = repo.find_by_external_id("c1", "A1").await.unwrap().unwrap();
        assert!(repo.soft_delete_subtree("c2", &a1.internal_id).await.is_err());
        assert_eq!(repo.list_active_nodes("c2").await.unwrap().len(), 1);
    }
}
