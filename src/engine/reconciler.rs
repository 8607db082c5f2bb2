// ==========================================
// 资产层级导入系统 - 对账引擎
// ==========================================
// 职责: 校验通过的行 + 现有层级 → 新增/更新/未变更/层级修正计划
// 红线: 纯计算，不拼 SQL；落库由 AssetNodeRepository 在单个事务内完成
// ==========================================
// 两轮处理:
//   1. 分配轮: 先建立完整的 external_id → internal_id 映射
//   2. 解析轮: 基于完整映射解析上级、计算层级、逐字段比较
// ==========================================

use crate::domain::asset::{ExistingState, NodeChange, ReconcilePlan, ValidatedRow};
use crate::domain::types::ChangeKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

// ==========================================
// 错误类型
// ==========================================
// 校验通过后理论上不会出现，出现即为内部不一致
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("上级无法解析: {external_id} → {parent_external_id}")]
    UnresolvedParent {
        external_id: String,
        parent_external_id: String,
    },

    #[error("层级计算遇到循环: {0}")]
    CycleDetected(String),
}

// ==========================================
// IdAllocator - 内部 ID 分配
// ==========================================
pub trait IdAllocator: Send + Sync {
    fn allocate(&self) -> String;
}

/// 默认分配器: UUID v4
#[derive(Debug, Clone, Default)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// 顺序分配器（测试用，结果可复现）
#[derive(Debug, Default)]
pub struct SequentialAllocator {
    prefix: String,
    next: AtomicUsize,
}

impl SequentialAllocator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicUsize::new(1),
        }
    }
}

impl IdAllocator for SequentialAllocator {
    fn allocate(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

// ==========================================
// Reconciler
// ==========================================
pub struct Reconciler {
    allocator: Box<dyn IdAllocator>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Box::new(UuidAllocator))
    }
}

impl Reconciler {
    pub fn new(allocator: Box<dyn IdAllocator>) -> Self {
        Self { allocator }
    }

    /// 生成对账计划
    ///
    /// # 参数
    /// - rows: 已通过校验的行（编号唯一、上级可解析、无环）
    /// - existing: 公司现有层级快照
    ///
    /// # 返回
    /// - 批内每行一条变更（新增/更新/未变更），按行顺序
    /// - 批外现有节点层级变化时追加 Relevelled 变更，按编号排序
    pub fn plan(
        &self,
        rows: &[ValidatedRow],
        existing: &ExistingState,
    ) -> Result<ReconcilePlan, ReconcileError> {
        // ===== 分配轮 =====
        let mut internal_by_external: HashMap<String, String> = existing
            .node_by_external_id
            .iter()
            .map(|(ext, node)| (ext.clone(), node.internal_id.clone()))
            .collect();

        for row in rows {
            if !internal_by_external.contains_key(&row.external_id) {
                internal_by_external.insert(row.external_id.clone(), self.allocator.allocate());
            }
        }

        // ===== 解析轮 =====
        // 有效上级: 本批覆盖现有
        let mut parent_by_external: HashMap<String, Option<String>> =
            existing.parent_by_external_id.clone();
        for row in rows {
            parent_by_external.insert(row.external_id.clone(), row.parent_external_id.clone());
        }

        let levels = compute_levels(&parent_by_external, &internal_by_external)?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in rows {
            let internal_id = internal_by_external
                .get(&row.external_id)
                .cloned()
                .unwrap_or_default();
            let parent_internal_id =
                resolve_parent(&row.external_id, row.parent_external_id.as_deref(), &internal_by_external)?;
            let level = levels.get(&row.external_id).copied().unwrap_or(0);

            let kind = match existing.get(&row.external_id) {
                None => ChangeKind::Created,
                Some(node)
                    if node.attributes == row.attributes
                        && node.parent_internal_id == parent_internal_id
                        && node.level == level =>
                {
                    ChangeKind::Unchanged
                }
                Some(_) => ChangeKind::Updated,
            };

            changes.push(NodeChange {
                kind,
                internal_id,
                external_id: row.external_id.clone(),
                parent_internal_id,
                level,
                attributes: row.attributes.clone(),
            });
        }

        // 批外节点: 祖先被移动后层级随之变化
        let batch_ids: BTreeSet<&str> = rows.iter().map(|r| r.external_id.as_str()).collect();
        let mut untouched: Vec<_> = existing
            .node_by_external_id
            .values()
            .filter(|n| !batch_ids.contains(n.external_id.as_str()))
            .collect();
        untouched.sort_by(|a, b| a.external_id.cmp(&b.external_id));

        for node in untouched {
            let level = levels.get(&node.external_id).copied().unwrap_or(node.level);
            // 上级已失效的孤儿节点脱离为根
            let parent_internal_id = node
                .parent_external_id
                .as_deref()
                .and_then(|p| internal_by_external.get(p))
                .cloned();
            if level != node.level || parent_internal_id != node.parent_internal_id {
                changes.push(NodeChange {
                    kind: ChangeKind::Relevelled,
                    internal_id: node.internal_id.clone(),
                    external_id: node.external_id.clone(),
                    parent_internal_id,
                    level,
                    attributes: node.attributes.clone(),
                });
            }
        }

        Ok(ReconcilePlan { changes })
    }
}

fn resolve_parent(
    external_id: &str,
    parent_external_id: Option<&str>,
    internal_by_external: &HashMap<String, String>,
) -> Result<Option<String>, ReconcileError> {
    match parent_external_id {
        None => Ok(None),
        Some(parent) => internal_by_external
            .get(parent)
            .cloned()
            .map(Some)
            .ok_or_else(|| ReconcileError::UnresolvedParent {
                external_id: external_id.to_string(),
                parent_external_id: parent.to_string(),
            }),
    }
}

/// 计算所有节点层级（0 = 根），带记忆化
///
/// 步数上限为节点总数，超过即视为环
fn compute_levels(
    parent_by_external: &HashMap<String, Option<String>>,
    internal_by_external: &HashMap<String, String>,
) -> Result<HashMap<String, i32>, ReconcileError> {
    let mut levels: HashMap<String, i32> = HashMap::with_capacity(parent_by_external.len());
    let limit = parent_by_external.len();

    for start in parent_by_external.keys() {
        if levels.contains_key(start) {
            continue;
        }

        // 沿上级链向上，直到根或已知层级
        let mut chain: Vec<&str> = vec![start.as_str()];
        let mut base: i32 = -1;
        let mut current = start.as_str();
        loop {
            let parent = match parent_by_external.get(current) {
                Some(Some(p)) => p.as_str(),
                _ => break,
            };
            // 上级已不在活动节点中: 按根节点计
            if !internal_by_external.contains_key(parent) {
                break;
            }
            if let Some(&known) = levels.get(parent) {
                base = known;
                break;
            }
            if chain.len() > limit {
                return Err(ReconcileError::CycleDetected(start.clone()));
            }
            chain.push(parent);
            current = parent;
        }

        // 自顶向下回填
        for (depth, id) in chain.iter().rev().enumerate() {
            levels.insert((*id).to_string(), base + 1 + depth as i32);
        }
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{AssetAttributes, ExistingNode};

    fn row(id: &str, name: &str, parent: Option<&str>) -> ValidatedRow {
        ValidatedRow {
            line_number: 0,
            external_id: id.to_string(),
            parent_external_id: parent.map(|p| p.to_string()),
            attributes: AssetAttributes {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    fn existing_node(internal: &str, id: &str, parent: Option<&str>, level: i32) -> ExistingNode {
        ExistingNode {
            internal_id: internal.to_string(),
            external_id: id.to_string(),
            parent_internal_id: parent.map(|p| p.to_string()),
            parent_external_id: None,
            level,
            attributes: AssetAttributes {
                name: id.to_string(),
                ..Default::default()
            },
            deleted: false,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(Box::new(SequentialAllocator::new("n")))
    }

    #[test]
    fn test_two_row_example_on_empty_company() {
        let rows = vec![row("A1", "Pump", None), row("A2", "Motor", Some("A1"))];

        let plan = reconciler().plan(&rows, &ExistingState::default()).unwrap();

        assert_eq!(plan.count(ChangeKind::Created), 2);
        let a1 = plan.find("A1").unwrap();
        let a2 = plan.find("A2").unwrap();
        assert_eq!(a1.level, 0);
        assert_eq!(a2.level, 1);
        assert_eq!(a2.parent_internal_id.as_ref(), Some(&a1.internal_id));
    }

    #[test]
    fn test_child_listed_before_parent_resolves() {
        let rows = vec![
            row("C", "c", Some("B")),
            row("B", "b", Some("A")),
            row("A", "a", None),
        ];

        let plan = reconciler().plan(&rows, &ExistingState::default()).unwrap();

        assert_eq!(plan.find("C").unwrap().level, 2);
        assert_eq!(
            plan.find("C").unwrap().parent_internal_id.as_ref(),
            Some(&plan.find("B").unwrap().internal_id)
        );
    }

    #[test]
    fn test_identical_rows_are_unchanged() {
        let existing = ExistingState::from_nodes(vec![
            existing_node("i-1", "A1", None, 0),
            existing_node("i-2", "A2", Some("i-1"), 1),
        ]);
        let rows = vec![row("A1", "A1", None), row("A2", "A2", Some("A1"))];

        let plan = reconciler().plan(&rows, &existing).unwrap();

        assert_eq!(plan.count(ChangeKind::Unchanged), 2);
        assert_eq!(plan.writes().count(), 0);
        assert_eq!(plan.find("A2").unwrap().internal_id, "i-2");
    }

    #[test]
    fn test_attribute_change_is_update() {
        let existing = ExistingState::from_nodes(vec![existing_node("i-1", "A1", None, 0)]);
        let mut changed = row("A1", "A1", None);
        changed.attributes.location = Some("Plant 2".to_string());

        let plan = reconciler().plan(&[changed], &existing).unwrap();

        assert_eq!(plan.count(ChangeKind::Updated), 1);
        assert_eq!(plan.find("A1").unwrap().internal_id, "i-1");
    }

    #[test]
    fn test_moving_subtree_relevels_untouched_descendants() {
        // R ← P ← C ← G，批次只把 P 挂到新根 N 下的 M 下
        let existing = ExistingState::from_nodes(vec![
            existing_node("i-r", "R", None, 0),
            existing_node("i-p", "P", Some("i-r"), 1),
            existing_node("i-c", "C", Some("i-p"), 2),
            existing_node("i-g", "G", Some("i-c"), 3),
        ]);
        let rows = vec![
            row("N", "n", None),
            row("M", "m", Some("N")),
            row("P", "P", Some("M")),
        ];

        let plan = reconciler().plan(&rows, &existing).unwrap();

        assert_eq!(plan.count(ChangeKind::Created), 2);
        assert_eq!(plan.count(ChangeKind::Updated), 1);
        assert_eq!(plan.count(ChangeKind::Relevelled), 2);
        assert_eq!(plan.find("P").unwrap().level, 2);
        assert_eq!(plan.find("C").unwrap().level, 3);
        assert_eq!(plan.find("G").unwrap().level, 4);
        // 层级修正不改动上级与属性
        assert_eq!(plan.find("G").unwrap().parent_internal_id.as_deref(), Some("i-c"));
        assert!(plan.find("R").is_none());
    }

    #[test]
    fn test_orphan_with_deleted_parent_becomes_root() {
        // O 的上级 D 已软删除，O 的子节点 K 仍挂在 O 下
        let mut deleted = existing_node("i-d", "D", None, 0);
        deleted.deleted = true;
        let existing = ExistingState::from_nodes(vec![
            deleted,
            existing_node("i-o", "O", Some("i-d"), 1),
            existing_node("i-k", "K", Some("i-o"), 2),
        ]);

        let plan = reconciler().plan(&[row("Z", "z", None)], &existing).unwrap();

        assert_eq!(plan.count(ChangeKind::Created), 1);
        let orphan = plan.find("O").unwrap();
        assert_eq!(orphan.kind, ChangeKind::Relevelled);
        assert_eq!(orphan.level, 0);
        assert_eq!(orphan.parent_internal_id, None);
        let child = plan.find("K").unwrap();
        assert_eq!(child.level, 1);
        assert_eq!(child.parent_internal_id.as_deref(), Some("i-o"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let existing = ExistingState::from_nodes(vec![existing_node("i-1", "A1", None, 0)]);
        let rows = vec![row("A1", "renamed", None), row("B", "b", Some("A1"))];

        let first = reconciler().plan(&rows, &existing).unwrap();
        let second = reconciler().plan(&rows, &existing).unwrap();

        assert_eq!(first.changes, second.changes);
    }

    #[test]
    fn test_level_guard_reports_cycle() {
        let rows = vec![row("A", "a", Some("B")), row("B", "b", Some("A"))];

        let result = reconciler().plan(&rows, &ExistingState::default());

        assert!(matches!(result, Err(ReconcileError::CycleDetected(_))));
    }

    #[test]
    fn test_uuid_allocator_unique() {
        let allocator = UuidAllocator;
        assert_ne!(allocator.allocate(), allocator.allocate());
    }
}
