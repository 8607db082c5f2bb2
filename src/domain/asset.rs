// ==========================================
// 资产层级导入系统 - 资产节点领域模型
// ==========================================
// 职责: 资产节点、导入中间结构、已有状态快照、对账计划
// 约束: internal_id 由系统分配且不可变；external_id 在公司内活动节点中唯一
// ==========================================

use crate::domain::types::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ==========================================
// AssetAttributes - 可追踪的描述属性
// ==========================================
// 对账时逐字段比较；空白字符串统一为 None
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAttributes {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

// ==========================================
// AssetNode - 资产层级节点（asset_node 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetNode {
    pub internal_id: String,                // 系统主键（其他记录只引用此 ID）
    pub company_id: String,
    pub external_id: String,                // 用户提供的编号
    pub parent_internal_id: Option<String>, // 同公司内的上级节点
    pub level: i32,                         // 0 = 根节点
    pub attributes: AssetAttributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>, // 软删除时间
}

impl AssetNode {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ==========================================
// NormalizedRow - 列映射后的行记录
// ==========================================
// 生命周期: 仅在导入流程内
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub line_number: usize, // 源文件行号（1 起，表头计为第 1 行）
    pub external_id: Option<String>,
    pub parent_external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

// ==========================================
// ValidatedRow - 校验通过的行记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub line_number: usize,
    pub external_id: String,
    pub parent_external_id: Option<String>,
    pub attributes: AssetAttributes,
}

// ==========================================
// ExistingNode - 已存储节点（含软删除）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingNode {
    pub internal_id: String,
    pub external_id: String,
    pub parent_internal_id: Option<String>,
    pub parent_external_id: Option<String>,
    pub level: i32,
    pub attributes: AssetAttributes,
    pub deleted: bool,
}

// ==========================================
// ExistingState - 公司现有层级快照
// ==========================================
// 活动节点用于对账与上级解析；软删除编号单独保留，用于唯一性判断
#[derive(Debug, Clone, Default)]
pub struct ExistingState {
    pub active_external_ids: HashSet<String>,
    pub parent_by_external_id: HashMap<String, Option<String>>,
    pub node_by_external_id: HashMap<String, ExistingNode>,
    pub deleted_external_ids: HashSet<String>,
}

impl ExistingState {
    /// 从节点列表构建快照
    ///
    /// # 说明
    /// - parent_external_id 在此统一通过 internal_id 回查填充
    /// - 同一 external_id 可能存在多条软删除记录
    pub fn from_nodes(nodes: Vec<ExistingNode>) -> Self {
        let external_by_internal: HashMap<String, String> = nodes
            .iter()
            .map(|n| (n.internal_id.clone(), n.external_id.clone()))
            .collect();

        let mut state = ExistingState::default();
        for mut node in nodes {
            if node.deleted {
                state.deleted_external_ids.insert(node.external_id);
                continue;
            }

            node.parent_external_id = node
                .parent_internal_id
                .as_ref()
                .and_then(|pid| external_by_internal.get(pid).cloned());

            state.active_external_ids.insert(node.external_id.clone());
            state
                .parent_by_external_id
                .insert(node.external_id.clone(), node.parent_external_id.clone());
            state.node_by_external_id.insert(node.external_id.clone(), node);
        }
        state
    }

    pub fn is_active(&self, external_id: &str) -> bool {
        self.active_external_ids.contains(external_id)
    }

    /// 编号只存在于软删除记录中
    pub fn is_deleted_only(&self, external_id: &str) -> bool {
        !self.is_active(external_id) && self.deleted_external_ids.contains(external_id)
    }

    pub fn get(&self, external_id: &str) -> Option<&ExistingNode> {
        self.node_by_external_id.get(external_id)
    }
}

// ==========================================
// NodeChange / ReconcilePlan - 对账计划
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChange {
    pub kind: ChangeKind,
    pub internal_id: String,
    pub external_id: String,
    pub parent_internal_id: Option<String>,
    pub level: i32,
    pub attributes: AssetAttributes,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub changes: Vec<NodeChange>,
}

impl ReconcilePlan {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// 需要落库的变更（新增/更新/层级修正）
    pub fn writes(&self) -> impl Iterator<Item = &NodeChange> {
        self.changes
            .iter()
            .filter(|c| c.kind != ChangeKind::Unchanged)
    }

    pub fn find(&self, external_id: &str) -> Option<&NodeChange> {
        self.changes.iter().find(|c| c.external_id == external_id)
    }
}
