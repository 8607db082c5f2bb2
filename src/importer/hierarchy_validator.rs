// ==========================================
// 资产层级导入系统 - 层级校验器实现
// ==========================================
// 职责: 必填字段 / 批内重复 / 已删除编号 / 上级解析 / 循环检测
// 红线: 纯函数，不做任何写入；检查完全部行后一次性返回
// ==========================================

use crate::domain::asset::{AssetAttributes, ExistingState, NormalizedRow, ValidatedRow};
use crate::domain::import_job::{RowError, ValidationReport, ValidationSummary};
use crate::domain::types::{CanonicalField, RowErrorKind};
use crate::importer::importer_trait::HierarchyValidator as HierarchyValidatorTrait;
use std::collections::{HashMap, HashSet};

// ==========================================
// ValidationOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub rows: Vec<ValidatedRow>, // 仅 valid = true 时完整
    pub errors: Vec<RowError>,   // 按 (行号, 错误类型) 排序
    pub summary: ValidationSummary,
}

impl ValidationOutcome {
    pub fn into_result(self) -> Result<Vec<ValidatedRow>, ValidationReport> {
        if self.valid {
            Ok(self.rows)
        } else {
            Err(ValidationReport {
                errors: self.errors,
                summary: self.summary,
            })
        }
    }
}

pub struct HierarchyValidator;

impl HierarchyValidatorTrait for HierarchyValidator {
    fn validate(&self, rows: &[NormalizedRow], existing: &ExistingState) -> ValidationOutcome {
        let mut errors = Vec::new();

        // 编号 → 首次出现的行号
        let mut first_line_by_id: HashMap<&str, usize> = HashMap::new();
        // 批内有效编号（首次出现）对应的上级
        let mut batch_parent: HashMap<&str, Option<&str>> = HashMap::new();
        let mut batch_order: Vec<(&str, usize)> = Vec::new();

        // 1. 逐行检查
        for row in rows {
            let line = row.line_number;

            if row.name.is_none() {
                errors.push(
                    RowError::new(line, RowErrorKind::MissingRequiredField, "必填字段 'name' 为空")
                        .with_field(CanonicalField::Name.as_str(), None),
                );
            }

            let external_id = match row.external_id.as_deref() {
                Some(id) => id,
                None => {
                    errors.push(
                        RowError::new(line, RowErrorKind::MissingRequiredField, "必填字段 'id' 为空")
                            .with_field(CanonicalField::Id.as_str(), None),
                    );
                    continue;
                }
            };

            // 批内重复：首次出现之后的每一行都报错
            if let Some(&first_line) = first_line_by_id.get(external_id) {
                errors.push(
                    RowError::new(
                        line,
                        RowErrorKind::DuplicateInRequest,
                        format!(
                            "编号 '{}' 在本次上传中重复（首次出现于第 {} 行，重复于第 {} 行）",
                            external_id, first_line, line
                        ),
                    )
                    .with_field(CanonicalField::Id.as_str(), Some(external_id)),
                );
                continue;
            }
            first_line_by_id.insert(external_id, line);
            batch_parent.insert(external_id, row.parent_external_id.as_deref());
            batch_order.push((external_id, line));

            // 已删除编号不可复用
            if existing.is_deleted_only(external_id) {
                errors.push(
                    RowError::new(
                        line,
                        RowErrorKind::DeletedIdConflict,
                        format!("编号 '{}' 属于已删除的资产，不能重复使用", external_id),
                    )
                    .with_field(CanonicalField::Id.as_str(), Some(external_id)),
                );
            }
        }

        // 2. 上级解析（批内编号需全部收集完才能判断，故单独一轮）
        for row in rows {
            let (Some(external_id), Some(parent)) =
                (row.external_id.as_deref(), row.parent_external_id.as_deref())
            else {
                continue;
            };
            // 自引用在循环检测中报告
            if parent == external_id {
                continue;
            }
            if batch_parent.contains_key(parent) || existing.is_active(parent) {
                continue;
            }

            let message = if existing.is_deleted_only(parent) {
                format!("上级编号 '{}' 对应的资产已删除", parent)
            } else {
                format!("上级编号 '{}' 在本次上传和现有层级中均不存在", parent)
            };
            errors.push(
                RowError::new(row.line_number, RowErrorKind::UnresolvedParent, message)
                    .with_field(CanonicalField::ParentId.as_str(), Some(parent)),
            );
        }

        // 3. 循环检测
        errors.extend(detect_cycles(&batch_order, &batch_parent, existing));

        errors.sort_by(|a, b| (a.row, a.kind).cmp(&(b.row, b.kind)));
        build_outcome(rows, errors)
    }
}

/// 在「现有层级 + 本批覆盖」的有效上级图上检测循环
///
/// # 规则
/// - 批内行的上级覆盖现有节点的上级
/// - 位于环上的每个批内行各报一条错误，路径从该行自身开始
/// - 指向纯现有节点环的批内行同样报错（该环无人可报）
///
/// 已判定的节点记入 settled（可达根，或通向含批内行的环），后续遍历到此即停
fn detect_cycles<'a>(
    batch_order: &[(&'a str, usize)],
    batch_parent: &HashMap<&'a str, Option<&'a str>>,
    existing: &'a ExistingState,
) -> Vec<RowError> {
    let effective_parent = |id: &str| -> Option<&'a str> {
        match batch_parent.get(id) {
            Some(parent) => *parent,
            None => existing
                .parent_by_external_id
                .get(id)
                .and_then(|p| p.as_deref()),
        }
    };

    let mut settled: HashSet<&'a str> = HashSet::new();
    let mut path: Vec<&'a str> = Vec::new();
    let mut on_path: HashSet<&'a str> = HashSet::new();
    let mut errors = Vec::new();

    for &(start, line) in batch_order {
        if settled.contains(start) {
            continue;
        }
        path.clear();
        on_path.clear();
        path.push(start);
        on_path.insert(start);
        let mut current = start;

        loop {
            let parent = match effective_parent(current) {
                Some(p) if !settled.contains(p) => p,
                // 到达根或已判定的节点
                _ => {
                    settled.extend(path.iter().copied());
                    break;
                }
            };
            if parent == start {
                path.push(parent);
                errors.push(cycle_error(line, start, &path));
                break;
            }
            if !on_path.insert(parent) {
                // 进入一个不经过 start 的环
                let cycle_start = path.iter().position(|p| *p == parent).unwrap_or(0);
                let cycle_has_batch_member = path[cycle_start..]
                    .iter()
                    .any(|id| batch_parent.contains_key(id));
                if cycle_has_batch_member {
                    // 环由其上的批内行报告，环外的链无需再报
                    settled.extend(path[..cycle_start].iter().copied());
                } else {
                    path.push(parent);
                    errors.push(cycle_error(line, start, &path));
                }
                break;
            }
            path.push(parent);
            current = parent;
        }
    }
    errors
}

fn cycle_error(line: usize, external_id: &str, path: &[&str]) -> RowError {
    RowError::new(
        line,
        RowErrorKind::CycleDetected,
        format!("检测到循环上级关系: {}", path.join(" → ")),
    )
    .with_field(CanonicalField::Id.as_str(), Some(external_id))
}

fn build_outcome(rows: &[NormalizedRow], errors: Vec<RowError>) -> ValidationOutcome {
    let error_lines: HashSet<usize> = errors.iter().map(|e| e.row).collect();
    let summary = ValidationSummary {
        total_rows: rows.len(),
        valid_rows: rows
            .iter()
            .filter(|r| !error_lines.contains(&r.line_number))
            .count(),
        error_rows: error_lines.len(),
        error_count: errors.len(),
    };

    if !errors.is_empty() {
        return ValidationOutcome {
            valid: false,
            rows: Vec::new(),
            errors,
            summary,
        };
    }

    // 全部通过：必填字段已保证存在
    let validated = rows
        .iter()
        .filter_map(|row| {
            let external_id = row.external_id.clone()?;
            let name = row.name.clone()?;
            Some(ValidatedRow {
                line_number: row.line_number,
                external_id,
                parent_external_id: row.parent_external_id.clone(),
                attributes: AssetAttributes {
                    name,
                    description: row.description.clone(),
                    category: row.category.clone(),
                    location: row.location.clone(),
                    manufacturer: row.manufacturer.clone(),
                    serial_number: row.serial_number.clone(),
                },
            })
        })
        .collect();

    ValidationOutcome {
        valid: true,
        rows: validated,
        errors,
        summary,
    }
}
