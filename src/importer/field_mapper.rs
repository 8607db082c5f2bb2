// ==========================================
// 资产层级导入系统 - 字段映射器实现
// ==========================================
// 职责: 列映射配置解析与校验 + 原始行 → 标准字段记录
// 映射方向: 标准字段名 → 文件表头（由用户逐次上传时提供）
// ==========================================

use crate::domain::asset::NormalizedRow;
use crate::domain::types::CanonicalField;
use crate::importer::error::MappingError;
use crate::importer::file_parser::RawRow;
use crate::importer::importer_trait::FieldMapper as FieldMapperTrait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

// ==========================================
// ColumnMapping - 列映射配置
// ==========================================
// 保留原始键，未知字段名由 structural_errors 统一报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象解析映射配置
    ///
    /// # 规则
    /// - 必须是对象，值必须是字符串
    /// - null 值视为未映射
    pub fn from_json(value: &Value) -> Result<Self, Vec<MappingError>> {
        let object = value.as_object().ok_or_else(|| {
            vec![MappingError::InvalidConfig(
                "映射配置必须是 {\"标准字段\": \"文件表头\"} 形式的对象".to_string(),
            )]
        })?;

        let mut mapping = ColumnMapping::new();
        let mut errors = Vec::new();
        for (key, header) in object {
            match header {
                Value::String(h) => mapping.insert(key, h),
                Value::Null => {}
                other => errors.push(MappingError::InvalidConfig(format!(
                    "字段 '{}' 的映射值必须是字符串，实际为 {}",
                    key, other
                ))),
            }
        }

        if errors.is_empty() {
            Ok(mapping)
        } else {
            Err(errors)
        }
    }

    pub fn insert(&mut self, field: &str, header: &str) {
        self.entries
            .insert(field.trim().to_string(), header.trim().to_string());
    }

    /// 标准字段对应的文件表头（空表头视为未映射）
    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.entries
            .get(field.as_str())
            .map(|h| h.as_str())
            .filter(|h| !h.is_empty())
    }

    /// 不依赖文件表头即可发现的问题：未知字段名、必填字段未映射
    ///
    /// 导入流程在解码文件之前先做这一步
    pub fn structural_errors(&self) -> Vec<MappingError> {
        let mut errors: Vec<MappingError> = self
            .entries
            .keys()
            .filter(|key| CanonicalField::parse(key).is_none())
            .map(|key| MappingError::UnknownField(key.clone()))
            .collect();

        for field in CanonicalField::ALL {
            if field.is_required() && self.header_for(field).is_none() {
                errors.push(MappingError::MissingRequiredField(field));
            }
        }
        errors
    }
}

// ==========================================
// FieldMapper 实现
// ==========================================
pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn validate_mapping(
        &self,
        mapping: &ColumnMapping,
        file_headers: &[String],
    ) -> Result<(), Vec<MappingError>> {
        let mut errors = mapping.structural_errors();

        // 表头存在性（按标准字段顺序报告）
        let headers: HashSet<&str> = file_headers.iter().map(|h| h.as_str()).collect();
        for field in CanonicalField::ALL {
            if let Some(header) = mapping.header_for(field) {
                if !headers.contains(header) {
                    errors.push(MappingError::HeaderNotFound {
                        field,
                        header: header.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn apply(&self, rows: Vec<RawRow>, mapping: &ColumnMapping) -> Vec<NormalizedRow> {
        rows.into_iter()
            .map(|row| NormalizedRow {
                line_number: row.line_number,
                external_id: self.get_string(&row.cells, mapping, CanonicalField::Id),
                parent_external_id: self.get_string(&row.cells, mapping, CanonicalField::ParentId),
                name: self.get_string(&row.cells, mapping, CanonicalField::Name),
                description: self.get_string(&row.cells, mapping, CanonicalField::Description),
                category: self.get_string(&row.cells, mapping, CanonicalField::Category),
                location: self.get_string(&row.cells, mapping, CanonicalField::Location),
                manufacturer: self.get_string(&row.cells, mapping, CanonicalField::Manufacturer),
                serial_number: self.get_string(&row.cells, mapping, CanonicalField::SerialNumber),
            })
            .collect()
    }
}

impl FieldMapper {
    // 辅助方法：获取字符串字段（去除首尾空白，空值为 None）
    fn get_string(
        &self,
        cells: &HashMap<String, String>,
        mapping: &ColumnMapping,
        field: CanonicalField,
    ) -> Option<String> {
        mapping
            .header_for(field)
            .and_then(|header| cells.get(header))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }
}
