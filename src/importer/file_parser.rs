// ==========================================
// 资产层级导入系统 - 文件解析器实现
// ==========================================
// 职责: 字节缓冲 → 表头 + 有序行记录（字符串键值）
// 支持: CSV (.csv) / Excel (.xlsx/.xlsm/.xls，仅读取第一个工作表)
// ==========================================

use crate::domain::types::FileKind;
use crate::importer::error::FileFormatError;
use crate::importer::importer_trait::{FileDecoder, FileParser};
use calamine::{Data, Range, Reader, Xls, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

// ==========================================
// 解析结果
// ==========================================

/// 原始行记录（列名 → 单元格值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line_number: usize, // 源文件行号（1 起，表头计为第 1 行）
    pub cells: HashMap<String, String>,
}

/// 解码后的文件
#[derive(Debug, Clone, Default)]
pub struct DecodedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// 识别文件类型：扩展名优先，声明的媒体类型兜底
pub fn detect_file_kind(
    file_name: &str,
    declared_media_type: Option<&str>,
) -> Result<FileKind, FileFormatError> {
    let by_extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileKind::from_extension);

    by_extension
        .or_else(|| declared_media_type.and_then(FileKind::from_media_type))
        .ok_or_else(|| FileFormatError::UnsupportedFileType {
            file_name: file_name.to_string(),
            media_type: declared_media_type.unwrap_or("未声明").to_string(),
        })
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, buffer: &[u8]) -> Result<DecodedFile, FileFormatError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(buffer);

        // 读取表头
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

        // 读取所有行
        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // 多行引用字段会让记录跨越多行，以记录起始行为准
            let line_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            let mut cells = HashMap::new();
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    cells.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if cells.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(RawRow { line_number, cells });
        }

        Ok(DecodedFile { headers, rows })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    kind: FileKind,
}

impl ExcelParser {
    pub fn xlsx() -> Self {
        Self {
            kind: FileKind::Xlsx,
        }
    }

    pub fn xls() -> Self {
        Self { kind: FileKind::Xls }
    }
}

impl FileParser for ExcelParser {
    fn parse_bytes(&self, buffer: &[u8]) -> Result<DecodedFile, FileFormatError> {
        let cursor = Cursor::new(buffer);
        let range = match self.kind {
            FileKind::Xls => {
                let workbook: Xls<_> = Xls::new(cursor)
                    .map_err(|e| FileFormatError::CorruptFile(format!("XLS 打开失败: {:?}", e)))?;
                first_sheet_range(workbook)?
            }
            _ => {
                let workbook: Xlsx<_> = Xlsx::new(cursor)
                    .map_err(|e| FileFormatError::CorruptFile(format!("XLSX 打开失败: {:?}", e)))?;
                first_sheet_range(workbook)?
            }
        };

        Ok(range_to_decoded(&range))
    }
}

/// 读取第一个工作表
fn first_sheet_range<RS, R>(mut workbook: R) -> Result<Range<Data>, FileFormatError>
where
    RS: Read + Seek,
    R: Reader<RS>,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FileFormatError::CorruptFile("Excel 文件无工作表".to_string()))?
        .map_err(|e| FileFormatError::CorruptFile(format!("工作表读取失败: {:?}", e)))
}

/// 工作表区域 → 表头 + 行记录（所有值统一为字符串，空单元格为空串）
fn range_to_decoded(range: &Range<Data>) -> DecodedFile {
    // 区域可能不从 A1 开始，行号需要加上起始偏移
    let start_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| normalize_header(&cell.to_string()))
            .collect(),
        None => return DecodedFile::default(),
    };

    let mut rows = Vec::new();
    for (idx, data_row) in rows_iter.enumerate() {
        let mut cells = HashMap::new();
        for (col_idx, cell) in data_row.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                cells.insert(header.clone(), cell.to_string().trim().to_string());
            }
        }

        if cells.values().all(|v| v.is_empty()) {
            continue;
        }

        rows.push(RawRow {
            line_number: start_row + idx + 2,
            cells,
        });
    }

    DecodedFile { headers, rows }
}

// ==========================================
// 通用文件解析器（识别类型后分派）
// ==========================================
pub struct UniversalFileParser;

impl FileDecoder for UniversalFileParser {
    fn decode(
        &self,
        buffer: &[u8],
        declared_media_type: Option<&str>,
        file_name: &str,
    ) -> Result<DecodedFile, FileFormatError> {
        let kind = detect_file_kind(file_name, declared_media_type)?;
        tracing::debug!(file_name = %file_name, kind = %kind, bytes = buffer.len(), "识别文件类型");

        let decoded = match kind {
            FileKind::Csv => CsvParser.parse_bytes(buffer)?,
            FileKind::Xlsx => ExcelParser::xlsx().parse_bytes(buffer)?,
            FileKind::Xls => ExcelParser::xls().parse_bytes(buffer)?,
        };

        if decoded.rows.is_empty() {
            return Err(FileFormatError::EmptyFile);
        }

        Ok(decoded)
    }
}
