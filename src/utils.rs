use thiserror::Error;
use std::path::Path;

/// 文本无法按目标类型的词法规则解析
///
/// 总是可恢复的：用户可以修改文本后重新提交。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot parse {input:?} as {expected}: {detail}")]
pub struct ParseError {
    /// 期望的类型描述（如 "int"、"struct CGPoint"）
    pub expected: String,
    /// 原始输入文本
    pub input: String,
    /// 失败原因
    pub detail: String,
}

impl ParseError {
    pub fn new(expected: impl Into<String>, input: &str, detail: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            input: input.to_string(),
            detail: detail.into(),
        }
    }
}

/// 访问器调用失败（目标已释放、选择子不存在、类型不匹配等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Target is nil")]
    NilTarget,

    #[error("Target 0x{0:X} has been deallocated")]
    TargetDeallocated(usize),

    #[error("0x{target:X} does not respond to {selector}")]
    SelectorNotFound { target: usize, selector: String },

    #[error("Type mismatch invoking {selector}: {reason}")]
    TypeMismatch { selector: String, reason: String },

    #[error("{selector} raised: {reason}")]
    Raised { selector: String, reason: String },
}

/// 编辑会话层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// 调用方违反会话状态机约定（如重复提交）
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Index {index} out of range (0..{len})")]
    Index { index: usize, len: usize },

    #[error("Property {name} cannot be edited: {reason}")]
    UnsupportedProperty { name: String, reason: String },

    #[error("Attribute {0} is read-only")]
    ReadOnly(String),

    /// setter 已生效，但随后的重新读取失败；提交已记入历史，可撤销
    #[error("Attribute {name} was written but could not be read back: {error}")]
    ReloadFailed { name: String, error: Box<EditorError> },
}

/// 顶层错误类型
#[derive(Error, Debug)]
pub enum InspectorError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    #[error("Global registry has not been initialized")]
    RegistryUninitialized,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<ParseError> for InspectorError {
    fn from(err: ParseError) -> Self {
        InspectorError::Editor(EditorError::Parse(err))
    }
}

impl From<InvocationError> for InspectorError {
    fn from(err: InvocationError) -> Self {
        InspectorError::Editor(EditorError::Invocation(err))
    }
}

/// 可识别的空引用字面量
const NIL_LITERALS: &[&str] = &["nil", "null", "NULL", "Nil", "0x0", "0"];

/// 检查文本是否为空引用字面量
pub fn is_nil_literal(text: &str) -> bool {
    let text = text.trim();
    NIL_LITERALS.iter().any(|&lit| text == lit) || text.eq_ignore_ascii_case("nil")
}

/// 解析严格的地址记号（`0x` 前缀 + 十六进制数字）
pub fn parse_address_token(text: &str) -> Option<usize> {
    let text = text.trim();
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    usize::from_str_radix(digits, 16).ok()
}

/// 解析对象描述形式 `<ClassName: 0xADDR>`
///
/// 返回 (类名, 地址)。描述中除类名与地址外不允许其他内容。
pub fn parse_description_token(text: &str) -> Option<(&str, usize)> {
    let inner = text.trim().strip_prefix('<')?.strip_suffix('>')?;
    let (class_name, address) = inner.split_once(':')?;
    let class_name = class_name.trim();

    if class_name.is_empty() || !class_name.chars().all(is_identifier_char) {
        return None;
    }

    Some((class_name, parse_address_token(address)?))
}

/// 类名/选择子中允许出现的字符
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf, InspectorError> {
    if !file_path.exists() {
        return Err(InspectorError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在"
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = file_path.with_extension(format!("{}.bak", timestamp));

    std::fs::copy(file_path, &backup_path)
        .map_err(InspectorError::IoError)?;

    tracing::info!(backup = %backup_path.display(), "created snapshot backup");

    Ok(backup_path)
}

/// 初始化日志（命令行使用）
#[cfg(feature = "cli")]
pub fn init_logging(quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if quiet { "live_inspector=warn" } else { "live_inspector=info" };

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter))
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_literals() {
        assert!(is_nil_literal("nil"));
        assert!(is_nil_literal("  NULL "));
        assert!(is_nil_literal("NIL"));
        assert!(is_nil_literal("0x0"));
        assert!(!is_nil_literal("none"));
        assert!(!is_nil_literal(""));
    }

    #[test]
    fn test_address_token() {
        assert_eq!(parse_address_token("0x1000"), Some(0x1000));
        assert_eq!(parse_address_token("0XdeadBEEF"), Some(0xdead_beef));
        assert_eq!(parse_address_token("1000"), None);
        assert_eq!(parse_address_token("0x"), None);
        assert_eq!(parse_address_token("0x12g4"), None);
    }

    #[test]
    fn test_description_token() {
        assert_eq!(parse_description_token("<UIView: 0x10>"), Some(("UIView", 0x10)));
        assert_eq!(parse_description_token(" <NSObject:0xff> "), Some(("NSObject", 0xff)));
        assert_eq!(parse_description_token("<UIView: 0x10; frame = (0 0; 1 1)>"), None);
        assert_eq!(parse_description_token("UIView: 0x10"), None);
        assert_eq!(parse_description_token("<: 0x10>"), None);
    }

    #[test]
    fn test_backup_missing_file() {
        let result = create_backup(Path::new("does/not/exist.json"));
        assert!(matches!(result, Err(InspectorError::IoError(_))));
    }
}
