//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 引擎对外只暴露一个 `AppError` 枚举，按失败语义分类：
//! 存储不可用、目标条目不存在、输入校验失败、状态不允许、备份失败。
//! 调用方（展示层、监控循环、启动流程）按变体决定是上报、重试还是忽略。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `rusqlite` 错误在各调用点通过 `map_err` 带上下文映射为 `Storage`，不做 `From` 自动转换。
//! - 实现 `Serialize` 将错误序列化为字符串，便于展示层桥接原样转发。

use serde::Serialize;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 持久化层不可达、损坏或写入无法提交
    #[error("存储错误: {0}")]
    Storage(String),

    /// 操作目标 id 不存在
    #[error("条目不存在: id={0}")]
    NotFound(i64),

    /// 输入校验失败（例如别名为空），条目状态未改变
    #[error("校验失败: {0}")]
    Validation(String),

    /// 当前状态不允许该操作（例如对非敏感条目编辑别名）
    #[error("状态不允许: {0}")]
    InvalidState(String),

    /// 启动备份失败，非致命
    #[error("备份失败: {0}")]
    Backup(String),

    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 输入模拟失败
    #[error("输入模拟失败: {0}")]
    Input(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 展示层桥接要求返回值实现 `Serialize`。
/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn serializes_as_display_string() {
        let json = serde_json::to_string(&AppError::NotFound(42)).expect("serialize error");
        assert_eq!(json, "\"条目不存在: id=42\"");
    }

    #[test]
    fn io_errors_convert_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
