//! 统一错误处理
//!
//! 调用方看到的失败只有三类：输入结构损坏、配置错误、内部错误。
//! 策略层面的违规（不允许的标签、属性、scheme、CSS 构造）从不是错误，只会被静默剥离。

use thiserror::Error;

/// 净化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// 标签结构无法恢复，继续猜测会产生歧义
    #[error("标记结构损坏 (位置 {position}): {reason}")]
    MalformedMarkup { position: usize, reason: String },

    /// 请求的策略变体不存在
    #[error("未知的策略配置: {0}")]
    UnknownPolicy(String),

    /// CSS 类名前缀不合法
    #[error("CSS 前缀无效: {0}")]
    InvalidCssPrefix(String),

    /// 策略文件无法读取或解析
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    CorruptInput,
    Configuration,
    Internal,
}

impl SanitizeError {
    pub fn malformed(position: usize, reason: impl Into<String>) -> Self {
        SanitizeError::MalformedMarkup {
            position,
            reason: reason.into(),
        }
    }

    /// `HTM` 前缀的错误码
    pub fn code(&self) -> &'static str {
        match self {
            SanitizeError::MalformedMarkup { .. } => "HTM-0001",
            SanitizeError::UnknownPolicy(_) => "HTM-0002",
            SanitizeError::InvalidCssPrefix(_) => "HTM-0003",
            SanitizeError::Configuration(_) => "HTM-0004",
            SanitizeError::Internal(_) => "HTM-0099",
        }
    }

    /// 错误码中的数字部分
    pub fn number(&self) -> u32 {
        match self {
            SanitizeError::MalformedMarkup { .. } => 1,
            SanitizeError::UnknownPolicy(_) => 2,
            SanitizeError::InvalidCssPrefix(_) => 3,
            SanitizeError::Configuration(_) => 4,
            SanitizeError::Internal(_) => 99,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            SanitizeError::MalformedMarkup { .. } => ErrorCategory::CorruptInput,
            SanitizeError::UnknownPolicy(_)
            | SanitizeError::InvalidCssPrefix(_)
            | SanitizeError::Configuration(_) => ErrorCategory::Configuration,
            SanitizeError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 核心中没有瞬时性错误，重试不会改变结果
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// 净化结果类型
pub type ScrubResult<T> = Result<T, SanitizeError>;
