//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理。库本身从不读取环境变量，
//! 只有 CLI 通过 `EnvConfig::from_env()` 把它们转换为显式传入的选项。

use std::env;
use std::fmt;

use crate::parsers::html::backend::ParserBackend;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 未设置时返回 `None`，设置了但无效时报错
    fn get_optional() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "HTMLSCRUB_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 净化相关环境变量
pub mod sanitizer {
    use super::*;

    /// 策略文件目录
    pub struct PolicyDir;
    impl EnvVar<String> for PolicyDir {
        const NAME: &'static str = "HTMLSCRUB_POLICY_DIR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Directory with <name>.toml policy files (supports ~); built-in policies only when unset";

        fn parse(value: &str) -> EnvResult<String> {
            let value = value.trim();
            if value.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Policy directory cannot be empty".to_string(),
                });
            }
            Ok(value.to_string())
        }
    }

    /// 解析后端
    pub struct Backend;
    impl EnvVar<ParserBackend> for Backend {
        const NAME: &'static str = "HTMLSCRUB_BACKEND";
        const DEFAULT: Option<ParserBackend> = Some(ParserBackend::Dom);
        const DESCRIPTION: &'static str = "Parser backend: dom, streaming";

        fn parse(value: &str) -> EnvResult<ParserBackend> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid backend '{}'. Use: dom, streaming", value),
            })
        }
    }

    /// 输出长度上限
    pub struct MaxContentSize;
    impl EnvVar<usize> for MaxContentSize {
        const NAME: &'static str = "HTMLSCRUB_MAX_CONTENT_SIZE";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Maximum output size in bytes; unlimited when unset";

        fn parse(value: &str) -> EnvResult<usize> {
            match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => Ok(size),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid size '{}'. Must be a positive integer", value),
                }),
            }
        }
    }
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,
    pub policy_dir: Option<String>,
    pub backend: ParserBackend,
    pub max_content_size: Option<usize>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,
            policy_dir: sanitizer::PolicyDir::get_optional()?,
            backend: sanitizer::Backend::get()?,
            max_content_size: sanitizer::MaxContentSize::get_optional()?,
        })
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Log Level: {}", self.log_level);
        println!("  Backend: {}", self.backend);
        println!(
            "  Policy Dir: {}",
            self.policy_dir.as_deref().unwrap_or("[built-in only]")
        );
        match self.max_content_size {
            Some(size) => println!("  Max Content Size: {} bytes", size),
            None => println!("  Max Content Size: unlimited"),
        }
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: \"warn\")\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::NoColor::NAME,
        core::NoColor::DESCRIPTION,
        core::NoColor::DEFAULT
    ));

    docs.push_str("\n## Sanitizer Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        sanitizer::PolicyDir::NAME,
        sanitizer::PolicyDir::DESCRIPTION,
        sanitizer::PolicyDir::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        sanitizer::Backend::NAME,
        sanitizer::Backend::DESCRIPTION,
        sanitizer::Backend::DEFAULT.map(|b| b.as_str())
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        sanitizer::MaxContentSize::NAME,
        sanitizer::MaxContentSize::DESCRIPTION,
        sanitizer::MaxContentSize::DEFAULT
    ));

    docs
}
