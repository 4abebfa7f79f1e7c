//! # 通用工具模块
//!
//! - `path` - 数据目录（projects/ 与 db/）的定位
//! - `time` - 文件时间戳到 ISO 8601 字符串的转换

pub mod path;
pub mod time;
