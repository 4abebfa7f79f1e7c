//! # 项目文件名策略
//!
//! 所有进入项目目录的文件名都必须经过本模块：
//! - `ensure_json_extension` - 补全 `.json` 扩展名并统一为小写（幂等）
//! - `is_project_filename` - 项目列表收录的文件名，与冲突检查使用同一规则
//! - `filename_from_title` - 将项目标题整理为可用的文件名主干
//! - `generate_unique_filename` - 在已有文件集合中生成不冲突的文件名
//! - `validate_filename` - 拒绝空名称和任何可能逃逸项目目录的路径形式
//! - `validate_operation` - 重命名 / 复制 / 删除前的存在性与冲突校验

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// 项目文件的规范扩展名
pub const PROJECT_FILE_EXTENSION: &str = ".json";

/// 去重后缀匹配正则
///
/// 匹配 `名称 (n)` 形式的文件名主干，用于在已带后缀的名称上继续递增，
/// 避免生成 `Show A (1) (1).json` 这样的嵌套后缀。
static COUNTER_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*) \((?P<n>\d+)\)$").unwrap());

/// 为文件名补全 `.json` 扩展名
///
/// 已以 `.json`（不区分大小写）结尾的名称只把扩展名改写为小写，
/// 因此对同一输入多次调用结果不变，且结果总能出现在项目列表中。
pub fn ensure_json_extension(name: &str) -> String {
    if has_json_extension(name) {
        let stem = &name[..name.len() - PROJECT_FILE_EXTENSION.len()];
        format!("{}{}", stem, PROJECT_FILE_EXTENSION)
    } else {
        format!("{}{}", name, PROJECT_FILE_EXTENSION)
    }
}

/// 是否为项目列表收录的文件名：小写 `.json` 结尾且不以 `.` 开头
///
/// 以 `.` 开头的文件是原子写入的临时文件。
pub fn is_project_filename(name: &str) -> bool {
    name.ends_with(PROJECT_FILE_EXTENSION) && !name.starts_with('.')
}

/// 由项目标题生成文件名主干（不含扩展名）
///
/// 路径分隔符和 NUL 替换为 `-`，开头连续的 `.` 整体替换为一个 `-`，
/// 空标题使用 `fallback`。结果总能通过 [`validate_filename`]。
pub fn filename_from_title(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '-' } else { c })
        .collect();

    let without_dots = cleaned.trim_start_matches('.');
    let cleaned = if without_dots.len() < cleaned.len() {
        format!("-{}", without_dots)
    } else {
        cleaned
    };

    if cleaned.trim().is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// 按字节比较扩展名，保证截取主干时落在字符边界上
fn has_json_extension(name: &str) -> bool {
    let bytes = name.as_bytes();
    let ext = PROJECT_FILE_EXTENSION.as_bytes();
    bytes.len() >= ext.len() && bytes[bytes.len() - ext.len()..].eq_ignore_ascii_case(ext)
}

/// 在 `existing` 中生成一个不冲突的文件名
///
/// 请求的名称不冲突时原样返回（补全扩展名后）；冲突时在扩展名前追加
/// ` (n)`，n 从 1 开始递增直到不在集合中为止。
///
/// # 示例
/// - `"Show A"`，已有 `{"Show A.json"}` → `"Show A (1).json"`
/// - `"Show A (1).json"`，已有 `{"Show A (1).json"}` → `"Show A (2).json"`
pub fn generate_unique_filename(existing: &HashSet<String>, requested: &str) -> String {
    let filename = ensure_json_extension(requested);
    if !existing.contains(&filename) {
        return filename;
    }

    let stem = &filename[..filename.len() - PROJECT_FILE_EXTENSION.len()];
    let extension = &filename[filename.len() - PROJECT_FILE_EXTENSION.len()..];

    // 名称已带 (n) 后缀时从 n + 1 开始，否则从 1 开始；
    // n 超出 u64 范围时把整个主干当作基础名，追加新的 (1)
    let (mut base, mut counter) = COUNTER_SUFFIX_RE
        .captures(stem)
        .and_then(|caps| {
            let n = caps.name("n")?.as_str().parse::<u64>().ok()?.checked_add(1)?;
            Some((caps.name("base")?.as_str(), n))
        })
        .unwrap_or((stem, 1));

    loop {
        let candidate = format!("{} ({}){}", base, counter, extension);
        if !existing.contains(&candidate) {
            return candidate;
        }
        match counter.checked_add(1) {
            Some(next) => counter = next,
            None => {
                base = stem;
                counter = 1;
            }
        }
    }
}

/// 校验单个文件名是否可以安全地落在项目目录中
///
/// # 返回值
/// 合法时返回 `None`，否则返回人类可读的错误描述
pub fn validate_filename(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some("文件名不能为空".to_string());
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Some(format!("文件名 {} 不能包含路径分隔符", name));
    }
    // 以 . 开头的名称（含 . 和 ..）不会出现在项目列表中
    if name.starts_with('.') {
        return Some(format!("文件名 {} 不能以 . 开头", name));
    }
    None
}

/// 需要校验的文件操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation<'a> {
    Rename { from: &'a str, to: &'a str },
    Duplicate { from: &'a str, to: &'a str },
    Delete { filename: &'a str },
}

/// 校验文件操作
///
/// - 源文件必须存在
/// - 重命名 / 复制的目标文件不能已存在
/// - 所有涉及的文件名都必须通过 [`validate_filename`]
///
/// # 返回值
/// 错误描述列表，空列表表示校验通过
pub fn validate_operation(existing: &HashSet<String>, operation: FileOperation<'_>) -> Vec<String> {
    let mut errors = Vec::new();

    let (source, target) = match operation {
        FileOperation::Rename { from, to } | FileOperation::Duplicate { from, to } => {
            (from, Some(to))
        }
        FileOperation::Delete { filename } => (filename, None),
    };

    match validate_filename(source) {
        Some(error) => errors.push(error),
        None if !existing.contains(source) => {
            errors.push(format!("项目文件 {} 不存在", source));
        }
        None => {}
    }

    if let Some(target) = target {
        match validate_filename(target) {
            Some(error) => errors.push(error),
            None if existing.contains(target) => {
                errors.push(format!("项目文件 {} 已存在", target));
            }
            None => {}
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ensure_json_extension_is_idempotent() {
        for name in ["show", "show.json", "show.JSON", "", "a.b"] {
            let once = ensure_json_extension(name);
            assert_eq!(ensure_json_extension(&once), once);
        }
        assert_eq!(ensure_json_extension("show"), "show.json");
        assert_eq!(ensure_json_extension("show.json"), "show.json");
        assert_eq!(ensure_json_extension("show.JSON"), "show.json");
        assert_eq!(ensure_json_extension("秀.Json"), "秀.json");
    }

    #[test]
    fn test_generated_names_are_listed() {
        for name in ["X.JSON", "show", "a.b.Json"] {
            assert!(is_project_filename(&ensure_json_extension(name)));
        }
        assert!(!is_project_filename("X.JSON"));
        assert!(!is_project_filename(".show.json.tmp"));
        assert!(!is_project_filename(".hidden.json"));
    }

    #[test]
    fn test_filename_from_title() {
        assert_eq!(filename_from_title("Rock/Pop Night", "untitled"), "Rock-Pop Night");
        assert_eq!(filename_from_title("a\\b", "untitled"), "a-b");
        assert_eq!(filename_from_title("../evil", "untitled"), "--evil");
        assert_eq!(filename_from_title(".hidden", "untitled"), "-hidden");
        assert_eq!(filename_from_title("   ", "untitled"), "untitled");
        for title in ["..", ".", "/", "a/../b", " .x"] {
            let stem = filename_from_title(title, "untitled");
            assert!(validate_filename(&ensure_json_extension(&stem)).is_none(), "{}", stem);
        }
    }

    #[test]
    fn test_unique_filename_without_collision() {
        assert_eq!(generate_unique_filename(&set(&[]), "Show A"), "Show A.json");
    }

    #[test]
    fn test_unique_filename_appends_counter() {
        let existing = set(&["Show A.json"]);
        assert_eq!(generate_unique_filename(&existing, "Show A"), "Show A (1).json");

        let existing = set(&["Show A.json", "Show A (1).json", "Show A (2).json"]);
        assert_eq!(generate_unique_filename(&existing, "Show A.json"), "Show A (3).json");
    }

    #[test]
    fn test_unique_filename_continues_existing_counter() {
        let existing = set(&["Show A (1).json"]);
        assert_eq!(
            generate_unique_filename(&existing, "Show A (1).json"),
            "Show A (2).json"
        );
    }

    #[test]
    fn test_unique_filename_never_in_existing() {
        let existing = set(&[
            "x.json", "x (1).json", "x (2).json", "x (4).json", "x (1) (1).json",
        ]);
        for requested in ["x", "x.json", "x (1)", "x (2).json", "x (3)", "y"] {
            let generated = generate_unique_filename(&existing, requested);
            assert!(!existing.contains(&generated), "{} collided", generated);
        }
    }

    #[test]
    fn test_unique_filename_counter_at_u64_max() {
        let max = format!("x ({})", u64::MAX);
        let max_file = format!("{}.json", max);
        assert_eq!(
            generate_unique_filename(&set(&[max_file.as_str()]), &max),
            format!("{} (1).json", max)
        );

        let below = format!("x ({})", u64::MAX - 1);
        let below_file = format!("{}.json", below);
        let existing = set(&[below_file.as_str(), max_file.as_str()]);
        assert_eq!(
            generate_unique_filename(&existing, &below),
            format!("{} (1).json", below)
        );
    }

    #[test]
    fn test_validate_filename_rejects_paths() {
        assert!(validate_filename("show.json").is_none());
        assert!(validate_filename("").is_some());
        assert!(validate_filename("   ").is_some());
        assert!(validate_filename("../etc/passwd").is_some());
        assert!(validate_filename("a/b.json").is_some());
        assert!(validate_filename("a\\b.json").is_some());
        assert!(validate_filename("..").is_some());
        assert!(validate_filename(".hidden.json").is_some());
    }

    #[test]
    fn test_validate_rename_to_existing() {
        let existing = set(&["a.json", "b.json"]);
        let errors = validate_operation(
            &existing,
            FileOperation::Rename { from: "a.json", to: "b.json" },
        );
        assert_eq!(errors.len(), 1);

        let errors = validate_operation(
            &existing,
            FileOperation::Duplicate { from: "missing.json", to: "b.json" },
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_validate_valid_operations() {
        let existing = set(&["a.json"]);
        assert!(validate_operation(
            &existing,
            FileOperation::Duplicate { from: "a.json", to: "c.json" }
        )
        .is_empty());
        assert!(validate_operation(&existing, FileOperation::Delete { filename: "a.json" })
            .is_empty());
        assert_eq!(
            validate_operation(&existing, FileOperation::Delete { filename: "z.json" }).len(),
            1
        );
    }
}
