//! # 时间格式化
//!
//! 项目列表中的 `createdAt` / `updatedAt` 来自文件元数据，
//! 这里将 `SystemTime` 转换为前端可直接 `new Date()` 的 ISO 8601 字符串。

use std::time::{SystemTime, UNIX_EPOCH};

/// 将 `SystemTime` 转换为 ISO 8601 格式字符串
///
/// 格式：`YYYY-MM-DDTHH:MM:SS.sssZ`（UTC 时间）。
/// 早于 Unix epoch 的时间按 epoch 处理。
pub fn system_time_to_iso8601(time: SystemTime) -> String {
    let Ok(duration) = time.duration_since(UNIX_EPOCH) else {
        return "1970-01-01T00:00:00.000Z".to_string();
    };

    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let days = total_secs / 86400;
    let time_of_day = total_secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_date(days);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year, month, day, hours, minutes, seconds, millis
    )
}

/// 天数 → (年, 月, 日)
///
/// 以 0000-03-01 为纪元按 400 年周期换算，月份从三月起算，闰日落在每年末尾。
fn days_to_date(days_since_epoch: u64) -> (u64, u64, u64) {
    let z = days_since_epoch + 719468;
    let era = z / 146097;
    let doe = z - era * 146097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_epoch() {
        assert_eq!(system_time_to_iso8601(UNIX_EPOCH), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_leap_day() {
        // 2024-02-29T12:30:15.250Z
        let time = UNIX_EPOCH + Duration::from_millis(1_709_209_815_250);
        assert_eq!(system_time_to_iso8601(time), "2024-02-29T12:30:15.250Z");
    }
}
