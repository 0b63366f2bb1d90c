/// Zone used when neither the request nor `DEFAULT_TIMEZONE` names one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Default trailing window for the moving average, in buckets.
pub const DEFAULT_WINDOW_SIZE: u32 = 3;

pub const MIN_WINDOW_SIZE: u32 = 1;

pub const MAX_WINDOW_SIZE: u32 = 365;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 200;

