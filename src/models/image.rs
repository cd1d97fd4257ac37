//! 图片输入
//!
//! 前端上传的图片以 data URI（`data:image/png;base64,...`）或裸 base64 字符串传入，
//! 本模块不校验格式，只负责转换成上游接口可接受的 `image_url`。

use std::fmt;

/// 裸 base64 默认按 JPEG 处理
const DEFAULT_MIME_PREFIX: &str = "data:image/jpeg;base64,";

/// 单张图片输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInput<'a>(&'a str);

impl<'a> ImageInput<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self(raw)
    }

    /// 原始输入字符串
    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// 转换为上游接口使用的图片 URL
    pub fn to_image_url(&self) -> String {
        let trimmed = self.0.trim();
        if trimmed.starts_with("data:")
            || trimmed.starts_with("http://")
            || trimmed.starts_with("https://")
        {
            trimmed.to_string()
        } else {
            format!("{}{}", DEFAULT_MIME_PREFIX, trimmed)
        }
    }
}

impl fmt::Display for ImageInput<'_> {
    /// 只显示前缀和长度，避免把整张图片写进日志
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(24).collect();
        write!(f, "{}... ({} 字节)", head, self.0.len())
    }
}
