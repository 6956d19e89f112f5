use thiserror::Error;

/// Everything that can go wrong while turning a piece of text into candidates.
///
/// The `Display` text of each variant is exactly what the window shows in
/// place of a translation, so the wording is user-facing.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("{0}")]
    ConfigurationMissing(MissingSetting),

    #[error("Error: 网络请求失败 - {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Error: 读取响应失败 - {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("Error: API 返回错误 (HTTP {status}) - {body}")]
    ProviderHttp { status: u16, body: String },

    #[error("Error: 解析响应失败 - {0}")]
    ResponseParse(#[from] serde_json::Error),

    #[error("Error: API 错误 - {0}")]
    ProviderReported(String),

    #[error("Error: API 未返回翻译结果")]
    EmptyResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSetting {
    ApiKey,
    ApiUrl,
}

impl std::fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingSetting::ApiKey => f.write_str("请先在设置中配置 API Key"),
            MissingSetting::ApiUrl => f.write_str("请先在设置中配置 API URL"),
        }
    }
}

impl TranslateError {
    /// Whether the failure happened before anything was sent over the wire.
    pub fn is_local(&self) -> bool {
        matches!(self, TranslateError::ConfigurationMissing(_))
    }
}
