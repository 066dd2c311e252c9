use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 题目元数据错误（该题无法批改）
    #[error("题目元数据错误: {0}")]
    Metadata(#[from] MetadataError),
    /// 答案形状错误（需要转交大模型兜底批改）
    #[error("答案形状错误: {0}")]
    Shape(#[from] ShapeError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 题目元数据错误
#[derive(Debug, Error)]
pub enum MetadataError {
    /// 元数据文件不存在
    #[error("题目 {question_id} 的元数据不存在")]
    NotFound { question_id: String },
    /// 元数据文件无法解析
    #[error("题目 {question_id} 的元数据无法解析: {reason}")]
    Malformed { question_id: String, reason: String },
    /// 缺少评分所需字段
    #[error("题目 {question_id} 缺少字段 {field}")]
    MissingField { question_id: String, field: String },
    /// 扣分向量与参考答案长度不一致
    #[error("题目 {question_id} 的扣分向量长度 {penalties} 与参考答案长度 {answers} 不一致")]
    PenaltyLengthMismatch {
        question_id: String,
        penalties: usize,
        answers: usize,
    },
}

/// 答案形状错误
#[derive(Debug, Error)]
pub enum ShapeError {
    /// 填空数量与参考答案不一致
    #[error("学生答案长度 {submitted} 与参考答案长度 {expected} 不匹配")]
    LengthMismatch { expected: usize, submitted: usize },
    /// 答案类型与题型不符
    #[error("题型 {expected} 需要 {wanted}，收到的是 {got}")]
    UnexpectedKind {
        expected: String,
        wanted: &'static str,
        got: &'static str,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 调用超时
    #[error("LLM 调用超时 (模型: {model}, {timeout_secs}秒)")]
    Timeout { model: String, timeout_secs: u64 },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不符合约定格式
    #[error("LLM返回内容无法解析 ({reason}): {response}")]
    MalformedResponse { response: String, reason: String },
    /// 重试耗尽
    #[error("LLM 调用重试 {attempts} 次后仍然失败: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: Box<LlmError>,
    },
}

impl LlmError {
    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::RetriesExhausted { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建 JSON 解析错误
    pub fn json_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::JsonParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM格式错误
    pub fn malformed_response(response: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Llm(LlmError::MalformedResponse {
            response: response.into(),
            reason: reason.into(),
        })
    }

    /// 是否为答案形状错误（应转交兜底批改）
    pub fn is_shape_error(&self) -> bool {
        matches!(self, AppError::Shape(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
