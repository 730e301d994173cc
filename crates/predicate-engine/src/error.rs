//! 规则引擎错误类型
//!
//! 所有错误均为致命错误：遍历中遇到的第一个错误会中止整个调用，不重试也不吞掉。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 结构错误 ====================
    #[error("表达式节点只能包含一个键, 实际 {count} 个: {keys:?}")]
    TooManyKeys { count: usize, keys: Vec<String> },

    #[error("and 表达式至少需要一个子表达式")]
    EmptyAnd,

    #[error("or 表达式至少需要一个子表达式")]
    EmptyOr,

    #[error("无效的表达式: {0}")]
    InvalidExpression(String),

    #[error("表达式嵌套超过最大深度 {0}")]
    MaxDepthExceeded(usize),

    // ==================== 引用错误 ====================
    #[error("上下文中不存在字段: {0}")]
    UnknownContextKey(String),

    #[error("结果消息引用的字段不存在: {0}")]
    UnknownConsequenceRef(String),

    // ==================== 类型错误 ====================
    #[error("字段 {path} 的上下文值类型无效: 期望 {expected}, 实际 {actual}")]
    InvalidContextType {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("字段 {path} 的操作数 {operand} 类型无效: 期望 {expected}, 实际 {actual}")]
    InvalidOperandType {
        path: String,
        operand: String,
        expected: String,
        actual: String,
    },

    #[error("无效的操作数: {0}")]
    InvalidOperand(String),

    // ==================== 操作符错误 ====================
    #[error("未知的比较操作符: {0}")]
    UnknownOperator(String),

    #[error("未知的数学操作符: {0}")]
    InvalidMathOperator(String),

    #[error("between 操作符需要 [min, max] 两个元素, 实际 {0} 个")]
    InvalidBetweenArity(usize),

    #[error("字段 {path} 的 between 范围无效: {low} > {high}")]
    InvalidBetweenRange { path: String, low: f64, high: f64 },

    #[error("无效的正则表达式 '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // ==================== 规则定义错误 ====================
    #[error("规则缺少 condition 字段")]
    MissingCondition,

    #[error("规则缺少 consequence 字段")]
    MissingConsequence,

    // ==================== 函数错误 ====================
    #[error("未注册的函数: {0}")]
    UnknownFunction(String),

    #[error("未注册的规则函数: {0}")]
    UnknownRuleFunction(String),

    #[error("函数名重复: {0}")]
    DuplicateFunction(String),

    #[error("函数 {name} 执行失败: {source}")]
    FunctionFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooManyKeys { .. } => "TOO_MANY_KEYS",
            Self::EmptyAnd => "EMPTY_AND",
            Self::EmptyOr => "EMPTY_OR",
            Self::InvalidExpression(_) => "INVALID_EXPRESSION",
            Self::MaxDepthExceeded(_) => "MAX_DEPTH_EXCEEDED",
            Self::UnknownContextKey(_) => "UNKNOWN_CONTEXT_KEY",
            Self::UnknownConsequenceRef(_) => "UNKNOWN_CONSEQUENCE_REF",
            Self::InvalidContextType { .. } => "INVALID_CONTEXT_TYPE",
            Self::InvalidOperandType { .. } => "INVALID_OPERAND_TYPE",
            Self::InvalidOperand(_) => "INVALID_OPERAND",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::InvalidMathOperator(_) => "INVALID_MATH_OPERATOR",
            Self::InvalidBetweenArity(_) => "INVALID_BETWEEN_ARITY",
            Self::InvalidBetweenRange { .. } => "INVALID_BETWEEN_RANGE",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::MissingCondition => "MISSING_CONDITION",
            Self::MissingConsequence => "MISSING_CONSEQUENCE",
            Self::UnknownFunction(_) => "UNKNOWN_FUNCTION",
            Self::UnknownRuleFunction(_) => "UNKNOWN_RULE_FUNCTION",
            Self::DuplicateFunction(_) => "DUPLICATE_FUNCTION",
            Self::FunctionFailed { .. } => "FUNCTION_FAILED",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = RuleError::UnknownContextKey("user.id".to_string());
        assert_eq!(err.code(), "UNKNOWN_CONTEXT_KEY");
        assert!(err.to_string().contains("user.id"));
    }
}
