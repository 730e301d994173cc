//! 操作数解析
//!
//! 将比较操作数解析为运行时值：字面量原样返回，引用从上下文按路径读取，
//! 算术表达式递归计算。

use crate::error::{Result, RuleError};
use crate::models::{EvaluationContext, Operand};
use serde_json::Value;

/// 运行时值
///
/// `Undefined` 表示路径不存在，与值为 null 区分。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    /// 上下文中的数组或对象
    Composite(&'a Value),
}

impl<'a> Resolved<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.as_str()),
            Value::Array(_) | Value::Object(_) => Self::Composite(value),
        }
    }

    pub fn from_field(value: Option<&'a Value>) -> Self {
        value.map_or(Self::Undefined, Self::from_value)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::String(s) => Some(*s),
            _ => None,
        }
    }

    /// 既不是 null 也不是 undefined
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Null)
    }

    /// 严格相等：不做类型转换，数组和对象永不相等
    pub fn strict_eq(&self, other: &Resolved<'_>) -> bool {
        match (self, other) {
            (Self::Undefined, Resolved::Undefined) | (Self::Null, Resolved::Null) => true,
            (Self::Bool(a), Resolved::Bool(b)) => a == b,
            (Self::Number(a), Resolved::Number(b)) => a == b,
            (Self::String(a), Resolved::String(b)) => a == b,
            _ => false,
        }
    }

    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Composite(Value::Array(_)) => "array",
            Self::Composite(_) => "object",
        }
    }
}

/// 解析操作数
///
/// # Arguments
/// * `field` - 所属比较的字段路径，用于错误信息
/// * `position` - 操作数在比较中的位置（如 "gt"、"between[0]"）
/// * `strict` - 校验模式下引用不存在的路径直接报错
pub fn resolve_operand<'a>(
    context: &'a EvaluationContext,
    operand: &'a Operand,
    field: &str,
    position: &str,
    strict: bool,
) -> Result<Resolved<'a>> {
    match operand {
        Operand::Literal(value) => Ok(Resolved::from_value(value)),
        Operand::Reference(path) => {
            let (value, exists) = context.resolve(path);
            if strict && !exists {
                return Err(RuleError::UnknownContextKey(path.clone()));
            }
            Ok(Resolved::from_field(value))
        }
        Operand::Math { op, lhs, rhs } => {
            let lhs_position = format!("{}.lhs", position);
            let rhs_position = format!("{}.rhs", position);

            let left = resolve_operand(context, lhs, field, &lhs_position, strict)?;
            let left = expect_number(&left, field, &lhs_position)?;
            let right = resolve_operand(context, rhs, field, &rhs_position, strict)?;
            let right = expect_number(&right, field, &rhs_position)?;

            Ok(Resolved::Number(op.apply(left, right)))
        }
    }
}

/// 断言操作数为数值
pub fn expect_number(value: &Resolved<'_>, field: &str, position: &str) -> Result<f64> {
    value.as_number().ok_or_else(|| RuleError::InvalidOperandType {
        path: field.to_string(),
        operand: position.to_string(),
        expected: "number".to_string(),
        actual: value.type_name().to_string(),
    })
}
