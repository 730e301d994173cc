//! 条件评估器
//!
//! 实现单个字段比较的评估逻辑，做严格的类型检查，不做隐式类型转换。

use crate::error::{Result, RuleError};
use crate::models::{CompareOp, EvaluationContext, Operand};
use crate::operand::{Resolved, expect_number, resolve_operand};
use regex::RegexBuilder;
use serde_json::Value;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `op` - 比较操作
    /// * `field` - 字段路径，用于错误信息
    /// * `field_value` - 从上下文中获取的字段值，None 表示字段不存在
    /// * `context` - 评估上下文，用于解析操作数中的引用
    /// * `strict` - 校验模式
    pub fn compare<'a>(
        op: &'a CompareOp,
        field: &str,
        field_value: Option<&'a Value>,
        context: &'a EvaluationContext,
        strict: bool,
    ) -> Result<bool> {
        let actual = Resolved::from_field(field_value);
        let resolve = |operand: &'a Operand, position: &str| {
            resolve_operand(context, operand, field, position, strict)
        };

        match op {
            CompareOp::Equals(expected) => Ok(actual.strict_eq(&resolve(expected, "value")?)),
            CompareOp::Eq(expected) => Ok(actual.strict_eq(&resolve(expected, "eq")?)),
            CompareOp::Neq(expected) => Ok(!actual.strict_eq(&resolve(expected, "neq")?)),
            CompareOp::Gt(expected)
            | CompareOp::Gte(expected)
            | CompareOp::Lt(expected)
            | CompareOp::Lte(expected) => {
                // 先检查上下文值，再解析操作数
                let field_num = Self::context_number(&actual, field)?;
                let position = Self::position(op);
                let expected = expect_number(&resolve(expected, position)?, field, position)?;

                Ok(Self::order(op, field_num, expected))
            }
            CompareOp::Between(low, high) => {
                let value = Self::context_number(&actual, field)?;
                let low = expect_number(&resolve(low, "between[0]")?, field, "between[0]")?;
                let high = expect_number(&resolve(high, "between[1]")?, field, "between[1]")?;

                // NaN 边界无法排序，按范围无效处理
                if !(low <= high) {
                    return Err(RuleError::InvalidBetweenRange {
                        path: field.to_string(),
                        low,
                        high,
                    });
                }

                Ok(value >= low && value <= high)
            }
            CompareOp::Inq(items) => Self::in_list(&actual, items, "inq", &resolve),
            CompareOp::Nin(items) => Self::in_list(&actual, items, "nin", &resolve).map(|r| !r),
            CompareOp::Regexp(pattern) | CompareOp::Regexpi(pattern) => {
                let text = Self::context_str(&actual, field)?;
                let position = Self::position(op);
                let pattern = resolve(pattern, position)?;
                let case_insensitive = matches!(op, CompareOp::Regexpi(_));

                Self::regex_match(text, field, pattern, position, case_insensitive)
            }
            CompareOp::Exists(expected) => Ok(actual.is_present() == *expected),
        }
    }

    /// 操作符名，用于标记操作数位置
    fn position(op: &CompareOp) -> &'static str {
        op.operator().map_or("value", |operator| operator.as_str())
    }

    /// 数值排序比较，仅用于 gt/gte/lt/lte
    fn order(op: &CompareOp, lhs: f64, rhs: f64) -> bool {
        match op {
            CompareOp::Gt(_) => lhs > rhs,
            CompareOp::Gte(_) => lhs >= rhs,
            CompareOp::Lt(_) => lhs < rhs,
            _ => lhs <= rhs,
        }
    }

    /// 列表包含检查 (inq/nin)
    fn in_list<'a, R>(
        actual: &Resolved<'_>,
        items: &'a [Operand],
        position: &str,
        resolve: &R,
    ) -> Result<bool>
    where
        R: Fn(&'a Operand, &str) -> Result<Resolved<'a>>,
    {
        let mut found = false;
        // 每个元素都要解析，保证引用错误在任何位置都能暴露
        for (i, item) in items.iter().enumerate() {
            let item = resolve(item, &format!("{}[{}]", position, i))?;
            found |= actual.strict_eq(&item);
        }

        Ok(found)
    }

    /// 正则表达式匹配
    fn regex_match(
        text: &str,
        field: &str,
        pattern: Resolved<'_>,
        position: &str,
        case_insensitive: bool,
    ) -> Result<bool> {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| RuleError::InvalidOperandType {
                path: field.to_string(),
                operand: position.to_string(),
                expected: "string (regex pattern)".to_string(),
                actual: pattern.type_name().to_string(),
            })?;

        // 每次评估都重新编译；表达式不做编译缓存
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(regex.is_match(text))
    }

    /// 断言上下文中的字段值为字符串
    fn context_str<'a>(actual: &Resolved<'a>, field: &str) -> Result<&'a str> {
        actual.as_str().ok_or_else(|| RuleError::InvalidContextType {
            path: field.to_string(),
            expected: "string".to_string(),
            actual: actual.type_name().to_string(),
        })
    }

    /// 断言上下文中的字段值为数值
    fn context_number(actual: &Resolved<'_>, field: &str) -> Result<f64> {
        actual.as_number().ok_or_else(|| RuleError::InvalidContextType {
            path: field.to_string(),
            expected: "number".to_string(),
            actual: actual.type_name().to_string(),
        })
    }
}
