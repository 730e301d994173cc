//! 操作符定义

use crate::error::{Result, RuleError};
use std::fmt;
use std::str::FromStr;

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // 通用比较
    Eq,
    Neq,

    // 数值比较
    Gt,
    Gte,
    Lt,
    Lte,
    Between,

    // 包含检查
    Inq,
    Nin,

    // 字符串操作
    Regexp,
    Regexpi,

    // 空值检查
    Exists,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Between,
        Self::Inq,
        Self::Nin,
        Self::Regexp,
        Self::Regexpi,
        Self::Exists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::Inq => "inq",
            Self::Nin => "nin",
            Self::Regexp => "regexp",
            Self::Regexpi => "regexpi",
            Self::Exists => "exists",
        }
    }
}

impl FromStr for Operator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| RuleError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 数学操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl MathOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "pow",
        }
    }

    /// 按 IEEE 754 语义计算，除零得到 Infinity/NaN
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
            Self::Mod => lhs % rhs,
            Self::Pow => lhs.powf(rhs),
        }
    }
}

impl FromStr for MathOperator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Sub),
            "*" => Ok(Self::Mul),
            "/" => Ok(Self::Div),
            "%" => Ok(Self::Mod),
            "pow" => Ok(Self::Pow),
            other => Err(RuleError::InvalidMathOperator(other.to_string())),
        }
    }
}

impl fmt::Display for MathOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_str() {
        assert_eq!("gte".parse::<Operator>().unwrap(), Operator::Gte);
        assert_eq!("regexpi".parse::<Operator>().unwrap(), Operator::Regexpi);
        assert!(matches!(
            "like".parse::<Operator>(),
            Err(RuleError::UnknownOperator(op)) if op == "like"
        ));
    }

    #[test]
    fn test_math_operator() {
        let pow: MathOperator = "pow".parse().unwrap();
        assert_eq!(pow.apply(2.0, 10.0), 1024.0);
        assert_eq!(MathOperator::Mod.apply(7.0, 4.0), 3.0);
        assert!(MathOperator::Div.apply(1.0, 0.0).is_infinite());
        assert!(MathOperator::Mod.apply(1.0, 0.0).is_nan());
        assert!(matches!(
            "^".parse::<MathOperator>(),
            Err(RuleError::InvalidMathOperator(op)) if op == "^"
        ));
    }
}
