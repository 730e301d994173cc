//! 谓词规则引擎
//!
//! 提供可复用的表达式评估能力，支持：
//! - JSON 表达式解析（and/or/not、字段比较、引用、算术、函数调用）
//! - 短路求值与不短路的校验模式
//! - 最小原因提取
//! - 条件/结果规则序列执行

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod functions;
pub mod models;
pub mod operand;
pub mod operators;
pub mod rules;

pub use compiler::{ExpressionParser, RuleParser};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::{ExpressionExecutor, evaluate, evaluate_with_reason, validate};
pub use functions::{
    FnPredicate, FnRule, FunctionOptions, FunctionRegistry, FunctionsTable, PredicateFunction,
    RuleFunction, RuleFunctionsTable,
};
pub use models::{
    CompareOp, Condition, Consequence, ConsequenceTemplate, EvaluationContext, Expression,
    MessagePart, MessageTemplate, Operand, ReasonedResult, Rule,
};
pub use operand::Resolved;
pub use operators::{MathOperator, Operator};
pub use predicate_shared::config::EngineConfig;
pub use rules::{RulesEngine, evaluate_rules, resolve_consequence, validate_rules};
