//! Calculator plugin: safe arithmetic expression evaluation.
//!
//! The expression is lexed and parsed into a private syntax tree, the tree is
//! validated against a closed whitelist (numeric constants, unary plus/minus,
//! the seven binary operators, the constants `pi` and `e`, and a fixed set of
//! math functions), and only then reduced. Nothing outside that grammar can
//! execute: there is no name lookup beyond the two constants and no call
//! target beyond the whitelist.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};

use super::{Plugin, PluginExample, PluginMetadata, PluginRequest, PluginResponse};

const ALLOWED_FUNCTIONS: [&str; 9] = [
    "sin", "cos", "tan", "sqrt", "log", "log10", "exp", "abs", "round",
];
const ALLOWED_NAMES: [&str; 2] = ["pi", "e"];

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Str,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
    Comma,
}

fn invalid(expression: &str, reason: impl Into<String>) -> Error {
    Error::ExpressionValidation {
        expression: expression.to_owned(),
        reason: reason.into(),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i = i.saturating_add(1),
            '+' => {
                tokens.push(Token::Plus);
                i = i.saturating_add(1);
            }
            '-' => {
                tokens.push(Token::Minus);
                i = i.saturating_add(1);
            }
            '*' => {
                if chars.get(i.saturating_add(1)) == Some(&'*') {
                    tokens.push(Token::DoubleStar);
                    i = i.saturating_add(2);
                } else {
                    tokens.push(Token::Star);
                    i = i.saturating_add(1);
                }
            }
            '/' => {
                if chars.get(i.saturating_add(1)) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i = i.saturating_add(2);
                } else {
                    tokens.push(Token::Slash);
                    i = i.saturating_add(1);
                }
            }
            '%' => {
                tokens.push(Token::Percent);
                i = i.saturating_add(1);
            }
            '(' => {
                tokens.push(Token::LParen);
                i = i.saturating_add(1);
            }
            ')' => {
                tokens.push(Token::RParen);
                i = i.saturating_add(1);
            }
            ',' => {
                tokens.push(Token::Comma);
                i = i.saturating_add(1);
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i = i.saturating_add(1);
                }
                // Scientific notation: 1e5, 2.5e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i.saturating_add(1);
                    if matches!(chars.get(j), Some('+') | Some('-')) {
                        j = j.saturating_add(1);
                    }
                    if chars.get(j).is_some_and(char::is_ascii_digit) {
                        i = j.saturating_add(1);
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i = i.saturating_add(1);
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                if literal == "." {
                    // A lone dot is attribute access, not a number.
                    tokens.push(Token::Dot);
                    continue;
                }
                let value = literal.parse::<f64>().map_err(|_| {
                    invalid(expression, format!("Invalid expression syntax: bad number literal '{literal}'"))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i = i.saturating_add(1);
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            quote @ ('\'' | '"') => {
                // String literals tokenize so that an unsafe call target is
                // reported before its arguments; the parser rejects them.
                i = i.saturating_add(1);
                while i < chars.len() && chars[i] != quote {
                    i = i.saturating_add(1);
                }
                if i >= chars.len() {
                    return Err(invalid(
                        expression,
                        "Invalid expression syntax: unterminated string literal",
                    ));
                }
                i = i.saturating_add(1);
                tokens.push(Token::Str);
            }
            '[' | ']' => {
                return Err(invalid(
                    expression,
                    "Unsupported node type: Subscript".to_owned(),
                ));
            }
            other => {
                return Err(invalid(
                    expression,
                    format!("Invalid expression syntax: unexpected character '{other}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser (recursive descent, Python precedence)
// ---------------------------------------------------------------------------

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            expression,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn parse(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(invalid(
                self.expression,
                "Invalid expression syntax: empty expression",
            ));
        }
        let expr = self.parse_sum()?;
        if self.pos < self.tokens.len() {
            if self.peek() == Some(&Token::Dot) {
                return Err(invalid(self.expression, "Unsupported node type: Attribute"));
            }
            return Err(invalid(
                self.expression,
                "Invalid expression syntax: unexpected trailing input",
            ));
        }
        Ok(expr)
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Mul),
            Some(Token::Slash) => Some(BinaryOp::Div),
            Some(Token::DoubleSlash) => Some(BinaryOp::FloorDiv),
            Some(Token::Percent) => Some(BinaryOp::Mod),
            _ => None,
        } {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Plus) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Pos,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.advance();
            // Exponent binds right and may carry a unary sign (2 ** -1).
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    // Reject unknown call targets before touching arguments.
                    if !ALLOWED_FUNCTIONS.contains(&name.as_str()) {
                        return Err(invalid(
                            self.expression,
                            format!("Unsafe function call: {name}"),
                        ));
                    }
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_sum()?);
                            match self.peek() {
                                Some(Token::Comma) => {
                                    self.advance();
                                }
                                _ => break,
                            }
                        }
                    }
                    match self.advance() {
                        Some(Token::RParen) => Ok(Expr::Call { name, args }),
                        _ => Err(invalid(
                            self.expression,
                            "Invalid expression syntax: expected ')'",
                        )),
                    }
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(invalid(
                        self.expression,
                        "Invalid expression syntax: expected ')'",
                    )),
                }
            }
            Some(Token::Str) => Err(invalid(self.expression, "Unsupported node type: Str")),
            other => Err(invalid(
                self.expression,
                format!("Invalid expression syntax: unexpected token {other:?}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation and evaluation
// ---------------------------------------------------------------------------

fn validate(expression: &str, expr: &Expr) -> Result<()> {
    match expr {
        Expr::Number(_) => Ok(()),
        Expr::Name(name) => {
            if ALLOWED_NAMES.contains(&name.as_str()) {
                Ok(())
            } else {
                Err(invalid(expression, format!("Unsafe name: {name}")))
            }
        }
        Expr::Unary { operand, .. } => validate(expression, operand),
        Expr::Binary { left, right, .. } => {
            validate(expression, left)?;
            validate(expression, right)
        }
        Expr::Call { name, args } => {
            if !ALLOWED_FUNCTIONS.contains(&name.as_str()) {
                return Err(invalid(
                    expression,
                    format!("Unsafe function call: {name}"),
                ));
            }
            for arg in args {
                validate(expression, arg)?;
            }
            Ok(())
        }
    }
}

fn evaluate(expression: &str, expr: &Expr) -> Result<f64> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Name(name) => match name.as_str() {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            other => Err(invalid(expression, format!("Unknown variable: {other}"))),
        },
        Expr::Unary { op, operand } => {
            let value = evaluate(expression, operand)?;
            Ok(match op {
                UnaryOp::Neg => -value,
                UnaryOp::Pos => value,
            })
        }
        Expr::Binary { op, left, right } => {
            let a = evaluate(expression, left)?;
            let b = evaluate(expression, right)?;
            match op {
                BinaryOp::Add => Ok(a + b),
                BinaryOp::Sub => Ok(a - b),
                BinaryOp::Mul => Ok(a * b),
                BinaryOp::Div => {
                    if b == 0.0 {
                        Err(invalid(expression, "Evaluation error: division by zero"))
                    } else {
                        Ok(a / b)
                    }
                }
                BinaryOp::FloorDiv => {
                    if b == 0.0 {
                        Err(invalid(expression, "Evaluation error: division by zero"))
                    } else {
                        Ok((a / b).floor())
                    }
                }
                BinaryOp::Mod => {
                    if b == 0.0 {
                        Err(invalid(expression, "Evaluation error: division by zero"))
                    } else {
                        // Python semantics: the result takes the divisor's sign.
                        Ok(a - b * (a / b).floor())
                    }
                }
                BinaryOp::Pow => Ok(a.powf(b)),
            }
        }
        Expr::Call { name, args } => {
            let values: Vec<f64> = args
                .iter()
                .map(|arg| evaluate(expression, arg))
                .collect::<Result<_>>()?;
            let arg1 = |values: &[f64]| -> Result<f64> {
                values.first().copied().ok_or_else(|| {
                    invalid(expression, format!("Evaluation error: {name}() needs an argument"))
                })
            };
            match name.as_str() {
                "sin" => Ok(arg1(&values)?.sin()),
                "cos" => Ok(arg1(&values)?.cos()),
                "tan" => Ok(arg1(&values)?.tan()),
                "sqrt" => Ok(arg1(&values)?.sqrt()),
                "log" => Ok(arg1(&values)?.ln()),
                "log10" => Ok(arg1(&values)?.log10()),
                "exp" => Ok(arg1(&values)?.exp()),
                "abs" => Ok(arg1(&values)?.abs()),
                "round" => Ok(arg1(&values)?.round()),
                other => Err(invalid(
                    expression,
                    format!("Function not allowed: {other}"),
                )),
            }
        }
    }
}

/// Safe mathematical expression evaluator.
#[derive(Debug, Default)]
pub struct MathEvaluator;

impl MathEvaluator {
    /// Parse, validate and evaluate `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpressionValidation`] for syntax errors, constructs
    /// outside the whitelist, and arithmetic faults.
    pub fn evaluate(&self, expression: &str) -> Result<f64> {
        let tokens = tokenize(expression)?;
        let tree = Parser::new(expression, tokens).parse()?;
        validate(expression, &tree)?;
        evaluate(expression, &tree)
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// A plugin that performs mathematical calculations.
#[derive(Debug, Default)]
pub struct CalculatorPlugin {
    evaluator: MathEvaluator,
    initialized: bool,
}

impl CalculatorPlugin {
    /// Create the plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for CalculatorPlugin {
    async fn initialize(&mut self, config: Option<&Value>) -> Result<()> {
        info!(?config, "initializing calculator plugin");
        self.initialized = true;
        Ok(())
    }

    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
        let Some(expression) = request.param_str("expression") else {
            return Ok(PluginResponse::error(
                &request.request_id,
                "No expression provided",
            ));
        };

        info!(expression, "evaluating expression");

        match self.evaluator.evaluate(expression) {
            Ok(result) => {
                let (value, type_name) = render_result(result);
                Ok(PluginResponse::success(
                    &request.request_id,
                    json!({
                        "expression": expression,
                        "result": value,
                        "type": type_name,
                    }),
                ))
            }
            Err(e) => Ok(PluginResponse::error(&request.request_id, e.to_string())),
        }
    }

    async fn shutdown(&mut self) {
        info!("shutting down calculator plugin");
        self.initialized = false;
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "calculator".to_owned(),
            version: "1.0.0".to_owned(),
            description: "Performs mathematical calculations and evaluations".to_owned(),
            author: "Straylight Team".to_owned(),
            capabilities: vec![
                "calculate".to_owned(),
                "math".to_owned(),
                "arithmetic".to_owned(),
                "evaluate".to_owned(),
            ],
            required_params: [(
                "expression".to_owned(),
                "Mathematical expression to evaluate".to_owned(),
            )]
            .into_iter()
            .collect(),
            optional_params: [(
                "precision".to_owned(),
                "Number of decimal places for the result".to_owned(),
            )]
            .into_iter()
            .collect(),
            examples: vec![
                PluginExample {
                    query: "Calculate 2 + 2".to_owned(),
                    parameters: json!({"expression": "2 + 2"}),
                },
                PluginExample {
                    query: "What is 15% of 200?".to_owned(),
                    parameters: json!({"expression": "200 * 0.15"}),
                },
                PluginExample {
                    query: "Calculate the area of a circle with radius 5".to_owned(),
                    parameters: json!({"expression": "pi * 5**2"}),
                },
            ],
        }
    }
}

/// Render an f64 result the way callers expect: integral values come back as
/// integers tagged `int`, everything else as a float tagged `float`.
fn render_result(result: f64) -> (Value, &'static str) {
    if result.is_finite() && result.fract() == 0.0 && result.abs() < 9.0e15 {
        #[allow(clippy::cast_possible_truncation)]
        let as_int = result as i64;
        (json!(as_int), "int")
    } else {
        (json!(result), "float")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str) -> f64 {
        MathEvaluator
            .evaluate(expression)
            .expect("expression should evaluate")
    }

    fn eval_err(expression: &str) -> String {
        MathEvaluator
            .evaluate(expression)
            .expect_err("expression should be rejected")
            .to_string()
    }

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(eval("2 + 2"), 4.0);
        assert_eq!(eval("10 - 3 * 2"), 4.0);
        assert_eq!(eval("(10 - 3) * 2"), 14.0);
        assert_eq!(eval("7 / 2"), 3.5);
        assert_eq!(eval("7 // 2"), 3.0);
        assert_eq!(eval("7 % 3"), 1.0);
        assert_eq!(eval("2 ** 10"), 1024.0);
    }

    #[test]
    fn test_python_precedence_for_power_and_unary() {
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("2 ** -1"), 0.5);
        assert_eq!(eval("(-2) ** 2"), 4.0);
    }

    #[test]
    fn test_python_modulo_follows_divisor_sign() {
        assert_eq!(eval("-7 % 3"), 2.0);
        assert_eq!(eval("7 % -3"), -2.0);
    }

    #[test]
    fn test_constants_and_functions() {
        assert!((eval("pi") - std::f64::consts::PI).abs() < 1e-12);
        assert!((eval("sin(0)")).abs() < 1e-12);
        assert_eq!(eval("sqrt(16)"), 4.0);
        assert_eq!(eval("abs(-3)"), 3.0);
        assert_eq!(eval("round(2.5)"), 3.0);
        assert!((eval("log(e)") - 1.0).abs() < 1e-12);
        assert_eq!(eval("log10(100)"), 2.0);
    }

    #[test]
    fn test_unknown_function_is_unsafe() {
        let msg = eval_err("__import__('os')");
        assert!(msg.contains("Unsafe function call: __import__"), "{msg}");
    }

    #[test]
    fn test_attribute_chain_rejected_at_call_target() {
        // The call-target check fires before arguments or attribute access
        // are even looked at.
        let msg = eval_err("__import__('os').system('ls')");
        assert!(msg.contains("Unsafe function call: __import__"), "{msg}");
    }

    #[test]
    fn test_attribute_access_unsupported() {
        let msg = eval_err("abs(1).real");
        assert!(msg.contains("Unsupported node type: Attribute"), "{msg}");
    }

    #[test]
    fn test_unknown_name_is_unsafe() {
        let msg = eval_err("x + 1");
        assert!(msg.contains("Unsafe name: x"), "{msg}");
    }

    #[test]
    fn test_string_literal_is_unsupported_node() {
        let msg = eval_err("'os'");
        assert!(msg.contains("Unsupported node type"), "{msg}");
    }

    #[test]
    fn test_division_by_zero() {
        let msg = eval_err("1 / 0");
        assert!(msg.contains("division by zero"), "{msg}");
    }

    #[test]
    fn test_render_result_int_vs_float() {
        assert_eq!(render_result(4.0), (json!(4), "int"));
        assert_eq!(render_result(3.5), (json!(3.5), "float"));
    }
}
