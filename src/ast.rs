// ABOUTME: AST node types for Monkey programs, their canonical rendering,
// and the subtree-substitution walk used by the macro subsystem

use std::fmt;

/// An ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let { name: String, value: Expression },
    Return(Expression),
    Expression(Expression),
}

/// A `{ ... }` block, as found in `if` branches and function bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(String),
    IntegerLiteral(i64),
    BooleanLiteral(bool),
    StringLiteral(String),
    ArrayLiteral(Vec<Expression>),
    HashLiteral(Vec<(Expression, Expression)>),
    Prefix {
        operator: String,
        right: Box<Expression>,
    },
    Infix {
        operator: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    FunctionLiteral {
        parameters: Vec<String>,
        body: BlockStatement,
        // Filled in by the parser for `let name = fn(...) {...}` so the
        // compiler can resolve direct self-reference.
        name: Option<String>,
    },
    MacroLiteral {
        parameters: Vec<String>,
        body: BlockStatement,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {} = {};", name, value),
            Statement::Return(value) => write!(f, "return {};", value),
            Statement::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::IntegerLiteral(value) => write!(f, "{}", value),
            Expression::BooleanLiteral(value) => write!(f, "{}", value),
            Expression::StringLiteral(value) => write!(f, "{}", value),
            Expression::ArrayLiteral(elements) => {
                write!(f, "[{}]", join(elements))
            }
            Expression::HashLiteral(pairs) => {
                let rendered: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{} {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {}", alternative)?;
                }
                Ok(())
            }
            Expression::FunctionLiteral {
                parameters,
                body,
                name,
            } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, "<{}>", name)?;
                }
                write!(f, "({}) {}", parameters.join(", "), body)
            }
            Expression::MacroLiteral { parameters, body } => {
                write!(f, "macro({}) {}", parameters.join(", "), body)
            }
            Expression::Call {
                function,
                arguments,
            } => write!(f, "{}({})", function, join(arguments)),
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}

fn join(expressions: &[Expression]) -> String {
    expressions
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rebuilds a program bottom-up, passing every expression node through
/// `modifier` after its children have been processed. The macro subsystem
/// uses this both to splice unquoted values into quoted syntax and to
/// replace macro call sites with their expansion.
pub fn modify_program<F>(program: Program, modifier: &mut F) -> Result<Program, String>
where
    F: FnMut(Expression) -> Result<Expression, String>,
{
    let statements = program
        .statements
        .into_iter()
        .map(|statement| modify_statement(statement, modifier))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { statements })
}

pub fn modify_statement<F>(statement: Statement, modifier: &mut F) -> Result<Statement, String>
where
    F: FnMut(Expression) -> Result<Expression, String>,
{
    Ok(match statement {
        Statement::Let { name, value } => Statement::Let {
            name,
            value: modify_expression(value, modifier)?,
        },
        Statement::Return(value) => Statement::Return(modify_expression(value, modifier)?),
        Statement::Expression(expr) => Statement::Expression(modify_expression(expr, modifier)?),
    })
}

fn modify_block<F>(block: BlockStatement, modifier: &mut F) -> Result<BlockStatement, String>
where
    F: FnMut(Expression) -> Result<Expression, String>,
{
    let statements = block
        .statements
        .into_iter()
        .map(|statement| modify_statement(statement, modifier))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BlockStatement { statements })
}

pub fn modify_expression<F>(expr: Expression, modifier: &mut F) -> Result<Expression, String>
where
    F: FnMut(Expression) -> Result<Expression, String>,
{
    let rebuilt = match expr {
        Expression::Prefix { operator, right } => Expression::Prefix {
            operator,
            right: Box::new(modify_expression(*right, modifier)?),
        },
        Expression::Infix {
            operator,
            left,
            right,
        } => Expression::Infix {
            operator,
            left: Box::new(modify_expression(*left, modifier)?),
            right: Box::new(modify_expression(*right, modifier)?),
        },
        Expression::If {
            condition,
            consequence,
            alternative,
        } => Expression::If {
            condition: Box::new(modify_expression(*condition, modifier)?),
            consequence: modify_block(consequence, modifier)?,
            alternative: alternative
                .map(|block| modify_block(block, modifier))
                .transpose()?,
        },
        Expression::FunctionLiteral {
            parameters,
            body,
            name,
        } => Expression::FunctionLiteral {
            parameters,
            body: modify_block(body, modifier)?,
            name,
        },
        Expression::ArrayLiteral(elements) => Expression::ArrayLiteral(
            elements
                .into_iter()
                .map(|e| modify_expression(e, modifier))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Expression::HashLiteral(pairs) => Expression::HashLiteral(
            pairs
                .into_iter()
                .map(|(k, v)| {
                    Ok((
                        modify_expression(k, modifier)?,
                        modify_expression(v, modifier)?,
                    ))
                })
                .collect::<Result<Vec<_>, String>>()?,
        ),
        Expression::Index { left, index } => Expression::Index {
            left: Box::new(modify_expression(*left, modifier)?),
            index: Box::new(modify_expression(*index, modifier)?),
        },
        Expression::Call {
            function,
            arguments,
        } => Expression::Call {
            function: Box::new(modify_expression(*function, modifier)?),
            arguments: arguments
                .into_iter()
                .map(|a| modify_expression(a, modifier))
                .collect::<Result<Vec<_>, _>>()?,
        },
        other => other,
    };
    modifier(rebuilt)
}
