// ABOUTME: Tree-walking evaluator for Monkey ASTs

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::builtins;
use crate::env::Environment;
use crate::macros;
use crate::object::{is_truthy, Function, HashPair, MacroFunction, Object};
use std::collections::HashMap;
use std::rc::Rc;

/// Evaluates a whole program. `ReturnValue` wrappers are stripped here, at
/// the outermost boundary; errors short-circuit the remaining statements.
pub fn eval_program(program: &Program, env: &Rc<Environment>) -> Object {
    let mut result = Object::Null;
    for statement in &program.statements {
        result = eval_statement(statement, env);
        match result {
            Object::ReturnValue(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }
    result
}

/// Evaluates a block. `ReturnValue` and `Error` pass through unwrapped so
/// they keep propagating out of nested blocks.
pub fn eval_block(block: &BlockStatement, env: &Rc<Environment>) -> Object {
    let mut result = Object::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env);
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(statement: &Statement, env: &Rc<Environment>) -> Object {
    match statement {
        Statement::Let { name, value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.define(name.clone(), value.clone());
            value
        }
        Statement::Return(value) => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            Object::ReturnValue(Box::new(value))
        }
        Statement::Expression(expr) => eval_expression(expr, env),
    }
}

pub fn eval_expression(expr: &Expression, env: &Rc<Environment>) -> Object {
    match expr {
        Expression::IntegerLiteral(value) => Object::Integer(*value),
        Expression::BooleanLiteral(value) => Object::Boolean(*value),
        Expression::StringLiteral(value) => Object::String(value.clone()),
        Expression::Identifier(name) => eval_identifier(name, env),
        Expression::Prefix { operator, right } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix(operator, right)
        }
        Expression::Infix {
            operator,
            left,
            right,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix(operator, left, right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }
            if is_truthy(&condition) {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Object::Null
            }
        }
        Expression::ArrayLiteral(elements) => match eval_expressions(elements, env) {
            Ok(elements) => Object::Array(elements),
            Err(error) => error,
        },
        Expression::HashLiteral(pairs) => eval_hash_literal(pairs, env),
        Expression::Index { left, index } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(index, env);
            if index.is_error() {
                return index;
            }
            eval_index(left, index)
        }
        Expression::FunctionLiteral {
            parameters, body, ..
        } => Object::Function(Rc::new(Function {
            parameters: parameters.clone(),
            body: body.clone(),
            env: env.clone(),
        })),
        Expression::MacroLiteral { parameters, body } => Object::Macro(Rc::new(MacroFunction {
            parameters: parameters.clone(),
            body: body.clone(),
            env: env.clone(),
        })),
        Expression::Call {
            function,
            arguments,
        } => {
            // `quote` suppresses evaluation of its argument; it is syntax,
            // not a builtin, and only exists as a direct call.
            if let Expression::Identifier(name) = function.as_ref() {
                if name == "quote" {
                    if arguments.len() != 1 {
                        return Object::error(format!(
                            "wrong number of arguments to quote. got={}, want=1",
                            arguments.len()
                        ));
                    }
                    return macros::quote(&arguments[0], env);
                }
            }
            let function = eval_expression(function, env);
            if function.is_error() {
                return function;
            }
            match eval_expressions(arguments, env) {
                Ok(args) => apply_function(function, args),
                Err(error) => error,
            }
        }
    }
}

fn eval_identifier(name: &str, env: &Rc<Environment>) -> Object {
    if let Some(value) = env.get(name) {
        return value;
    }
    if let Some(builtin) = builtins::lookup(name) {
        return Object::Builtin(builtin);
    }
    Object::error(format!("identifier not found: {}", name))
}

fn eval_expressions(
    expressions: &[Expression],
    env: &Rc<Environment>,
) -> Result<Vec<Object>, Object> {
    let mut results = Vec::with_capacity(expressions.len());
    for expr in expressions {
        let value = eval_expression(expr, env);
        if value.is_error() {
            return Err(value);
        }
        results.push(value);
    }
    Ok(results)
}

fn eval_prefix(operator: &str, right: Object) -> Object {
    match operator {
        "!" => Object::Boolean(!is_truthy(&right)),
        "-" => match right {
            Object::Integer(value) => Object::Integer(value.wrapping_neg()),
            other => Object::error(format!("unknown operator: -{}", other.type_name())),
        },
        _ => Object::error(format!("unknown operator: {}{}", operator, right.type_name())),
    }
}

fn eval_infix(operator: &str, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Object::String(l), Object::String(r)) => eval_string_infix(operator, l, r),
        (Object::Boolean(l), Object::Boolean(r)) => match operator {
            "==" => Object::Boolean(l == r),
            "!=" => Object::Boolean(l != r),
            _ => Object::error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        },
        (Object::Null, Object::Null) => match operator {
            "==" => Object::Boolean(true),
            "!=" => Object::Boolean(false),
            _ => Object::error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        },
        _ if left.type_name() != right.type_name() => match operator {
            // Values of different types are never equal; all other
            // operators reject the combination.
            "==" => Object::Boolean(false),
            "!=" => Object::Boolean(true),
            _ => Object::error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        },
        _ => Object::error(format!(
            "unknown operator: {} {} {}",
            left.type_name(),
            operator,
            right.type_name()
        )),
    }
}

fn eval_integer_infix(operator: &str, left: i64, right: i64) -> Object {
    match operator {
        "+" => Object::Integer(left.wrapping_add(right)),
        "-" => Object::Integer(left.wrapping_sub(right)),
        "*" => Object::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                Object::error("division by zero")
            } else {
                Object::Integer(left.wrapping_div(right))
            }
        }
        "<" => Object::Boolean(left < right),
        ">" => Object::Boolean(left > right),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        _ => Object::error(format!("unknown operator: INTEGER {} INTEGER", operator)),
    }
}

fn eval_string_infix(operator: &str, left: &str, right: &str) -> Object {
    match operator {
        "+" => Object::String(format!("{}{}", left, right)),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        _ => Object::error(format!("unknown operator: STRING {} STRING", operator)),
    }
}

fn eval_hash_literal(pairs: &[(Expression, Expression)], env: &Rc<Environment>) -> Object {
    let mut hash = HashMap::new();
    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env);
        if key.is_error() {
            return key;
        }
        let Some(hash_key) = key.hash_key() else {
            return Object::error(format!("unusable as hash key: {}", key.type_name()));
        };
        let value = eval_expression(value_expr, env);
        if value.is_error() {
            return value;
        }
        hash.insert(hash_key, HashPair { key, value });
    }
    Object::Hash(hash)
}

fn eval_index(left: Object, index: Object) -> Object {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(i)) => {
            if *i < 0 || *i as usize >= elements.len() {
                Object::Null
            } else {
                elements[*i as usize].clone()
            }
        }
        (Object::Hash(pairs), _) => {
            let Some(hash_key) = index.hash_key() else {
                return Object::error(format!("unusable as hash key: {}", index.type_name()));
            };
            pairs
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null)
        }
        _ => Object::error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

fn apply_function(function: Object, args: Vec<Object>) -> Object {
    match function {
        Object::Function(function) => {
            if function.parameters.len() != args.len() {
                return Object::error(format!(
                    "wrong number of arguments: want={}, got={}",
                    function.parameters.len(),
                    args.len()
                ));
            }
            let extended = Environment::new_enclosed(function.env.clone());
            for (parameter, arg) in function.parameters.iter().zip(args) {
                extended.define(parameter.clone(), arg);
            }
            match eval_block(&function.body, &extended) {
                Object::ReturnValue(value) => *value,
                other => other,
            }
        }
        Object::Builtin(builtin) => (builtin.func)(&args),
        other => Object::error(format!("not a function: {}", other.type_name())),
    }
}
