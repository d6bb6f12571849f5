// ABOUTME: Macro definition collection, call-site expansion, and the
// quote/unquote syntax primitives

use crate::ast::{self, Expression, Program, Statement};
use crate::env::Environment;
use crate::eval;
use crate::object::{MacroFunction, Object};
use std::rc::Rc;

/// First pass: removes top-level `let name = macro(...) {...}` statements
/// from the program and binds each as a `Macro` in the macro environment.
pub fn define_macros(program: &mut Program, env: &Rc<Environment>) {
    let statements = std::mem::take(&mut program.statements);
    for statement in statements {
        match statement {
            Statement::Let {
                name,
                value: Expression::MacroLiteral { parameters, body },
            } => {
                env.define(
                    name,
                    Object::Macro(Rc::new(MacroFunction {
                        parameters,
                        body,
                        env: env.clone(),
                    })),
                );
            }
            other => program.statements.push(other),
        }
    }
}

/// Second pass: replaces every call to a defined macro with the syntax the
/// macro body produces. Arguments reach the macro unevaluated, wrapped in
/// `Quote`; the body must yield a `Quote` back.
pub fn expand_macros(program: Program, env: &Rc<Environment>) -> Result<Program, String> {
    ast::modify_program(program, &mut |expr| match expr {
        Expression::Call {
            function,
            arguments,
        } => {
            if let Expression::Identifier(name) = function.as_ref() {
                if let Some(Object::Macro(m)) = env.get(name) {
                    return expand_call(&m, &arguments);
                }
            }
            Ok(Expression::Call {
                function,
                arguments,
            })
        }
        other => Ok(other),
    })
}

fn expand_call(m: &MacroFunction, arguments: &[Expression]) -> Result<Expression, String> {
    if m.parameters.len() != arguments.len() {
        return Err(format!(
            "wrong number of macro arguments: want={}, got={}",
            m.parameters.len(),
            arguments.len()
        ));
    }

    let eval_env = Environment::new_enclosed(m.env.clone());
    for (parameter, argument) in m.parameters.iter().zip(arguments) {
        eval_env.define(
            parameter.clone(),
            Object::Quote(Box::new(argument.clone())),
        );
    }

    let result = match eval::eval_block(&m.body, &eval_env) {
        Object::ReturnValue(value) => *value,
        other => other,
    };
    match result {
        Object::Quote(node) => Ok(*node),
        Object::Error(message) => Err(message),
        other => Err(format!(
            "macros must return quoted syntax, got {}",
            other.type_name()
        )),
    }
}

/// Returns the argument as unevaluated syntax, after splicing in the result
/// of every `unquote(...)` call found inside it.
pub fn quote(expr: &Expression, env: &Rc<Environment>) -> Object {
    let processed = ast::modify_expression(expr.clone(), &mut |e| match e {
        Expression::Call {
            function,
            arguments,
        } => {
            if matches!(function.as_ref(), Expression::Identifier(name) if name == "unquote")
                && arguments.len() == 1
            {
                let value = eval::eval_expression(&arguments[0], env);
                if let Object::Error(message) = value {
                    return Err(message);
                }
                return Ok(object_to_expression(value));
            }
            Ok(Expression::Call {
                function,
                arguments,
            })
        }
        other => Ok(other),
    });
    match processed {
        Ok(node) => Object::Quote(Box::new(node)),
        Err(message) => Object::Error(message),
    }
}

// Integers, booleans, and quoted syntax convert naturally; anything else is
// spliced as an identifier spelling its textual form.
fn object_to_expression(obj: Object) -> Expression {
    match obj {
        Object::Integer(value) => Expression::IntegerLiteral(value),
        Object::Boolean(value) => Expression::BooleanLiteral(value),
        Object::Quote(node) => *node,
        other => Expression::Identifier(other.to_string()),
    }
}
