// ABOUTME: Stack-based virtual machine executing compiled bytecode against a
// value stack, a call-frame stack, and a flat globals array

use crate::builtins::BUILTINS;
use crate::code::{read_u16, read_u8, Opcode};
use crate::compiler::Bytecode;
use crate::config::VmLimits;
use crate::error::VmError;
use crate::object::{is_truthy, Builtin, Closure, CompiledFunction, HashPair, Object};
use std::collections::HashMap;
use std::rc::Rc;

/// Per-call record: the executing closure, the instruction pointer (index of
/// the next instruction), and the stack slot where the frame's arguments and
/// locals begin.
struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame {
            closure,
            ip: 0,
            base_pointer,
        }
    }
}

pub struct VM {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
    max_frames: usize,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        let limits = VmLimits::default();
        let globals = vec![Object::Null; limits.globals_size];
        Self::with_state(bytecode, limits, globals)
    }

    /// Reuses a globals array from a previous run, so REPL definitions
    /// survive across lines.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        Self::with_state(bytecode, VmLimits::default(), globals)
    }

    pub fn with_state(bytecode: Bytecode, limits: VmLimits, mut globals: Vec<Object>) -> Self {
        globals.resize(limits.globals_size, Object::Null);
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });
        let mut frames = Vec::with_capacity(limits.max_frames);
        frames.push(Frame::new(main_closure, 0));

        VM {
            constants: bytecode.constants,
            stack: vec![Object::Null; limits.stack_size],
            sp: 0,
            globals,
            frames,
            max_frames: limits.max_frames,
        }
    }

    /// Hands the globals array back for the next `with_globals` call.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    pub fn stack_top(&self) -> Option<&Object> {
        if self.sp == 0 {
            None
        } else {
            Some(&self.stack[self.sp - 1])
        }
    }

    /// The slot just above `sp` holds the most recently popped value; the
    /// REPL reads the result of the last expression statement here.
    pub fn last_popped(&self) -> &Object {
        &self.stack[self.sp]
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let byte = {
                let frame = self.current_frame();
                let instructions = &frame.closure.func.instructions.0;
                if frame.ip >= instructions.len() {
                    break;
                }
                let byte = instructions[frame.ip];
                frame.ip += 1;
                byte
            };

            let op = Opcode::try_from(byte)?;
            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand();
                    self.push(self.constants[index].clone())?;
                }
                Opcode::Pop => {
                    self.pop();
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,
                Opcode::Null => self.push(Object::Null)?,
                Opcode::Minus => {
                    let operand = self.pop();
                    match operand {
                        Object::Integer(value) => {
                            self.push(Object::Integer(value.wrapping_neg()))?
                        }
                        other => return Err(VmError::UnsupportedNegation(other.type_name())),
                    }
                }
                Opcode::Bang => {
                    let operand = self.pop();
                    self.push(Object::Boolean(!is_truthy(&operand)))?;
                }
                Opcode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame().ip = target;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.pop();
                    if !is_truthy(&condition) {
                        self.current_frame().ip = target;
                    }
                }
                Opcode::SetGlobal => {
                    let index = self.read_u16_operand();
                    self.globals[index] = self.pop();
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16_operand();
                    self.push(self.globals[index].clone())?;
                }
                Opcode::SetLocal => {
                    let index = self.read_u8_operand();
                    let slot = self.current_frame().base_pointer + index;
                    self.stack[slot] = self.pop();
                }
                Opcode::GetLocal => {
                    let index = self.read_u8_operand();
                    let slot = self.current_frame().base_pointer + index;
                    self.push(self.stack[slot].clone())?;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand();
                    self.push(Object::Builtin(BUILTINS[index]))?;
                }
                Opcode::GetFree => {
                    let index = self.read_u8_operand();
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Object::Closure(closure))?;
                }
                Opcode::Closure => {
                    let constant = self.read_u16_operand();
                    let num_free = self.read_u8_operand();
                    self.push_closure(constant, num_free)?;
                }
                Opcode::Array => {
                    let count = self.read_u16_operand();
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::Array(elements))?;
                }
                Opcode::Hash => {
                    let count = self.read_u16_operand();
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }
                Opcode::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index(left, index)?;
                }
                Opcode::Call => {
                    let num_args = self.read_u8_operand();
                    self.execute_call(num_args)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Object::Null)?;
                }
            }
        }
        Ok(())
    }

    fn current_frame(&mut self) -> &mut Frame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    // Frame underflow means the compiler emitted a return outside any
    // function; that is a bug, not a recoverable condition.
    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("call frame underflow")
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.current_frame();
        let value = read_u16(&frame.closure.func.instructions.0[frame.ip..]);
        frame.ip += 2;
        value as usize
    }

    fn read_u8_operand(&mut self) -> usize {
        let frame = self.current_frame();
        let value = read_u8(&frame.closure.func.instructions.0[frame.ip..]);
        frame.ip += 1;
        value as usize
    }

    fn push(&mut self, obj: Object) -> Result<(), VmError> {
        if self.sp >= self.stack.len() {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();
        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l.wrapping_add(*r),
                    Opcode::Sub => l.wrapping_sub(*r),
                    Opcode::Mul => l.wrapping_mul(*r),
                    Opcode::Div => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    _ => return Err(VmError::UnknownIntegerOperator(op.definition().name)),
                };
                self.push(Object::Integer(result))
            }
            (Object::String(l), Object::String(r)) => match op {
                Opcode::Add => self.push(Object::String(format!("{}{}", l, r))),
                _ => Err(VmError::UnknownStringOperator(op.definition().name)),
            },
            _ => Err(VmError::unsupported_binary(
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();
        let result = match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                Opcode::GreaterThan => l > r,
                _ => return Err(VmError::UnknownIntegerOperator(op.definition().name)),
            },
            (Object::String(l), Object::String(r)) => match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                _ => return Err(VmError::UnknownStringOperator(op.definition().name)),
            },
            (Object::Boolean(l), Object::Boolean(r)) => match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                _ => return Err(VmError::UnknownBooleanOperator(op.definition().name)),
            },
            (Object::Null, Object::Null) => match op {
                Opcode::Equal => true,
                Opcode::NotEqual => false,
                _ => {
                    return Err(VmError::unsupported_binary(
                        left.type_name(),
                        right.type_name(),
                    ))
                }
            },
            _ if left.type_name() != right.type_name() => match op {
                // Values of different types are never equal.
                Opcode::Equal => false,
                Opcode::NotEqual => true,
                _ => {
                    return Err(VmError::unsupported_binary(
                        left.type_name(),
                        right.type_name(),
                    ))
                }
            },
            _ => {
                return Err(VmError::unsupported_binary(
                    left.type_name(),
                    right.type_name(),
                ))
            }
        };
        self.push(Object::Boolean(result))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Object, VmError> {
        let mut pairs = HashMap::new();
        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let Some(hash_key) = key.hash_key() else {
                return Err(VmError::UnusableHashKey(key.type_name()));
            };
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        Ok(Object::Hash(pairs))
    }

    fn execute_index(&mut self, left: Object, index: Object) -> Result<(), VmError> {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                let value = if *i < 0 || *i as usize >= elements.len() {
                    Object::Null
                } else {
                    elements[*i as usize].clone()
                };
                self.push(value)
            }
            (Object::Hash(pairs), _) => {
                let Some(hash_key) = index.hash_key() else {
                    return Err(VmError::UnusableHashKey(index.type_name()));
                };
                let value = pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null);
                self.push(value)
            }
            _ => Err(VmError::IndexNotSupported(left.type_name())),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(VmError::CallingNonCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<(), VmError> {
        if num_args != closure.func.num_parameters {
            return Err(VmError::wrong_arguments(
                closure.func.num_parameters,
                num_args,
            ));
        }
        if self.frames.len() >= self.max_frames {
            return Err(VmError::StackOverflow);
        }
        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + closure.func.num_locals;
        if new_sp > self.stack.len() {
            return Err(VmError::StackOverflow);
        }
        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = new_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: Builtin, num_args: usize) -> Result<(), VmError> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args);
        self.sp = self.sp - num_args - 1;
        self.push(result)
    }

    fn push_closure(&mut self, constant: usize, num_free: usize) -> Result<(), VmError> {
        let func = match &self.constants[constant] {
            Object::CompiledFunction(func) => func.clone(),
            other => return Err(VmError::NotAFunction(other.type_name())),
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Object::Closure(Rc::new(Closure { func, free })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn run_vm(input: &str) -> Result<Object, VmError> {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for {:?}: {:?}",
            input,
            parser.errors()
        );
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compilation succeeds");
        let mut vm = VM::new(compiler.bytecode());
        vm.run()?;
        Ok(vm.last_popped().clone())
    }

    fn expect_integer(input: &str, expected: i64) {
        match run_vm(input).expect("vm run succeeds") {
            Object::Integer(n) => assert_eq!(n, expected, "input: {:?}", input),
            other => panic!("expected Integer for {:?}, got {:?}", input, other),
        }
    }

    fn expect_boolean(input: &str, expected: bool) {
        match run_vm(input).expect("vm run succeeds") {
            Object::Boolean(b) => assert_eq!(b, expected, "input: {:?}", input),
            other => panic!("expected Boolean for {:?}, got {:?}", input, other),
        }
    }

    fn expect_null(input: &str) {
        match run_vm(input).expect("vm run succeeds") {
            Object::Null => {}
            other => panic!("expected Null for {:?}, got {:?}", input, other),
        }
    }

    fn expect_error(input: &str, expected: VmError) {
        match run_vm(input) {
            Err(err) => assert_eq!(err, expected, "input: {:?}", input),
            Ok(result) => panic!(
                "expected error {:?} for {:?}, got result {:?}",
                expected, input, result
            ),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        let cases = [
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("1 * 2", 2),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("5 * 2 + 10", 20),
            ("5 + 2 * 10", 25),
            ("5 * (2 + 10)", 60),
            ("-5", -5),
            ("-10", -10),
            ("-50 + 100 + -50", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];
        for (input, expected) in cases {
            expect_integer(input, expected);
        }
    }

    #[test]
    fn test_boolean_expressions() {
        let cases = [
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 < 1", false),
            ("1 > 1", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("1 == 2", false),
            ("1 != 2", true),
            ("true == true", true),
            ("false == false", true),
            ("true == false", false),
            ("true != false", true),
            ("false != true", true),
            ("(1 < 2) == true", true),
            ("(1 < 2) == false", false),
            ("(1 > 2) == true", false),
            ("(1 > 2) == false", true),
            ("!true", false),
            ("!false", true),
            ("!5", false),
            ("!!true", true),
            ("!!false", false),
            ("!!5", true),
            ("!(if (false) { 5; })", true),
            ("\"a\" == \"a\"", true),
            ("\"a\" != \"b\"", true),
        ];
        for (input, expected) in cases {
            expect_boolean(input, expected);
        }
    }

    #[test]
    fn test_equality_across_types_is_false() {
        expect_boolean("1 == true", false);
        expect_boolean("1 != true", true);
        expect_boolean("\"1\" == 1", false);
    }

    #[test]
    fn test_conditionals() {
        let cases = [
            ("if (true) { 10 }", 10),
            ("if (true) { 10 } else { 20 }", 10),
            ("if (false) { 10 } else { 20 }", 20),
            ("if (1) { 10 }", 10),
            ("if (1 < 2) { 10 }", 10),
            ("if (1 < 2) { 10 } else { 20 }", 10),
            ("if (1 > 2) { 10 } else { 20 }", 20),
            ("if ((if (false) { 10 })) { 10 } else { 20 }", 20),
        ];
        for (input, expected) in cases {
            expect_integer(input, expected);
        }
        expect_null("if (1 > 2) { 10 }");
        expect_null("if (false) { 10 }");
    }

    #[test]
    fn test_global_let_statements() {
        expect_integer("let one = 1; one", 1);
        expect_integer("let one = 1; let two = 2; one + two", 3);
        expect_integer("let one = 1; let two = one + one; one + two", 3);
    }

    #[test]
    fn test_string_expressions() {
        let cases = [
            ("\"monkey\"", "monkey"),
            ("\"mon\" + \"key\"", "monkey"),
            ("\"mon\" + \"key\" + \"banana\"", "monkeybanana"),
        ];
        for (input, expected) in cases {
            match run_vm(input).expect("vm run succeeds") {
                Object::String(value) => assert_eq!(value, expected),
                other => panic!("expected String for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_array_literals() {
        let cases: [(&str, &[i64]); 3] = [
            ("[]", &[]),
            ("[1, 2, 3]", &[1, 2, 3]),
            ("[1 + 2, 3 * 4, 5 + 6]", &[3, 12, 11]),
        ];
        for (input, expected) in cases {
            match run_vm(input).expect("vm run succeeds") {
                Object::Array(elements) => {
                    assert_eq!(elements.len(), expected.len());
                    for (element, want) in elements.iter().zip(expected) {
                        match element {
                            Object::Integer(n) => assert_eq!(n, want),
                            other => panic!("expected Integer, got {:?}", other),
                        }
                    }
                }
                other => panic!("expected Array for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_hash_literals() {
        match run_vm("{1: 2, 2: 3}").expect("vm run succeeds") {
            Object::Hash(pairs) => {
                assert_eq!(pairs.len(), 2);
                let key = Object::Integer(1).hash_key().expect("hashable");
                match &pairs.get(&key).expect("pair present").value {
                    Object::Integer(n) => assert_eq!(*n, 2),
                    other => panic!("expected Integer, got {:?}", other),
                }
            }
            other => panic!("expected Hash, got {:?}", other),
        }
        match run_vm("{1 + 1: 2 * 2, 3 + 3: 4 * 4}").expect("vm run succeeds") {
            Object::Hash(pairs) => {
                assert_eq!(pairs.len(), 2);
                let key = Object::Integer(6).hash_key().expect("hashable");
                match &pairs.get(&key).expect("pair present").value {
                    Object::Integer(n) => assert_eq!(*n, 16),
                    other => panic!("expected Integer, got {:?}", other),
                }
            }
            other => panic!("expected Hash, got {:?}", other),
        }
    }

    #[test]
    fn test_index_expressions() {
        let cases = [
            ("[1, 2, 3][1]", 2),
            ("[1, 2, 3][0 + 2]", 3),
            ("[[1, 1, 1]][0][0]", 1),
            ("{1: 1, 2: 2}[1]", 1),
            ("{1: 1, 2: 2}[2]", 2),
        ];
        for (input, expected) in cases {
            expect_integer(input, expected);
        }
        for input in [
            "[][0]",
            "[1, 2, 3][99]",
            "[1][-1]",
            "{1: 1}[0]",
            "{}[0]",
        ] {
            expect_null(input);
        }
    }

    #[test]
    fn test_calling_functions_without_arguments() {
        expect_integer("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
        expect_integer(
            "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
            3,
        );
        expect_integer(
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            3,
        );
    }

    #[test]
    fn test_functions_with_return_statement() {
        expect_integer("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
        expect_integer(
            "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
            99,
        );
    }

    #[test]
    fn test_functions_without_return_value() {
        expect_null("let noReturn = fn() { }; noReturn();");
        expect_null(
            "let noReturn = fn() { };
             let noReturnTwo = fn() { noReturn(); };
             noReturn();
             noReturnTwo();",
        );
    }

    #[test]
    fn test_first_class_functions() {
        expect_integer(
            "let returnsOneReturner = fn() {
                 let returnsOne = fn() { 1; };
                 returnsOne;
             };
             returnsOneReturner()();",
            1,
        );
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        expect_integer("let one = fn() { let one = 1; one }; one();", 1);
        expect_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        );
        expect_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
             let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
             oneAndTwo() + threeAndFour();",
            10,
        );
        expect_integer(
            "let firstFoobar = fn() { let foobar = 50; foobar; };
             let secondFoobar = fn() { let foobar = 100; foobar; };
             firstFoobar() + secondFoobar();",
            150,
        );
        expect_integer(
            "let globalSeed = 50;
             let minusOne = fn() { let num = 1; globalSeed - num; };
             let minusTwo = fn() { let num = 2; globalSeed - num; };
             minusOne() + minusTwo();",
            97,
        );
    }

    #[test]
    fn test_calling_functions_with_arguments_and_bindings() {
        expect_integer("let identity = fn(a) { a; }; identity(4);", 4);
        expect_integer("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
        expect_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);",
            3,
        );
        expect_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        );
        expect_integer(
            "let globalNum = 10;
             let sum = fn(a, b) {
                 let c = a + b;
                 c + globalNum;
             };
             let outer = fn() {
                 sum(1, 2) + sum(3, 4) + globalNum;
             };
             outer() + globalNum;",
            50,
        );
    }

    #[test]
    fn test_calling_functions_with_wrong_arguments() {
        expect_error("fn() { 1; }(1);", VmError::wrong_arguments(0, 1));
        expect_error("fn(a) { a; }();", VmError::wrong_arguments(1, 0));
        expect_error("fn(a, b) { a + b; }(1);", VmError::wrong_arguments(2, 1));
    }

    #[test]
    fn test_builtin_functions() {
        expect_integer("len(\"\")", 0);
        expect_integer("len(\"four\")", 4);
        expect_integer("len(\"hello world\")", 11);
        expect_integer("len([1, 2, 3])", 3);
        expect_integer("len([])", 0);
        expect_integer("first([1, 2, 3])", 1);
        expect_integer("last([1, 2, 3])", 3);
        expect_null("first([])");
        expect_null("last([])");
        expect_null("rest([])");

        // builtin failures surface as error objects on the stack
        match run_vm("len(1)").expect("vm run succeeds") {
            Object::Error(message) => {
                assert_eq!(message, "argument to `len` not supported, got INTEGER")
            }
            other => panic!("expected Error, got {:?}", other),
        }
        match run_vm("len(\"one\", \"two\")").expect("vm run succeeds") {
            Object::Error(message) => {
                assert_eq!(message, "wrong number of arguments. got=2, want=1")
            }
            other => panic!("expected Error, got {:?}", other),
        }
        match run_vm("rest([1, 2, 3])").expect("vm run succeeds") {
            Object::Array(elements) => assert_eq!(elements.len(), 2),
            other => panic!("expected Array, got {:?}", other),
        }
        match run_vm("push([], 1)").expect("vm run succeeds") {
            Object::Array(elements) => assert_eq!(elements.len(), 1),
            other => panic!("expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_closures() {
        expect_integer(
            "let newClosure = fn(a) { fn() { a; }; };
             let closure = newClosure(99);
             closure();",
            99,
        );
        expect_integer(
            "let newAdder = fn(a, b) { fn(c) { a + b + c }; };
             let adder = newAdder(1, 2);
             adder(8);",
            11,
        );
        expect_integer(
            "let newAdder = fn(a, b) {
                 let c = a + b;
                 fn(d) { c + d };
             };
             let adder = newAdder(1, 2);
             adder(8);",
            11,
        );
        expect_integer(
            "let newAdderOuter = fn(a, b) {
                 let c = a + b;
                 fn(d) {
                     let e = d + c;
                     fn(f) { e + f; };
                 };
             };
             let newAdderInner = newAdderOuter(1, 2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        expect_integer(
            "let a = 1;
             let newAdderOuter = fn(b) {
                 fn(c) {
                     fn(d) { a + b + c + d };
                 };
             };
             let newAdderInner = newAdderOuter(2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        expect_integer(
            "let newClosure = fn(a, b) {
                 let one = fn() { a; };
                 let two = fn() { b; };
                 fn() { one() + two(); };
             };
             let closure = newClosure(9, 90);
             closure();",
            99,
        );
    }

    #[test]
    fn test_recursive_functions() {
        expect_integer(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             countDown(1);",
            0,
        );
        expect_integer(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             let wrapper = fn() { countDown(1); };
             wrapper();",
            0,
        );
        expect_integer(
            "let wrapper = fn() {
                 let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);
             };
             wrapper();",
            0,
        );
    }

    #[test]
    fn test_recursive_fibonacci() {
        expect_integer(
            "let fibonacci = fn(x) {
                 if (x == 0) { return 0; }
                 if (x == 1) { return 1; }
                 fibonacci(x - 1) + fibonacci(x - 2);
             };
             fibonacci(15);",
            610,
        );
    }

    #[test]
    fn test_runtime_errors() {
        expect_error(
            "5 + true",
            VmError::unsupported_binary("INTEGER", "BOOLEAN"),
        );
        expect_error("-true", VmError::UnsupportedNegation("BOOLEAN"));
        expect_error("5 / 0", VmError::DivisionByZero);
        expect_error("let x = 5; x();", VmError::CallingNonCallable);
        expect_error("5[0]", VmError::IndexNotSupported("INTEGER"));
        expect_error(
            "{\"name\": \"Monkey\"}[fn(x) { x }];",
            VmError::UnusableHashKey("CLOSURE"),
        );
    }

    #[test]
    fn test_stack_overflow_on_unbounded_recursion() {
        expect_error("let f = fn() { f(); }; f();", VmError::StackOverflow);
    }

    #[test]
    fn test_globals_survive_across_runs() {
        let compile = |input: &str, state: Option<(crate::symbol_table::SymbolTable, Vec<Object>)>| {
            let mut parser = Parser::new(Lexer::new(input));
            let program = parser.parse_program();
            assert!(parser.errors().is_empty());
            let mut compiler = match state {
                Some((symbols, constants)) => Compiler::with_state(symbols, constants),
                None => Compiler::new(),
            };
            compiler.compile(&program).expect("compilation succeeds");
            let bytecode = compiler.bytecode();
            (bytecode, compiler.into_state())
        };

        let (bytecode, state) = compile("let x = 7;", None);
        let mut vm = VM::new(bytecode);
        vm.run().expect("vm run succeeds");
        let globals = vm.into_globals();

        let (bytecode, _) = compile("x + 1", Some(state));
        let mut vm = VM::with_globals(bytecode, globals);
        vm.run().expect("vm run succeeds");
        match vm.last_popped() {
            Object::Integer(n) => assert_eq!(*n, 8),
            other => panic!("expected Integer, got {:?}", other),
        }
    }
}
