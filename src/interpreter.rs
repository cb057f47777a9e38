use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::builtins::{self, Native, StringMethod};
use crate::environment::Environment;
use crate::error::{ClouError, Result};
use crate::modules::{self, ModuleSystem};
use crate::parser::Parser;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::{Class, ClouObject, Function, Instance, Value};

/// The Clou engine: a tree-walking evaluator over a global environment,
/// with a module store for `require`.
///
/// Evaluation is strictly synchronous.  The only non-linear control flow
/// is the return signal (`returning`) and the module re-entry guard
/// (`active_module_calls`), which breaks runtime recursion between
/// mutually-required modules by yielding an empty string.
pub struct Clou {
    globals: Rc<RefCell<Environment>>,
    modules: ModuleSystem,
    current_dir: String,
    returning: Option<Value>,
    active_module_calls: HashSet<(usize, String)>,
    output: Option<Rc<RefCell<String>>>,
}

impl Clou {
    pub fn new() -> Self {
        Self::with_modules(ModuleSystem::new())
    }

    pub fn with_modules(modules: ModuleSystem) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        {
            let mut globals = globals.borrow_mut();

            globals.define("print", Value::NativeFunction(Native::Print), false);
            globals.define("len", Value::NativeFunction(Native::Len), false);
            globals.define("clock", Value::NativeFunction(Native::Clock), false);
            globals.define("require", Value::NativeFunction(Native::Require), false);
        }

        Clou {
            globals,
            modules,
            current_dir: String::new(),
            returning: None,
            active_module_calls: HashSet::new(),
            output: None,
        }
    }

    /// Engine plus a handle on everything `print` emits, for tests and
    /// tooling that capture program output instead of using stdout.
    pub fn with_captured_output() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));

        let mut interpreter = Self::new();
        interpreter.output = Some(buffer.clone());

        (interpreter, buffer)
    }

    pub fn modules(&mut self) -> &mut ModuleSystem {
        &mut self.modules
    }

    /// Fetch `path` from the module store and evaluate it in the global
    /// environment.
    pub fn run_file(&mut self, path: &str) -> Result<()> {
        let (resolved, source) = self
            .modules
            .resolve(path, "")
            .ok_or_else(|| ClouError::runtime(0, format!("Module not found: '{}'", path)))?;

        self.current_dir = modules::dir_of(&resolved);

        let result = self.run_in(&source, &self.globals.clone());
        self.returning = None;

        result
    }

    /// Evaluate one REPL input.  The engine stays usable afterwards even
    /// if the input failed.
    pub fn run_prompt(&mut self, source: &str) -> Result<()> {
        let result = self.run_in(source, &self.globals.clone());
        self.returning = None;

        result
    }

    fn run_in(&mut self, source: &str, env: &Rc<RefCell<Environment>>) -> Result<()> {
        let tokens: Vec<Token> = Scanner::new(source).collect::<Result<Vec<Token>>>()?;
        let program: Vec<Stmt> = Parser::new(tokens).parse()?;

        self.execute_block(&program, env)
    }

    fn write_output(&self, text: &str) {
        if let Some(buffer) = &self.output {
            buffer.borrow_mut().push_str(text);
            buffer.borrow_mut().push('\n');
        } else {
            println!("{}", text);
        }
    }

    // Statements

    fn execute(&mut self, stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> Result<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;

                Ok(())
            }

            Stmt::Var {
                name,
                initializer,
                is_const,
            } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Null,
                };

                env.borrow_mut().define(&name.lexeme, value, *is_const);

                Ok(())
            }

            Stmt::Block(statements) => {
                let block_env = Rc::new(RefCell::new(Environment::with_enclosing(env.clone())));

                self.execute_block(statements, &block_env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.returning.is_none() && self.evaluate(condition, env)?.is_truthy() {
                    self.execute(body, env)?;
                }

                Ok(())
            }

            Stmt::Function(declaration) => {
                let function = Function {
                    declaration: declaration.clone(),
                    closure: env.clone(),
                    is_initializer: false,
                    bound_this: None,
                };

                if let Some(name) = &declaration.name {
                    env.borrow_mut()
                        .define(&name.lexeme, Value::Function(Rc::new(function)), false);
                }

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Null,
                };

                self.returning = Some(value);

                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods, env),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt], env: &Rc<RefCell<Environment>>) -> Result<()> {
        for stmt in statements {
            if self.returning.is_some() {
                break;
            }

            self.execute(stmt, env)?;
        }

        Ok(())
    }

    /// Class declaration protocol:
    ///
    /// 1. Resolve the superclass; it must already be a class value.
    /// 2. Bind the class name to `null` in the declaring environment so
    ///    methods can refer to it by name.
    /// 3. With a superclass, methods close over a dedicated child
    ///    environment in which `super` is defined.
    /// 4. Build the ordered method table; `init` is the initializer.
    /// 5. Assign (not redefine) the finished class into the name binding.
    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Token>,
        methods: &[Rc<FunctionDecl>],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<()> {
        let superclass_value: Option<Rc<Class>> = match superclass {
            Some(sup) => {
                let value = env.borrow().get(&sup.lexeme, sup.line)?;

                match value {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(ClouError::runtime(sup.line, "Superclass must be a class"));
                    }
                }
            }

            None => None,
        };

        env.borrow_mut().define(&name.lexeme, Value::Null, false);

        let method_env: Rc<RefCell<Environment>> = match &superclass_value {
            Some(sup) => {
                let child = Rc::new(RefCell::new(Environment::with_enclosing(env.clone())));

                child
                    .borrow_mut()
                    .define("super", Value::Class(sup.clone()), false);

                child
            }

            None => env.clone(),
        };

        let mut method_table: Vec<(String, Rc<Function>)> = Vec::new();

        for declaration in methods {
            let method_name: String = match &declaration.name {
                Some(token) => token.lexeme.clone(),
                None => continue,
            };

            let function = Function {
                declaration: declaration.clone(),
                closure: method_env.clone(),
                is_initializer: method_name == "init",
                bound_this: None,
            };

            method_table.push((method_name, Rc::new(function)));
        }

        let class = Rc::new(Class {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_table,
        });

        env.borrow_mut()
            .assign(&name.lexeme, Value::Class(class), name.line)
    }

    // Expressions

    fn evaluate(&mut self, expr: &Expr, env: &Rc<RefCell<Environment>>) -> Result<Value> {
        match expr {
            Expr::Literal(token) => match &token.token_type {
                TokenType::NUMBER(n) => Ok(Value::Number(*n)),

                TokenType::STRING(s) => Ok(Value::String(s.clone())),

                TokenType::TRUE => Ok(Value::Bool(true)),

                TokenType::FALSE => Ok(Value::Bool(false)),

                TokenType::NULL => Ok(Value::Null),

                _ => Err(ClouError::runtime(token.line, "Invalid literal")),
            },

            Expr::Variable(token) => env.borrow().get(&token.lexeme, token.line),

            Expr::Grouping(inner) => self.evaluate(inner, env),

            Expr::Unary { op, right } => {
                let value = self.evaluate(right, env)?;

                match op.token_type {
                    TokenType::MINUS => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),

                        _ => Err(ClouError::runtime(op.line, "Operand must be a number")),
                    },

                    TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

                    _ => Err(ClouError::runtime(op.line, "Invalid unary operator")),
                }
            }

            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right, env),

            Expr::Logical { left, op, right } => {
                let left_value = self.evaluate(left, env)?;

                match op.token_type {
                    TokenType::OR => {
                        if left_value.is_truthy() {
                            Ok(left_value)
                        } else {
                            self.evaluate(right, env)
                        }
                    }

                    TokenType::AND => {
                        if !left_value.is_truthy() {
                            Ok(left_value)
                        } else {
                            self.evaluate(right, env)
                        }
                    }

                    _ => Err(ClouError::runtime(op.line, "Invalid logical operator")),
                }
            }

            Expr::Assign { name, value } => {
                let value = self.evaluate(value, env)?;

                env.borrow_mut()
                    .assign(&name.lexeme, value.clone(), name.line)?;

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee, env)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    args.push(self.evaluate(argument, env)?);
                }

                self.call_value(callee_value, args, paren.line)
            }

            Expr::Get { object, name } => {
                let object_value = self.evaluate(object, env)?;

                self.get_property(object_value, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_value = self.evaluate(object, env)?;
                let value = self.evaluate(value, env)?;

                match object_value {
                    Value::Instance(instance) => {
                        instance
                            .borrow_mut()
                            .fields
                            .set(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    Value::Object(object) => {
                        object.borrow_mut().set(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    other => Err(ClouError::runtime(
                        name.line,
                        format!(
                            "Cannot set property '{}' on {}",
                            name.lexeme,
                            other.type_name()
                        ),
                    )),
                }
            }

            Expr::This(keyword) => env.borrow().lookup("this").ok_or_else(|| {
                ClouError::runtime(keyword.line, "Cannot use 'this' outside of a class")
            }),

            Expr::Super { keyword, method } => {
                let superclass = match env.borrow().lookup("super") {
                    Some(Value::Class(class)) => class,

                    _ => {
                        return Err(ClouError::runtime(
                            keyword.line,
                            "Cannot use 'super' outside of a subclass",
                        ));
                    }
                };

                let this_value = match env.borrow().lookup("this") {
                    Some(Value::Instance(instance)) => instance,

                    _ => {
                        return Err(ClouError::runtime(
                            keyword.line,
                            "Cannot use 'super' outside of a method",
                        ));
                    }
                };

                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(this_value)))),

                    None => Err(ClouError::runtime(
                        method.line,
                        format!("Undefined property '{}'", method.lexeme),
                    )),
                }
            }

            Expr::New {
                name,
                paren,
                arguments,
            } => {
                let class_value = env.borrow().get(&name.lexeme, name.line)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    args.push(self.evaluate(argument, env)?);
                }

                match class_value {
                    Value::Class(class) => self.instantiate(&class, args, paren.line),

                    _ => Err(ClouError::runtime(
                        name.line,
                        format!("'{}' is not a class", name.lexeme),
                    )),
                }
            }

            Expr::Array { elements, .. } => {
                let mut values: Vec<Value> = Vec::with_capacity(elements.len());

                for element in elements {
                    values.push(self.evaluate(element, env)?);
                }

                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }

            Expr::Object { properties, .. } => {
                let mut object = ClouObject::new();

                for (key, value_expr) in properties {
                    let value = self.evaluate(value_expr, env)?;

                    object.set(&key.lexeme, value);
                }

                Ok(Value::Object(Rc::new(RefCell::new(object))))
            }

            Expr::Index {
                object,
                bracket,
                index,
            } => {
                let object_value = self.evaluate(object, env)?;
                let index_value = self.evaluate(index, env)?;

                self.index_get(object_value, index_value, bracket.line)
            }

            Expr::IndexAssign {
                object,
                bracket,
                index,
                value,
            } => {
                let object_value = self.evaluate(object, env)?;
                let index_value = self.evaluate(index, env)?;
                let value = self.evaluate(value, env)?;

                self.index_set(object_value, index_value, value, bracket.line)
            }

            Expr::Function(declaration) => Ok(Value::Function(Rc::new(Function {
                declaration: declaration.clone(),
                closure: env.clone(),
                is_initializer: false,
                bound_this: None,
            }))),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        op: &Token,
        right: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value> {
        let left = self.evaluate(left, env)?;
        let right = self.evaluate(right, env)?;

        match op.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                _ if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", left, right)))
                }

                _ => Err(ClouError::runtime(
                    op.line,
                    "Operands must be numbers or strings",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(op, &left, &right)?;

                if b == 0.0 {
                    Err(ClouError::runtime(op.line, "Division by zero"))
                } else {
                    Ok(Value::Number(a / b))
                }
            }

            TokenType::PERCENT => {
                let (a, b) = number_operands(op, &left, &right)?;

                if b == 0.0 {
                    Err(ClouError::runtime(op.line, "Modulo by zero"))
                } else {
                    Ok(Value::Number(a % b))
                }
            }

            TokenType::CARET => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Number(a.powf(b)))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            TokenType::LESS => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(op, &left, &right)?;

                Ok(Value::Bool(a >= b))
            }

            _ => Err(ClouError::runtime(op.line, "Invalid binary operator")),
        }
    }

    // Property access

    fn get_property(&mut self, object: Value, name: &Token) -> Result<Value> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
                    return Ok(value.clone());
                }

                let method = instance.borrow().class.find_method(&name.lexeme);

                match method {
                    Some(method) => Ok(Value::Function(Rc::new(method.bind(instance.clone())))),

                    None => Err(ClouError::runtime(
                        name.line,
                        format!("Undefined property '{}'", name.lexeme),
                    )),
                }
            }

            Value::Object(object) => {
                // A missing key comes back as the key name itself; scripts
                // rely on this.
                match object.borrow().get(&name.lexeme) {
                    Some(value) => Ok(value.clone()),

                    None => Ok(Value::String(name.lexeme.clone())),
                }
            }

            Value::String(s) => match name.lexeme.as_str() {
                "length" => Ok(Value::Number(s.chars().count() as f64)),

                "includes" => Ok(Value::NativeFunction(Native::StringMethod {
                    receiver: s,
                    method: StringMethod::Includes,
                })),

                "split" => Ok(Value::NativeFunction(Native::StringMethod {
                    receiver: s,
                    method: StringMethod::Split,
                })),

                "slice" => Ok(Value::NativeFunction(Native::StringMethod {
                    receiver: s,
                    method: StringMethod::Slice,
                })),

                _ => Err(ClouError::runtime(
                    name.line,
                    format!("String has no property '{}'", name.lexeme),
                )),
            },

            Value::Number(n) => match name.lexeme.as_str() {
                "toFixed" => Ok(Value::NativeFunction(Native::NumberToFixed {
                    receiver: n,
                })),

                _ => Err(ClouError::runtime(
                    name.line,
                    format!("Number has no property '{}'", name.lexeme),
                )),
            },

            other => Err(ClouError::runtime(
                name.line,
                format!(
                    "Only instances and objects have properties, got {}",
                    other.type_name()
                ),
            )),
        }
    }

    // Indexing

    fn index_get(&self, object: Value, index: Value, line: usize) -> Result<Value> {
        match object {
            Value::Array(elements) => {
                let elements = elements.borrow();

                match as_index(&index, elements.len()) {
                    Some(i) => Ok(elements[i].clone()),

                    None => Err(ClouError::runtime(line, "Array index out of bounds")),
                }
            }

            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();

                match as_index(&index, chars.len()) {
                    Some(i) => Ok(Value::String(chars[i].to_string())),

                    None => Err(ClouError::runtime(line, "String index out of bounds")),
                }
            }

            Value::Object(object) => {
                let key = index.to_string();

                match object.borrow().get(&key) {
                    Some(value) => Ok(value.clone()),

                    None => Err(ClouError::runtime(
                        line,
                        format!("Object property not found: '{}'", key),
                    )),
                }
            }

            other => Err(ClouError::runtime(
                line,
                format!("Cannot index {}", other.type_name()),
            )),
        }
    }

    fn index_set(&self, object: Value, index: Value, value: Value, line: usize) -> Result<Value> {
        match object {
            Value::Array(elements) => {
                let i: usize = match &index {
                    Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => *n as usize,

                    _ => return Err(ClouError::runtime(line, "Array index out of bounds")),
                };

                let mut elements = elements.borrow_mut();

                // Writing past the end grows the array; the gap fills with
                // null.  `arr[len(arr)] = x` appends.
                if i >= elements.len() {
                    elements.resize(i + 1, Value::Null);
                }

                elements[i] = value.clone();

                Ok(value)
            }

            Value::Object(object) => {
                let key = index.to_string();

                object.borrow_mut().set(&key, value.clone());

                Ok(value)
            }

            other => Err(ClouError::runtime(
                line,
                format!("Cannot index {}", other.type_name()),
            )),
        }
    }

    // Calls

    fn call_value(&mut self, callee: Value, args: Vec<Value>, line: usize) -> Result<Value> {
        match callee {
            Value::NativeFunction(native) => self.call_native(native, args, line),

            Value::Function(function) => self.call_function(&function, args),

            Value::Class(class) => self.instantiate(&class, args, line),

            _ => Err(ClouError::runtime(
                line,
                "Can only call functions and classes",
            )),
        }
    }

    fn call_native(&mut self, native: Native, args: Vec<Value>, line: usize) -> Result<Value> {
        match native {
            Native::Print => {
                let rendered: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();

                self.write_output(&rendered.join(" "));

                Ok(Value::Null)
            }

            Native::Len => builtins::len(&args, line),

            Native::Clock => builtins::clock(line),

            Native::Require => self.require(&args, line),

            Native::StringMethod { receiver, method } => {
                builtins::string_method(&receiver, method, &args, line)
            }

            Native::NumberToFixed { receiver } => builtins::to_fixed(receiver, &args, line),
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        let guard_key = self.module_reentry_key(function);

        if let Some(key) = &guard_key {
            // A function on a module environment that is already on the
            // call stack would recurse forever in a require cycle; yield
            // the empty-string sentinel instead.
            if self.active_module_calls.contains(key) {
                return Ok(Value::String(String::new()));
            }

            self.active_module_calls.insert(key.clone());
        }

        let result = self.invoke(function, args);

        if let Some(key) = guard_key {
            self.active_module_calls.remove(&key);
        }

        result
    }

    fn module_reentry_key(&self, function: &Function) -> Option<(usize, String)> {
        if !function.closure.borrow().is_module_scope() {
            return None;
        }

        function
            .name()
            .map(|name| (Rc::as_ptr(&function.closure) as usize, name.to_string()))
    }

    fn invoke(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        let call_env = Rc::new(RefCell::new(Environment::with_enclosing(
            function.closure.clone(),
        )));

        if let Some(instance) = &function.bound_this {
            call_env
                .borrow_mut()
                .define("this", Value::Instance(instance.clone()), false);
        }

        for (i, param) in function.declaration.params.iter().enumerate() {
            if param.is_rest {
                let rest: Vec<Value> = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();

                call_env.borrow_mut().define(
                    &param.name.lexeme,
                    Value::Array(Rc::new(RefCell::new(rest))),
                    false,
                );

                break;
            }

            let supplied = args.get(i).cloned();

            // An omitted argument and an explicit null both take the
            // default, evaluated fresh in this call frame.
            let value: Value = match (supplied, &param.default) {
                (Some(Value::Null), Some(default)) | (None, Some(default)) => {
                    self.evaluate(default, &call_env)?
                }

                (Some(v), _) => v,

                (None, None) => Value::Null,
            };

            call_env
                .borrow_mut()
                .define(&param.name.lexeme, value, false);
        }

        self.execute_block(&function.declaration.body, &call_env)?;

        let returned = self.returning.take().unwrap_or(Value::Null);

        if function.is_initializer {
            if let Some(instance) = &function.bound_this {
                return Ok(Value::Instance(instance.clone()));
            }
        }

        Ok(returned)
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<Value>, _line: usize) -> Result<Value> {
        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(instance.clone());

            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    // Modules

    fn require(&mut self, args: &[Value], line: usize) -> Result<Value> {
        let path: String = match args.first() {
            Some(Value::String(s)) => s.clone(),

            _ => {
                return Err(ClouError::runtime(
                    line,
                    "require() expects a module path string",
                ));
            }
        };

        let (resolved, source) = self
            .modules
            .resolve(&path, &self.current_dir)
            .ok_or_else(|| ClouError::runtime(line, format!("Module not found: '{}'", path)))?;

        if let Some(exports) = self.modules.get_cached(&resolved) {
            return Ok(exports);
        }

        let exports = Value::Object(Rc::new(RefCell::new(ClouObject::new())));

        // Cached before the body runs; this is what lets a require cycle
        // observe the other side's partial exports.
        self.modules.cache(&resolved, exports.clone());

        let module_env = Rc::new(RefCell::new(Environment::module_scope(self.globals.clone())));

        module_env
            .borrow_mut()
            .define("exports", exports.clone(), false);

        let previous_dir = std::mem::replace(&mut self.current_dir, modules::dir_of(&resolved));

        let result = self.run_in(&source, &module_env);

        self.current_dir = previous_dir;
        self.returning = None;

        result?;

        match module_env.borrow().lookup("exports") {
            Some(Value::Object(_)) => {}

            _ => {
                return Err(ClouError::runtime(line, "'exports' must be an object"));
            }
        }

        Ok(exports)
    }
}

impl Default for Clou {
    fn default() -> Self {
        Clou::new()
    }
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

        _ => Err(ClouError::runtime(op.line, "Operands must be numbers")),
    }
}

fn as_index(value: &Value, len: usize) -> Option<usize> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < len => {
            Some(*n as usize)
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(source: &str) -> Result<String> {
        let (mut clou, output) = Clou::with_captured_output();

        clou.run_prompt(source)?;

        let text = output.borrow().clone();
        Ok(text)
    }

    #[test]
    fn arithmetic_precedence() -> Result<()> {
        assert_eq!(interpret("print(1 + 2 * 3);")?, "7\n");
        assert_eq!(interpret("print((1 + 2) * 3);")?, "9\n");
        Ok(())
    }

    #[test]
    fn power_is_right_associative() -> Result<()> {
        assert_eq!(interpret("print(2 ^ 3 ^ 2);")?, "512\n");
        Ok(())
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() -> Result<()> {
        assert_eq!(interpret("print(-2 ^ 2);")?, "-4\n");
        Ok(())
    }

    #[test]
    fn logical_operators_return_operands() -> Result<()> {
        assert_eq!(interpret("print(null or \"fallback\");")?, "fallback\n");
        assert_eq!(interpret("print(1 and 2);")?, "2\n");
        assert_eq!(interpret("print(0 and 2);")?, "0\n");
        Ok(())
    }

    #[test]
    fn string_concatenation_coerces_either_side() -> Result<()> {
        assert_eq!(interpret("print(\"n = \" + 4);")?, "n = 4\n");
        assert_eq!(interpret("print(4 + \"!\");")?, "4!\n");
        Ok(())
    }

    #[test]
    fn equality_has_no_coercion() -> Result<()> {
        assert_eq!(interpret("print(true == 1);")?, "false\n");
        assert_eq!(interpret("print(0 == false);")?, "false\n");
        assert_eq!(interpret("print(null == null);")?, "true\n");
        Ok(())
    }

    #[test]
    fn block_scoping_shadows_and_restores() -> Result<()> {
        assert_eq!(
            interpret("let x = 1; { let x = 2; print(x); } print(x);")?,
            "2\n1\n"
        );
        Ok(())
    }

    #[test]
    fn closures_capture_their_environment() -> Result<()> {
        let source = r#"
            function counter() {
                let n = 0;
                return function() {
                    n = n + 1;
                    return n;
                };
            }
            let tick = counter();
            print(tick());
            print(tick());
        "#;
        assert_eq!(interpret(source)?, "1\n2\n");
        Ok(())
    }

    #[test]
    fn default_parameters_are_evaluated_per_call() -> Result<()> {
        let source = r#"
            let base = 10;
            function bump(n = base) { return n + 1; }
            print(bump());
            base = 20;
            print(bump());
            print(bump(null));
            print(bump(5));
        "#;
        assert_eq!(interpret(source)?, "11\n21\n21\n6\n");
        Ok(())
    }

    #[test]
    fn rest_parameter_collects_remaining_arguments() -> Result<()> {
        let source = r#"
            function tail(first, ...rest) { return rest; }
            print(tail(1, 2, 3, 4));
            print(tail(1));
        "#;
        assert_eq!(interpret(source)?, "[2, 3, 4]\n[]\n");
        Ok(())
    }

    #[test]
    fn excess_arguments_are_ignored() -> Result<()> {
        assert_eq!(
            interpret("function f(a) { return a; } print(f(1, 2, 3));")?,
            "1\n"
        );
        Ok(())
    }

    #[test]
    fn object_property_miss_returns_key_name() -> Result<()> {
        assert_eq!(
            interpret("let o = { name: \"Ada\" }; print(o.age);")?,
            "age\n"
        );
        Ok(())
    }

    #[test]
    fn run_prompt_survives_errors() {
        let (mut clou, output) = Clou::with_captured_output();

        assert!(clou.run_prompt("print(missing);").is_err());
        clou.run_prompt("print(\"still alive\");").unwrap();

        assert_eq!(*output.borrow(), "still alive\n");
    }

    #[test]
    fn prompt_state_persists_between_inputs() {
        let (mut clou, output) = Clou::with_captured_output();

        clou.run_prompt("let x = 41;").unwrap();
        clou.run_prompt("print(x + 1);").unwrap();

        assert_eq!(*output.borrow(), "42\n");
    }
}
