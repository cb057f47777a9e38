use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::token::TokenType;

/// Parenthesised AST rendering, used by the `parse` subcommand and in
/// parser tests.
pub struct Ast;

impl Ast {
    pub fn print_program(&self, statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|stmt| self.print_stmt(stmt))
            .collect::<Vec<String>>()
            .join("\n")
    }

    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => self.print(expr),

            Stmt::Var {
                name,
                initializer,
                is_const,
            } => {
                let keyword = if *is_const { "const" } else { "let" };

                match initializer {
                    Some(init) => format!("({} {} {})", keyword, name.lexeme, self.print(init)),
                    None => format!("({} {})", keyword, name.lexeme),
                }
            }

            Stmt::Block(statements) => {
                let inner: Vec<String> = statements.iter().map(|s| self.print_stmt(s)).collect();

                format!("(block {})", inner.join(" "))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch),
                    self.print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => format!(
                "(while {} {})",
                self.print(condition),
                self.print_stmt(body)
            ),

            Stmt::Function(declaration) => self.print_function("function", declaration),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", self.print(value)),
                None => "(return)".to_string(),
            },

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut out = format!("(class {}", name.lexeme);

                if let Some(superclass) = superclass {
                    out.push_str(&format!(" (extends {})", superclass.lexeme));
                }

                for method in methods {
                    out.push(' ');
                    out.push_str(&self.print_function("method", method));
                }

                out.push(')');
                out
            }
        }
    }

    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(token) => match &token.token_type {
                TokenType::NUMBER(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                TokenType::STRING(s) => s.to_string(),

                TokenType::TRUE => "true".to_string(),

                TokenType::FALSE => "false".to_string(),

                TokenType::NULL => "null".to_string(),

                _ => token.lexeme.clone(),
            },

            Expr::Variable(token) => token.lexeme.clone(),

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary { op, right } => format!("({} {})", op.lexeme, self.print(right)),

            Expr::Binary { left, op, right } | Expr::Logical { left, op, right } => {
                format!("({} {} {})", op.lexeme, self.print(left), self.print(right))
            }

            Expr::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", self.print(callee));

                for argument in arguments {
                    out.push(' ');
                    out.push_str(&self.print(argument));
                }

                out.push(')');
                out
            }

            Expr::Get { object, name } => {
                format!("(get {} {})", self.print(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(set {} {} {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This(_) => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),

            Expr::New {
                name, arguments, ..
            } => {
                let mut out = format!("(new {}", name.lexeme);

                for argument in arguments {
                    out.push(' ');
                    out.push_str(&self.print(argument));
                }

                out.push(')');
                out
            }

            Expr::Array { elements, .. } => {
                let inner: Vec<String> = elements.iter().map(|e| self.print(e)).collect();

                format!("(array {})", inner.join(" "))
            }

            Expr::Object { properties, .. } => {
                let inner: Vec<String> = properties
                    .iter()
                    .map(|(key, value)| format!("({} {})", key.lexeme, self.print(value)))
                    .collect();

                format!("(object {})", inner.join(" "))
            }

            Expr::Index { object, index, .. } => {
                format!("(index {} {})", self.print(object), self.print(index))
            }

            Expr::IndexAssign {
                object,
                index,
                value,
                ..
            } => format!(
                "(index= {} {} {})",
                self.print(object),
                self.print(index),
                self.print(value)
            ),

            Expr::Function(declaration) => self.print_function("fn", declaration),
        }
    }

    fn print_function(&self, keyword: &str, declaration: &FunctionDecl) -> String {
        let params: Vec<String> = declaration
            .params
            .iter()
            .map(|param| {
                if param.is_rest {
                    format!("...{}", param.name.lexeme)
                } else {
                    param.name.lexeme.clone()
                }
            })
            .collect();

        let body: Vec<String> = declaration
            .body
            .iter()
            .map(|stmt| self.print_stmt(stmt))
            .collect();

        let name = declaration
            .name
            .as_ref()
            .map(|t| t.lexeme.clone())
            .unwrap_or_default();

        if name.is_empty() {
            format!("({} ({}) {})", keyword, params.join(" "), body.join(" "))
        } else {
            format!(
                "({} {} ({}) {})",
                keyword,
                name,
                params.join(" "),
                body.join(" ")
            )
        }
    }
}
