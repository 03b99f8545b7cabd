use crate::{
    ast::{Binary, Expr, Grouping, Unary, Visitor},
    token::TokenType,
    types::Literal,
};

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&mut self, e: &Expr) -> String {
        e.accept(self)
    }

    fn parenthesize(&mut self, name: &str, exprs: &[&Expr]) -> String {
        let mut out = format!("({}", name);
        for expr in exprs {
            out.push(' ');
            out.push_str(&expr.accept(self));
        }
        out.push(')');
        out
    }
}

impl Visitor for AstPrinter {
    type Result = String;

    fn visit_binary_expr(&mut self, binary: &Binary) -> Self::Result {
        self.parenthesize(&binary.operator.lexeme, &[&*binary.left, &*binary.right])
    }

    fn visit_grouping_expr(&mut self, grouping: &Grouping) -> Self::Result {
        self.parenthesize("group", &[&*grouping.expr])
    }

    fn visit_literal_expr(&mut self, literal: &Literal) -> Self::Result {
        literal.to_string()
    }

    fn visit_unary_expr(&mut self, unary: &Unary) -> Self::Result {
        self.parenthesize(&unary.operator.lexeme, &[&*unary.right])
    }
}

pub struct RpnPrinter;

impl RpnPrinter {
    pub fn print(&mut self, e: &Expr) -> String {
        e.accept(self)
    }
}

impl Visitor for RpnPrinter {
    type Result = String;

    fn visit_binary_expr(&mut self, binary: &Binary) -> Self::Result {
        format!(
            "{} {} {}",
            binary.left.accept(self),
            binary.right.accept(self),
            binary.operator.lexeme,
        )
    }

    fn visit_grouping_expr(&mut self, grouping: &Grouping) -> Self::Result {
        grouping.expr.accept(self)
    }

    fn visit_literal_expr(&mut self, literal: &Literal) -> Self::Result {
        literal.to_string()
    }

    fn visit_unary_expr(&mut self, unary: &Unary) -> Self::Result {
        let operator = if unary.operator.token_type == TokenType::Minus {
            "~"
        } else {
            unary.operator.lexeme.as_str()
        };
        format!("{} {}", unary.right.accept(self), operator)
    }
}
