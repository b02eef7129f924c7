//! Output expressions guarded by a "result is null" condition.

use super::condition::{keys_known_present, render_condition, TRUE_LITERAL};
use super::linear::LinearForm;
use super::RenderOptions;

/// A value form paired with the form that decides whether the result is
/// null: the result is null iff `condition > 0`, so the value is emitted
/// under the guard `-condition >= 0`.
///
/// Rendering consumes the expression: the condition is negated as part of
/// rendering, so an expression is rendered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct NullableExpression {
    condition: LinearForm,
    value: LinearForm,
}

impl NullableExpression {
    pub fn new(condition: LinearForm) -> Self {
        let value = LinearForm::new(condition.tolerance());
        Self { condition, value }
    }

    pub fn set_value(&mut self, value: LinearForm) {
        self.value = value;
    }

    pub fn render(mut self, options: &RenderOptions) -> String {
        self.condition.scale_by(-1.0);
        let guard = render_condition(&self.condition, options);
        if guard == TRUE_LITERAL {
            return self.value.render();
        }
        for key in keys_known_present(&self.condition, true, options) {
            self.value.assume_present(&key);
        }
        format!("({} if {} else None)", self.value.render(), guard)
    }
}

/// Expression rendered for one output key
#[derive(Debug, Clone, PartialEq)]
pub enum OutputExpression {
    Plain(LinearForm),
    Nullable(NullableExpression),
}

impl OutputExpression {
    pub fn render(self, options: &RenderOptions) -> String {
        match self {
            OutputExpression::Plain(form) => form.render(),
            OutputExpression::Nullable(expr) => expr.render(options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::numeric::DEFAULT_ROUNDING_TOLERANCE as TOL;

    #[test]
    fn test_never_null_renders_value_only() {
        let mut value = LinearForm::new(TOL).with_nullable_keys(["x"]);
        value.add_coefficient("x", 1.0);
        let mut expr = NullableExpression::new(LinearForm::new(TOL));
        expr.set_value(value);
        assert_eq!(expr.render(&RenderOptions::default()), "(x or 0)");
    }

    #[test]
    fn test_null_guard() {
        let mut condition = LinearForm::new(TOL);
        condition.add_missing_coefficient("y", 1.0);
        let mut value = LinearForm::new(TOL).with_nullable_keys(["y"]);
        value.add_coefficient("y", 1.0);

        let mut expr = NullableExpression::new(condition);
        expr.set_value(value);
        assert_eq!(
            expr.render(&RenderOptions::default()),
            "((y or 0) if y is not None else None)"
        );
    }

    #[test]
    fn test_guard_proves_value_key_present() {
        let mut condition = LinearForm::new(TOL);
        condition.add_missing_coefficient("y", 1.0);
        // value offset only applies while y is present
        let mut value = LinearForm::new(TOL).with_nullable_keys(["y"]);
        value.add_coefficient("y", 1.0);
        value.add_missing_coefficient("y", 1.0);

        let mut expr = NullableExpression::new(condition);
        expr.set_value(value);
        assert_eq!(
            expr.render(&RenderOptions::default()),
            "((y or 0) if y is not None else None)"
        );
    }

    #[test]
    fn test_always_null_output() {
        let mut condition = LinearForm::new(TOL);
        condition.add_constant(1.0);
        let expr = NullableExpression::new(condition);
        assert_eq!(
            expr.render(&RenderOptions::default()),
            "(0 if False else None)"
        );
    }

    #[test]
    fn test_plain_output() {
        let mut form = LinearForm::new(TOL);
        form.add_constant(-1.0);
        assert_eq!(
            OutputExpression::Plain(form).render(&RenderOptions::default()),
            "-1.0"
        );
    }
}
