//! Calculator-style amount input.
//!
//! The UI feeds one key at a time into a [`Keypad`], which maintains the raw
//! expression string and evaluates it on `equals`. The mini-language is
//! digits, `+ - × ÷`, and at most one decimal point per operand.
//!
//! Evaluation never fails toward the caller: malformed expressions (trailing
//! operator, division by zero) leave the expression unchanged so the user can
//! keep editing. Arithmetic runs on 8-fraction-digit fixed-point integers,
//! never floats.

use crate::{Amount, Currency, EngineError};

/// Binary operators of the calculator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinOp {
    /// The character used for this operator inside the expression string.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '×',
            Self::Divide => '÷',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '×' => Some(Self::Multiply),
            '÷' => Some(Self::Divide),
            _ => None,
        }
    }
}

/// A single key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Op(BinOp),
    Point,
    Backspace,
    Equals,
}

/// Internal fixed-point scale for evaluation (8 fraction digits, the widest
/// currency precision the engine supports).
const EVAL_SCALE: i128 = 100_000_000;

/// Editor state for calculator input: the raw expression string plus the key
/// application rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keypad {
    expr: String,
}

impl Keypad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw expression, exactly as the UI should display it.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Applies one key press to the expression.
    ///
    /// Rules:
    /// - a leading operator is rejected, except `-` (signed first operand)
    /// - two consecutive operators collapse: the second replaces the first
    /// - a decimal point is rejected while the current operand already has one
    /// - backspace on an empty expression is a no-op
    /// - equals evaluates with `×`/`÷` before `+`/`-` and replaces the
    ///   expression with the formatted result; if evaluation fails, or no
    ///   operator is present, nothing changes
    pub fn press(&mut self, key: Key) {
        match key {
            Key::Digit(d) => {
                if d <= 9 {
                    self.expr.push(char::from(b'0' + d));
                }
            }
            Key::Op(op) => self.press_op(op),
            Key::Point => {
                if !self.current_operand().contains('.') {
                    self.expr.push('.');
                }
            }
            Key::Backspace => {
                self.expr.pop();
            }
            Key::Equals => {
                if self.has_operator()
                    && let Some(result) = self.evaluate()
                {
                    self.expr = result;
                }
            }
        }
    }

    fn press_op(&mut self, op: BinOp) {
        match self.expr.chars().last() {
            None => {
                // Only a sign may open the expression.
                if op == BinOp::Subtract {
                    self.expr.push(op.symbol());
                }
            }
            Some(last) if BinOp::from_char(last).is_some() => {
                // Collapse consecutive operators, but never turn the leading
                // sign into an invalid leading operator.
                if self.expr.chars().count() == 1 {
                    if op == BinOp::Subtract {
                        self.expr = String::from(op.symbol());
                    }
                } else {
                    self.expr.pop();
                    self.expr.push(op.symbol());
                }
            }
            Some(_) => self.expr.push(op.symbol()),
        }
    }

    /// Evaluates the current expression, returning the formatted result or
    /// `None` when the expression is malformed or divides by zero.
    #[must_use]
    pub fn evaluate(&self) -> Option<String> {
        let tokens = tokenize(&self.expr)?;
        let value = eval_tokens(&tokens)?;
        Some(format_fixed(value))
    }

    /// Converts the expression into an [`Amount`] at the currency's
    /// precision, evaluating pending arithmetic first.
    pub fn amount_in(&self, currency: &Currency) -> Result<Amount, EngineError> {
        let text = if self.has_operator() {
            self.evaluate().ok_or_else(|| {
                EngineError::InvalidAmount("expression does not evaluate".to_string())
            })?
        } else {
            self.expr.clone()
        };
        Amount::parse(&text, currency.minor_units())
    }

    /// Text of the operand currently being typed (after the last operator).
    fn current_operand(&self) -> &str {
        let boundary = self
            .expr
            .char_indices()
            .rev()
            .find(|(index, c)| BinOp::from_char(*c).is_some() && *index > 0)
            .map(|(index, c)| index + c.len_utf8());
        match boundary {
            Some(start) => &self.expr[start..],
            None => &self.expr,
        }
    }

    /// `true` when a binary operator is present (a leading `-` is a sign,
    /// not an operator).
    fn has_operator(&self) -> bool {
        self.expr
            .char_indices()
            .any(|(index, c)| BinOp::from_char(c).is_some() && index > 0)
    }
}

#[derive(Clone, Copy, Debug)]
enum ExprToken {
    Number(i128),
    Op(BinOp),
}

fn tokenize(expr: &str) -> Option<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut operand = String::new();
    let mut chars = expr.chars().enumerate().peekable();

    while let Some((index, c)) = chars.next() {
        if c == '-' && index == 0 {
            operand.push(c);
        } else if let Some(op) = BinOp::from_char(c) {
            tokens.push(ExprToken::Number(parse_fixed(&operand)?));
            operand.clear();
            tokens.push(ExprToken::Op(op));
            chars.peek()?;
        } else {
            operand.push(c);
        }
    }
    tokens.push(ExprToken::Number(parse_fixed(&operand)?));
    Some(tokens)
}

/// Parses one operand into 8-digit fixed point. Accepts `.5` and `5.`;
/// fraction digits beyond the scale round half-up.
fn parse_fixed(operand: &str) -> Option<i128> {
    let (sign, rest) = match operand.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, operand),
    };
    if rest.is_empty() {
        return None;
    }

    let mut parts = rest.split('.');
    let whole_str = parts.next()?;
    let frac_str = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return None;
    }
    if whole_str.is_empty() && frac_str.is_empty() {
        return None;
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: i128 = if whole_str.is_empty() {
        0
    } else {
        whole_str.parse().ok()?
    };

    let mut frac: i128 = 0;
    let mut digits = 0u32;
    let mut round_up = false;
    for (index, c) in frac_str.chars().enumerate() {
        let digit = i128::from(c as u8 - b'0');
        if index < 8 {
            frac = frac * 10 + digit;
            digits += 1;
        } else if index == 8 && digit >= 5 {
            round_up = true;
        }
    }
    frac *= 10i128.checked_pow(8 - digits)?;
    if round_up {
        frac += 1;
    }

    let value = whole.checked_mul(EVAL_SCALE)?.checked_add(frac)?;
    Some(sign * value)
}

fn eval_tokens(tokens: &[ExprToken]) -> Option<i128> {
    // First pass resolves × and ÷, leaving a +/- chain.
    let mut values: Vec<i128> = Vec::new();
    let mut pending: Vec<BinOp> = Vec::new();

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        let ExprToken::Number(mut value) = *token else {
            return None;
        };
        loop {
            match iter.clone().next() {
                Some(ExprToken::Op(op @ (BinOp::Multiply | BinOp::Divide))) => {
                    iter.next();
                    let Some(ExprToken::Number(rhs)) = iter.next().copied() else {
                        return None;
                    };
                    value = match op {
                        BinOp::Multiply => mul_fixed(value, rhs)?,
                        BinOp::Divide => div_fixed(value, rhs)?,
                        _ => return None,
                    };
                }
                Some(ExprToken::Op(op)) => {
                    iter.next();
                    values.push(value);
                    pending.push(*op);
                    break;
                }
                Some(ExprToken::Number(_)) => return None,
                None => {
                    values.push(value);
                    break;
                }
            }
        }
    }

    if values.len() != pending.len() + 1 {
        return None;
    }

    let mut result = values[0];
    for (op, value) in pending.iter().zip(values.iter().skip(1)) {
        result = match op {
            BinOp::Add => result.checked_add(*value)?,
            BinOp::Subtract => result.checked_sub(*value)?,
            _ => return None,
        };
    }
    Some(result)
}

fn mul_fixed(lhs: i128, rhs: i128) -> Option<i128> {
    Some(div_round_half_up(lhs.checked_mul(rhs)?, EVAL_SCALE))
}

fn div_fixed(lhs: i128, rhs: i128) -> Option<i128> {
    if rhs == 0 {
        return None;
    }
    Some(div_round_half_up(lhs.checked_mul(EVAL_SCALE)?, rhs))
}

fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let denominator = if denominator < 0 {
        // Normalize so the rounding bias is stable regardless of sign.
        return div_round_half_up(-numerator, -denominator);
    } else {
        denominator
    };
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    if remainder * 2 >= denominator {
        quotient + 1
    } else {
        quotient
    }
}

/// Formats a fixed-point value, trimming trailing fraction zeros.
fn format_fixed(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let whole = abs / EVAL_SCALE as u128;
    let frac = abs % EVAL_SCALE as u128;
    if frac == 0 {
        return format!("{sign}{whole}");
    }
    let frac = format!("{frac:08}");
    format!("{sign}{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_keys(pad: &mut Keypad, keys: &[Key]) {
        for key in keys {
            pad.press(*key);
        }
    }

    #[test]
    fn digits_and_equals_with_precedence() {
        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[
                Key::Digit(2),
                Key::Op(BinOp::Add),
                Key::Digit(3),
                Key::Op(BinOp::Multiply),
                Key::Digit(4),
                Key::Equals,
            ],
        );
        assert_eq!(pad.expression(), "14");
    }

    #[test]
    fn division_produces_decimals() {
        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[
                Key::Digit(1),
                Key::Digit(0),
                Key::Op(BinOp::Divide),
                Key::Digit(4),
                Key::Equals,
            ],
        );
        assert_eq!(pad.expression(), "2.5");
    }

    #[test]
    fn leading_operator_rejected_except_minus() {
        let mut pad = Keypad::new();
        pad.press(Key::Op(BinOp::Add));
        assert_eq!(pad.expression(), "");
        pad.press(Key::Op(BinOp::Subtract));
        assert_eq!(pad.expression(), "-");
        pad.press(Key::Op(BinOp::Multiply));
        assert_eq!(pad.expression(), "-");
        type_keys(&mut pad, &[Key::Digit(5), Key::Op(BinOp::Add), Key::Digit(2), Key::Equals]);
        assert_eq!(pad.expression(), "-3");
    }

    #[test]
    fn consecutive_operators_collapse() {
        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[Key::Digit(5), Key::Op(BinOp::Add), Key::Op(BinOp::Multiply)],
        );
        assert_eq!(pad.expression(), "5×");
    }

    #[test]
    fn one_point_per_operand() {
        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[Key::Digit(1), Key::Point, Key::Digit(5), Key::Point],
        );
        assert_eq!(pad.expression(), "1.5");
        type_keys(&mut pad, &[Key::Op(BinOp::Add), Key::Point, Key::Digit(5)]);
        assert_eq!(pad.expression(), "1.5+.5");
        pad.press(Key::Equals);
        assert_eq!(pad.expression(), "2");
    }

    #[test]
    fn backspace_on_empty_is_noop() {
        let mut pad = Keypad::new();
        pad.press(Key::Backspace);
        assert_eq!(pad.expression(), "");
        type_keys(&mut pad, &[Key::Digit(7), Key::Backspace, Key::Backspace]);
        assert_eq!(pad.expression(), "");
    }

    #[test]
    fn equals_is_noop_without_operator() {
        let mut pad = Keypad::new();
        type_keys(&mut pad, &[Key::Digit(5), Key::Op(BinOp::Add), Key::Digit(3), Key::Equals]);
        assert_eq!(pad.expression(), "8");
        // Already evaluated: pressing equals again must not change anything.
        pad.press(Key::Equals);
        assert_eq!(pad.expression(), "8");
    }

    #[test]
    fn failed_evaluation_keeps_expression() {
        let mut pad = Keypad::new();
        type_keys(&mut pad, &[Key::Digit(5), Key::Op(BinOp::Add), Key::Equals]);
        assert_eq!(pad.expression(), "5+");

        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[Key::Digit(5), Key::Op(BinOp::Divide), Key::Digit(0), Key::Equals],
        );
        assert_eq!(pad.expression(), "5÷0");
    }

    #[test]
    fn amount_conversion_rounds_to_currency() {
        let eur = Currency::try_from("EUR").unwrap();
        let mut pad = Keypad::new();
        type_keys(
            &mut pad,
            &[Key::Digit(1), Key::Digit(0), Key::Op(BinOp::Divide), Key::Digit(3)],
        );
        let amount = pad.amount_in(&eur).unwrap();
        assert_eq!(amount.minor(), 333);
    }

    #[test]
    fn minus_after_leading_minus_keeps_sign() {
        let mut pad = Keypad::new();
        pad.press(Key::Op(BinOp::Subtract));
        pad.press(Key::Op(BinOp::Subtract));
        assert_eq!(pad.expression(), "-");
    }
}
