use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{space0, space1};
use nom::combinator::{map, opt, value};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::IResult;

use super::common::{pos_neg_num, var_name};
use super::errors::ParseError;
use crate::formula::{Comparison, Formula};

const KEYWORDS: &[&str] = &[
    "true",
    "false",
    "not",
    "and",
    "or",
    "implies",
    "next",
    "weaknext",
    "always",
    "eventually",
    "until",
    "release",
];

fn leaf(input: &str) -> IResult<&str, Formula> {
    let (rest, name) = var_name(input)?;

    let formula = match name.as_str() {
        "true" => Formula::True,
        "false" => Formula::False,
        keyword if KEYWORDS.contains(&keyword) => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
        _ => Formula::Predicate(name),
    };

    Ok((rest, formula))
}

fn comparison(input: &str) -> IResult<&str, Comparison> {
    let mut parser = alt((
        value(Comparison::LessOrEqual, tag("<=")),
        value(Comparison::GreaterOrEqual, tag(">=")),
        value(Comparison::Equal, tag("==")),
        value(Comparison::Less, tag("<")),
        value(Comparison::Greater, tag(">")),
    ));

    parser(input)
}

fn constraint(input: &str) -> IResult<&str, Formula> {
    let inner = nom::sequence::tuple((
        delimited(space0, var_name, space0),
        comparison,
        delimited(space0, pos_neg_num, space0),
    ));
    let mut parser = delimited(tag("{"), inner, tag("}"));
    let (rest, (variable, comparison, bound)) = parser(input)?;

    Ok((rest, Formula::constraint(variable, comparison, bound)))
}

fn operand_leaf(input: &str) -> IResult<&str, Formula> {
    alt((constraint, leaf))(input)
}

fn subformula(input: &str) -> IResult<&str, Formula> {
    let inner = delimited(space0, formula, space0);
    let mut parser = delimited(tag("("), inner, tag(")"));

    parser(input)
}

fn left_operand(input: &str) -> IResult<&str, Formula> {
    let p1 = terminated(operand_leaf, space1);
    let p2 = terminated(subformula, space0);
    let mut parser = alt((p1, p2));

    parser(input)
}

fn right_operand(input: &str) -> IResult<&str, Formula> {
    let p1 = preceded(space1, operand_leaf);
    let p2 = preceded(space0, subformula);
    let mut parser = alt((p1, p2));

    parser(input)
}

fn not(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("!"), tag("not")));
    let mut parser = map(preceded(ops, right_operand), Formula::not);

    parser(input)
}

fn and(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag(r"/\"), tag("&&"), tag("and")));
    let mut parser = separated_pair(left_operand, ops, right_operand);
    let (rest, (left, right)) = parser(input)?;

    Ok((rest, left.and(right)))
}

fn or(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag(r"\/"), tag("||"), tag("or")));
    let mut parser = separated_pair(left_operand, ops, right_operand);
    let (rest, (left, right)) = parser(input)?;

    Ok((rest, left.or(right)))
}

fn implies(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("->"), tag("implies")));
    let mut parser = separated_pair(left_operand, ops, right_operand);
    let (rest, (antecedent, consequent)) = parser(input)?;

    Ok((rest, antecedent.implies(consequent)))
}

fn until(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("U"), tag("until")));
    let mut parser = separated_pair(left_operand, ops, right_operand);
    let (rest, (left, right)) = parser(input)?;

    Ok((rest, left.until(right)))
}

fn release(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("R"), tag("release")));
    let mut parser = separated_pair(left_operand, ops, right_operand);
    let (rest, (left, right)) = parser(input)?;

    Ok((rest, left.release(right)))
}

fn next(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("X"), tag("()"), tag("next")));
    let mut parser = map(preceded(ops, right_operand), Formula::next);

    parser(input)
}

fn weak_next(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("W"), tag("weaknext")));
    let mut parser = map(preceded(ops, right_operand), Formula::weak_next);

    parser(input)
}

fn bounds(input: &str) -> IResult<&str, (f64, f64)> {
    let inner = separated_pair(
        delimited(space0, pos_neg_num, space0),
        tag(","),
        delimited(space0, pos_neg_num, space0),
    );
    let mut parser = delimited(tag("{"), inner, tag("}"));

    parser(input)
}

fn bound_variable(lower: f64, upper: f64) -> String {
    format!("time_{}_{}", lower, upper)
}

/// `[]{a,b} p` holds when every sample within the window satisfies `p`, so the window constraint
/// appears as an escape clause: outside of the window the disjunction is trivially satisfied.
fn bounded_always(bounds: Option<(f64, f64)>, subformula: Formula) -> Formula {
    match bounds {
        None => subformula.always(),
        Some((lower, upper)) => {
            let variable = bound_variable(lower, upper);
            let outside = Formula::constraint(variable.clone(), Comparison::Less, lower)
                .or(Formula::constraint(variable.clone(), Comparison::Greater, upper));

            Formula::freeze(variable, outside.or(subformula).always())
        }
    }
}

/// `<>{a,b} p` holds when some sample within the window satisfies `p`, so the window constraint
/// conjoins with the subformula: outside of the window the conjunction is trivially falsified.
fn bounded_eventually(bounds: Option<(f64, f64)>, subformula: Formula) -> Formula {
    match bounds {
        None => subformula.eventually(),
        Some((lower, upper)) => {
            let variable = bound_variable(lower, upper);
            let window = Formula::constraint(variable.clone(), Comparison::GreaterOrEqual, lower)
                .and(Formula::constraint(variable.clone(), Comparison::LessOrEqual, upper));

            Formula::freeze(variable, window.and(subformula).eventually())
        }
    }
}

fn always(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("[]"), tag("always"), tag("G")));
    let mut parser = pair(preceded(ops, opt(bounds)), right_operand);
    let (rest, (bounds, subformula)) = parser(input)?;

    Ok((rest, bounded_always(bounds, subformula)))
}

fn eventually(input: &str) -> IResult<&str, Formula> {
    let ops = alt((tag("<>"), tag("eventually"), tag("F")));
    let mut parser = pair(preceded(ops, opt(bounds)), right_operand);
    let (rest, (bounds, subformula)) = parser(input)?;

    Ok((rest, bounded_eventually(bounds, subformula)))
}

fn freeze(input: &str) -> IResult<&str, Formula> {
    let binder = preceded(pair(tag("@"), space0), var_name);
    let mut parser = pair(binder, right_operand);
    let (rest, (variable, subformula)) = parser(input)?;

    Ok((rest, Formula::freeze(variable, subformula)))
}

fn formula(input: &str) -> IResult<&str, Formula> {
    let mut parser = alt((
        next,
        weak_next,
        always,
        eventually,
        freeze,
        not,
        and,
        or,
        implies,
        until,
        release,
        subformula,
        constraint,
        leaf,
    ));

    parser(input)
}

pub fn parse_formula(input: &str) -> Result<Formula, ParseError> {
    let mut parser = delimited(space0, formula, space0);

    match parser(input) {
        Ok((rest, parsed)) => {
            if rest.is_empty() {
                Ok(parsed)
            } else {
                Err(ParseError::new(input, input.len() - rest.len()))
            }
        }
        Err(nom::Err::Error(error)) | Err(nom::Err::Failure(error)) => {
            Err(ParseError::new(input, input.len() - error.input.len()))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(input, input.len())),
    }
}
