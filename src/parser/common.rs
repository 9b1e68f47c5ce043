use std::str::FromStr;

use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric0, digit1};
use nom::combinator::{map_res, opt, recognize};
use nom::sequence::pair;
use nom::IResult;

/// An identifier: a letter followed by letters, digits or underscores.
pub fn var_name(input: &str) -> IResult<&str, String> {
    let tail = recognize(pair(alphanumeric0, opt(pair(tag("_"), alphanumeric0))));
    let mut parser = pair(alpha1, tail);
    let (rest, (head, tail)) = parser(input)?;

    Ok((rest, head.to_string() + tail))
}

pub fn pos_num(input: &str) -> IResult<&str, f64> {
    let make_number = |(front, back): (&str, Option<&str>)| {
        let num_str = front.to_string() + back.unwrap_or("");
        f64::from_str(&num_str)
    };

    let back_parser = pair(tag("."), digit1);
    let num_parser = pair(digit1, opt(recognize(back_parser)));
    let mut parser = map_res(num_parser, make_number);

    parser(input)
}

pub fn pos_neg_num(input: &str) -> IResult<&str, f64> {
    let mut parser = pair(opt(tag("-")), pos_num);
    let (rest, (sign, num)) = parser(input)?;
    let signed_num = match sign {
        Some(_) => -num,
        None => num,
    };

    Ok((rest, signed_num))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{pos_neg_num, var_name};

    #[test]
    fn parse_var_name() -> Result<(), Box<dyn Error>> {
        let (rest, name) = var_name("speed2 <= 3")?;

        assert_eq!(rest, " <= 3");
        assert_eq!(name, "speed2");

        let (rest, name) = var_name("Var_t)")?;

        assert_eq!(rest, ")");
        assert_eq!(name, "Var_t");

        Ok(())
    }

    #[test]
    fn parse_pos_neg_number() -> Result<(), Box<dyn Error>> {
        let (rest, value) = pos_neg_num("24.77")?;

        assert_eq!(rest, "");
        assert_eq!(value, 24.77);

        let (rest, value) = pos_neg_num("-24.77")?;

        assert_eq!(rest, "");
        assert_eq!(value, -24.77);

        Ok(())
    }
}
