use crate::runtime::error::HostError;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric0, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::fmt;
use std::str::FromStr;

pub const SYMBOL_PREFIX: &str = "prime__";
pub const DEFAULT_ENTRY_SYMBOL: &str = "prime__mainForHost_1_exposed_generic";

/// Calling convention encoded in the symbol's suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolFlavor {
    /// `_exposed`: result returned by value.
    Direct,
    /// `_exposed_generic`: result written through an out-parameter.
    Generic,
    /// `_exposed_size`: returns the byte size of the output record.
    Size,
}

/// A module export of the form `prime__<name>_<id>_exposed[_generic|_size]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposedSymbol {
    pub name: String,
    pub id: u32,
    pub flavor: SymbolFlavor,
}

impl ExposedSymbol {
    pub fn parse(symbol: &str) -> Result<Self, HostError> {
        match all_consuming(exposed_symbol)(symbol) {
            Ok((_, parsed)) => Ok(parsed),
            Err(err) => Err(HostError::InvalidSymbol {
                symbol: symbol.to_string(),
                message: describe_error(symbol, err),
            }),
        }
    }

    pub fn with_flavor(&self, flavor: SymbolFlavor) -> Self {
        Self {
            flavor,
            ..self.clone()
        }
    }

    /// Checks that the host can call this symbol with an out-parameter.
    pub fn require_generic(&self) -> Result<(), HostError> {
        if self.flavor == SymbolFlavor::Generic {
            return Ok(());
        }
        Err(HostError::UnsupportedEntry {
            symbol: self.to_string(),
            suggestion: self.with_flavor(SymbolFlavor::Generic).to_string(),
        })
    }

    /// The companion export reporting the output record size, if the module
    /// provides one.
    pub fn size_symbol(&self) -> Self {
        self.with_flavor(SymbolFlavor::Size)
    }
}

impl Default for ExposedSymbol {
    fn default() -> Self {
        Self {
            name: "mainForHost".into(),
            id: 1,
            flavor: SymbolFlavor::Generic,
        }
    }
}

impl FromStr for ExposedSymbol {
    type Err = HostError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        Self::parse(symbol)
    }
}

impl fmt::Display for ExposedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.flavor {
            SymbolFlavor::Direct => "",
            SymbolFlavor::Generic => "_generic",
            SymbolFlavor::Size => "_size",
        };
        write!(f, "{SYMBOL_PREFIX}{}_{}_exposed{suffix}", self.name, self.id)
    }
}

fn exposed_symbol(input: &str) -> IResult<&str, ExposedSymbol> {
    let (input, _) = tag(SYMBOL_PREFIX)(input)?;
    let (input, (name, id)) = tuple((identifier, preceded(tag("_"), symbol_id)))(input)?;
    let (input, _) = tag("_exposed")(input)?;
    let (input, flavor) = flavor(input)?;
    Ok((
        input,
        ExposedSymbol {
            name: name.to_string(),
            id,
            flavor,
        },
    ))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(alpha1, alphanumeric0))(input)
}

fn symbol_id(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |digits: &str| digits.parse::<u32>())(input)
}

fn flavor(input: &str) -> IResult<&str, SymbolFlavor> {
    map(
        opt(alt((
            value(SymbolFlavor::Generic, tag("_generic")),
            value(SymbolFlavor::Size, tag("_size")),
        ))),
        |flavor| flavor.unwrap_or(SymbolFlavor::Direct),
    )(input)
}

fn describe_error(symbol: &str, err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = symbol.len() - e.input.len();
            if e.input.is_empty() {
                format!("unexpected end after `{symbol}`")
            } else {
                format!("unexpected `{}` at offset {offset}", e.input)
            }
        }
        nom::Err::Incomplete(_) => "incomplete symbol".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_entry() {
        let symbol = ExposedSymbol::parse(DEFAULT_ENTRY_SYMBOL).unwrap();
        assert_eq!(symbol, ExposedSymbol::default());
        assert_eq!(symbol.to_string(), DEFAULT_ENTRY_SYMBOL);
    }

    #[test]
    fn parses_each_flavor() {
        let direct: ExposedSymbol = "prime__render_12_exposed".parse().unwrap();
        assert_eq!(direct.flavor, SymbolFlavor::Direct);
        assert_eq!(direct.id, 12);
        let size: ExposedSymbol = "prime__render_12_exposed_size".parse().unwrap();
        assert_eq!(size.flavor, SymbolFlavor::Size);
        assert_eq!(size.name, "render");
    }

    #[test]
    fn size_symbol_keeps_name_and_id() {
        let entry = ExposedSymbol::default();
        assert_eq!(
            entry.size_symbol().to_string(),
            "prime__mainForHost_1_exposed_size"
        );
    }

    #[test]
    fn rejects_malformed_symbols() {
        for bad in [
            "main",
            "prime__mainForHost_exposed_generic",
            "prime__1main_1_exposed",
            "prime__mainForHost_1_exposed_generic_extra",
            "host__mainForHost_1_exposed_generic",
        ] {
            let err = ExposedSymbol::parse(bad).unwrap_err();
            assert!(
                matches!(err, HostError::InvalidSymbol { ref symbol, .. } if symbol == bad),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn error_points_at_trailing_input() {
        let err = ExposedSymbol::parse("prime__main_1_exposedX").unwrap_err();
        let HostError::InvalidSymbol { message, .. } = err else {
            panic!("unexpected error");
        };
        assert_eq!(message, "unexpected `X` at offset 21");
    }

    #[test]
    fn direct_flavor_suggests_generic() {
        let direct: ExposedSymbol = "prime__mainForHost_1_exposed".parse().unwrap();
        let err = direct.require_generic().unwrap_err();
        let HostError::UnsupportedEntry { suggestion, .. } = err else {
            panic!("unexpected error");
        };
        assert_eq!(suggestion, DEFAULT_ENTRY_SYMBOL);
        assert!(ExposedSymbol::default().require_generic().is_ok());
    }
}
