//! Physical units for flux and dispersion values.
//!
//! A [`Unit`] is a scale factor relative to SI plus a [`Dimension`] (exponents
//! over length, mass, time and counts). Two units convert into each other iff
//! their dimensions agree; spectral equivalencies (wavelength ↔ frequency)
//! are deliberately absent.
//!
//! Strings follow the astropy / FITS conventions seen in spectral files:
//!
//! ```text
//!   Jy   mJy   Angstrom   nm   um   Hz   keV
//!   erg / (s cm2 Angstrom)      erg s-1 cm-2 Hz-1
//!   1e-17 erg / (s cm**2 AA)    W m^-2 Hz^-1
//! ```

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unrecognised unit '{0}'")]
    Unknown(String),
    #[error("malformed unit expression '{expr}': {reason}")]
    Malformed { expr: String, reason: String },
    #[error("cannot convert '{from}' to '{to}'")]
    Incompatible { from: String, to: String },
    #[error("unsupported unit combination: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

/// Exponents over the base quantities (length, mass, time, counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension([i8; 4]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0, 0, 0, 0]);
    pub const LENGTH: Dimension = Dimension([1, 0, 0, 0]);
    pub const MASS: Dimension = Dimension([0, 1, 0, 0]);
    pub const TIME: Dimension = Dimension([0, 0, 1, 0]);
    pub const COUNT: Dimension = Dimension([0, 0, 0, 1]);

    const FREQUENCY: Dimension = Dimension([0, 0, -1, 0]);
    const WAVENUMBER: Dimension = Dimension([-1, 0, 0, 0]);
    const ENERGY: Dimension = Dimension([2, 1, -2, 0]);
    const POWER: Dimension = Dimension([2, 1, -3, 0]);
    /// Flux density per unit frequency (Jy, erg s-1 cm-2 Hz-1).
    const FLUX_DENSITY_NU: Dimension = Dimension([0, 1, -2, 0]);
    /// Flux density per unit wavelength (erg s-1 cm-2 Angstrom-1).
    const FLUX_DENSITY_LAMBDA: Dimension = Dimension([-1, 1, -3, 0]);
    const COUNT_RATE: Dimension = Dimension([0, 0, -1, 1]);

    /// `None` when an exponent leaves the `i8` range.
    fn checked_mul(self, other: Dimension) -> Option<Dimension> {
        let mut out = self.0;
        for (o, b) in out.iter_mut().zip(other.0) {
            *o = o.checked_add(b)?;
        }
        Some(Dimension(out))
    }

    fn checked_powi(self, n: i8) -> Option<Dimension> {
        let mut out = self.0;
        for e in &mut out {
            *e = e.checked_mul(n)?;
        }
        Some(Dimension(out))
    }
}

/// Coarse classification used by column heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Dimensionless,
    /// Length, frequency, energy or wavenumber.
    SpectralAxis,
    /// Flux density per unit frequency or per unit wavelength.
    FluxDensity,
    /// Counts or count rate.
    Counts,
    Other,
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// A parsed physical unit. Equality compares physical meaning, not spelling:
/// `"AA"` and `"Angstrom"` are equal, `"nm"` and `"Angstrom"` are not.
#[derive(Debug, Clone)]
pub struct Unit {
    symbol: String,
    scale: f64,
    dim: Dimension,
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim && (self.scale - other.scale).abs() <= 1e-12 * self.scale.abs()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::dimensionless()
    }
}

impl std::str::FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl Unit {
    pub fn dimensionless() -> Self {
        Unit {
            symbol: String::new(),
            scale: 1.0,
            dim: Dimension::NONE,
        }
    }

    pub fn jansky() -> Self {
        Unit {
            symbol: "Jy".to_string(),
            scale: 1e-26,
            dim: Dimension::FLUX_DENSITY_NU,
        }
    }

    pub fn angstrom() -> Self {
        Unit {
            symbol: "Angstrom".to_string(),
            scale: 1e-10,
            dim: Dimension::LENGTH,
        }
    }

    /// Parse a unit string. The empty string is the dimensionless unit.
    pub fn parse(s: &str) -> Result<Unit, UnitError> {
        let expr = s.trim();
        if expr.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            expr,
            tokens: &tokens,
            pos: 0,
        };
        let (scale, dim) = parser.expression()?;
        if parser.pos != tokens.len() {
            return Err(malformed(expr, "trailing tokens"));
        }
        Ok(Unit {
            symbol: expr.to_string(),
            scale,
            dim,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dim
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dim == Dimension::NONE
    }

    /// Factor `k` such that `x [self] == k·x [to]`.
    pub fn conversion_factor(&self, to: &Unit) -> Result<f64, UnitError> {
        if self.dim != to.dim {
            return Err(UnitError::Incompatible {
                from: self.symbol.clone(),
                to: to.symbol.clone(),
            });
        }
        Ok(self.scale / to.scale)
    }

    pub fn is_convertible(&self, to: &Unit) -> bool {
        self.dim == to.dim
    }

    pub fn physical_type(&self) -> PhysicalType {
        match self.dim {
            Dimension::NONE => PhysicalType::Dimensionless,
            Dimension::LENGTH | Dimension::FREQUENCY | Dimension::ENERGY | Dimension::WAVENUMBER => {
                PhysicalType::SpectralAxis
            }
            Dimension::FLUX_DENSITY_NU | Dimension::FLUX_DENSITY_LAMBDA => PhysicalType::FluxDensity,
            Dimension::COUNT | Dimension::COUNT_RATE => PhysicalType::Counts,
            _ => PhysicalType::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// An array of values tagged with a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub values: Vec<f64>,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(values: Vec<f64>, unit: Unit) -> Self {
        Quantity { values, unit }
    }

    /// Re-express the values in `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Quantity, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        let values = if factor == 1.0 {
            self.values.clone()
        } else {
            self.values.iter().map(|v| v * factor).collect()
        };
        Ok(Quantity {
            values,
            unit: unit.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Named units and prefixes
// ---------------------------------------------------------------------------

const ELECTRON_VOLT: f64 = 1.602_176_634e-19;

/// (name, SI scale, dimension, accepts SI prefix)
const NAMED_UNITS: &[(&str, f64, Dimension, bool)] = &[
    ("m", 1.0, Dimension::LENGTH, true),
    ("g", 1e-3, Dimension::MASS, true),
    ("s", 1.0, Dimension::TIME, true),
    ("Hz", 1.0, Dimension::FREQUENCY, true),
    ("J", 1.0, Dimension::ENERGY, true),
    ("W", 1.0, Dimension::POWER, true),
    ("eV", ELECTRON_VOLT, Dimension::ENERGY, true),
    ("Jy", 1e-26, Dimension::FLUX_DENSITY_NU, true),
    ("erg", 1e-7, Dimension::ENERGY, false),
    ("Angstrom", 1e-10, Dimension::LENGTH, false),
    ("angstrom", 1e-10, Dimension::LENGTH, false),
    ("AA", 1e-10, Dimension::LENGTH, false),
    ("Å", 1e-10, Dimension::LENGTH, false),
    ("micron", 1e-6, Dimension::LENGTH, false),
    ("ct", 1.0, Dimension::COUNT, false),
    ("count", 1.0, Dimension::COUNT, false),
    ("counts", 1.0, Dimension::COUNT, false),
    ("adu", 1.0, Dimension::COUNT, false),
    ("pix", 1.0, Dimension::NONE, false),
    ("pixel", 1.0, Dimension::NONE, false),
];

const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

fn lookup(name: &str) -> Option<(f64, Dimension)> {
    if let Some(&(_, scale, dim, _)) = NAMED_UNITS.iter().find(|(n, ..)| *n == name) {
        return Some((scale, dim));
    }
    for &(prefix, factor) in PREFIXES {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if let Some(&(_, scale, dim, _)) = NAMED_UNITS
            .iter()
            .find(|(n, _, _, prefixable)| *prefixable && *n == rest)
        {
            return Some((factor * scale, dim));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Expression parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Unit name with an optional attached exponent (`cm2`, `s-1`).
    Name(String, i8),
    Number(f64),
    Mul,
    Div,
    Pow,
    Open,
    Close,
}

fn malformed(expr: &str, reason: &str) -> UnitError {
    UnitError::Malformed {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_exponent(expr: &str, digits: &str) -> Result<i8, UnitError> {
    digits
        .parse::<i8>()
        .map_err(|_| malformed(expr, &format!("bad exponent '{digits}'")))
}

fn tokenize(expr: &str) -> Result<Vec<Token>, UnitError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Div);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Mul);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Mul);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    let exp_sign = (d == '-' || d == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| malformed(expr, &format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();

                // Attached exponent: cm2, s-1, cm+2.
                let exp_start = i;
                if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
                    i += 1;
                }
                let digits_start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let power = if i > digits_start {
                    let digits: String = chars[exp_start..i].iter().collect();
                    parse_exponent(expr, &digits)?
                } else {
                    i = exp_start;
                    1
                };
                tokens.push(Token::Name(name, power));
            }
            other => return Err(malformed(expr, &format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn in_range(&self, dim: Option<Dimension>) -> Result<Dimension, UnitError> {
        dim.ok_or_else(|| malformed(self.expr, "exponent out of range"))
    }

    fn expression(&mut self) -> Result<(f64, Dimension), UnitError> {
        let (mut scale, mut dim) = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Mul) => {
                    self.pos += 1;
                    let (s, d) = self.term()?;
                    scale *= s;
                    dim = self.in_range(dim.checked_mul(d))?;
                }
                Some(Token::Div) => {
                    self.pos += 1;
                    let (s, d) = self.term()?;
                    scale /= s;
                    dim = self.in_range(d.checked_powi(-1).and_then(|d| dim.checked_mul(d)))?;
                }
                Some(Token::Name(..)) | Some(Token::Number(_)) | Some(Token::Open) => {
                    let (s, d) = self.term()?;
                    scale *= s;
                    dim = self.in_range(dim.checked_mul(d))?;
                }
                _ => break,
            }
        }
        Ok((scale, dim))
    }

    fn term(&mut self) -> Result<(f64, Dimension), UnitError> {
        let (scale, dim) = self.factor()?;
        if self.peek() != Some(&Token::Pow) {
            return Ok((scale, dim));
        }
        self.pos += 1;
        let power = self.power()?;
        Ok((scale.powi(power as i32), self.in_range(dim.checked_powi(power))?))
    }

    /// Exponent after `**` or `^`, optionally parenthesised.
    fn power(&mut self) -> Result<i8, UnitError> {
        let parenthesised = self.peek() == Some(&Token::Open);
        if parenthesised {
            self.pos += 1;
        }
        let power = match self.tokens.get(self.pos) {
            Some(Token::Number(n)) if n.fract() == 0.0 && n.abs() <= i8::MAX as f64 => *n as i8,
            _ => return Err(malformed(self.expr, "expected integer exponent")),
        };
        self.pos += 1;
        if parenthesised {
            if self.peek() != Some(&Token::Close) {
                return Err(malformed(self.expr, "unclosed exponent"));
            }
            self.pos += 1;
        }
        Ok(power)
    }

    fn factor(&mut self) -> Result<(f64, Dimension), UnitError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| malformed(self.expr, "unexpected end"))?;
        self.pos += 1;
        match token {
            Token::Name(name, power) => {
                let (scale, dim) =
                    lookup(&name).ok_or_else(|| UnitError::Unknown(name.clone()))?;
                Ok((scale.powi(power as i32), self.in_range(dim.checked_powi(power))?))
            }
            Token::Number(n) => Ok((n, Dimension::NONE)),
            Token::Open => {
                let inner = self.expression()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(malformed(self.expr, "unbalanced parentheses"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(malformed(self.expr, "expected a unit")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1e-300)
    }

    #[test]
    fn test_empty_is_dimensionless() {
        let u = Unit::parse("  ").unwrap();
        assert!(u.is_dimensionless());
        assert_eq!(u, Unit::dimensionless());
    }

    #[test]
    fn test_prefixed_units() {
        let mjy = Unit::parse("mJy").unwrap();
        assert!(close(mjy.conversion_factor(&Unit::jansky()).unwrap(), 1e-3));

        let nm = Unit::parse("nm").unwrap();
        assert!(close(nm.conversion_factor(&Unit::angstrom()).unwrap(), 10.0));

        let um = Unit::parse("um").unwrap();
        assert_eq!(um, Unit::parse("micron").unwrap());
    }

    #[test]
    fn test_angstrom_aliases_are_equal() {
        assert_eq!(Unit::parse("AA").unwrap(), Unit::angstrom());
        assert_eq!(Unit::parse("angstrom").unwrap(), Unit::angstrom());
    }

    #[test]
    fn test_composite_flux_density() {
        let cgs = Unit::parse("erg / (s cm2 Hz)").unwrap();
        // 1 erg s-1 cm-2 Hz-1 == 1e23 Jy
        assert!(close(cgs.conversion_factor(&Unit::jansky()).unwrap(), 1e23));

        let fits_style = Unit::parse("erg s-1 cm-2 Hz-1").unwrap();
        assert_eq!(cgs, fits_style);

        let si = Unit::parse("W m^-2 Hz^-1").unwrap();
        assert!(close(si.conversion_factor(&Unit::jansky()).unwrap(), 1e26));
    }

    #[test]
    fn test_scaled_flux_lambda() {
        let sdss = Unit::parse("1e-17 erg / (s cm**2 Angstrom)").unwrap();
        let plain = Unit::parse("erg/s/cm2/Angstrom").unwrap();
        assert!(close(sdss.conversion_factor(&plain).unwrap(), 1e-17));
        assert_eq!(sdss.physical_type(), PhysicalType::FluxDensity);
    }

    #[test]
    fn test_physical_types() {
        assert_eq!(Unit::parse("nm").unwrap().physical_type(), PhysicalType::SpectralAxis);
        assert_eq!(Unit::parse("GHz").unwrap().physical_type(), PhysicalType::SpectralAxis);
        assert_eq!(Unit::parse("keV").unwrap().physical_type(), PhysicalType::SpectralAxis);
        assert_eq!(Unit::parse("cm-1").unwrap().physical_type(), PhysicalType::SpectralAxis);
        assert_eq!(Unit::parse("Jy").unwrap().physical_type(), PhysicalType::FluxDensity);
        assert_eq!(Unit::parse("ct / s").unwrap().physical_type(), PhysicalType::Counts);
        assert_eq!(Unit::parse("kg").unwrap().physical_type(), PhysicalType::Other);
    }

    #[test]
    fn test_incompatible_conversion() {
        let err = Unit::jansky().conversion_factor(&Unit::angstrom()).unwrap_err();
        assert!(matches!(err, UnitError::Incompatible { .. }));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(
            Unit::parse("furlong").unwrap_err(),
            UnitError::Unknown("furlong".to_string())
        );
        assert!(matches!(
            Unit::parse("erg / (s cm2").unwrap_err(),
            UnitError::Malformed { .. }
        ));
    }

    #[test]
    fn test_exponent_overflow_is_malformed() {
        for expr in ["m100 m100", "(cm2)**100", "m-100 / m100", "(m100)^(2)"] {
            assert!(
                matches!(Unit::parse(expr), Err(UnitError::Malformed { .. })),
                "{expr}"
            );
        }
        let big = Unit::parse("m100 m27").unwrap();
        assert_eq!(big.physical_type(), PhysicalType::Other);
    }

    #[test]
    fn test_display_keeps_spelling() {
        assert_eq!(Unit::parse("AA").unwrap().to_string(), "AA");
    }

    #[test]
    fn test_quantity_to() {
        let q = Quantity::new(vec![1.0, 2.5], Unit::jansky());
        let mjy = Unit::parse("mJy").unwrap();
        let converted = q.to(&mjy).unwrap();
        assert!(close(converted.values[0], 1000.0));
        assert!(close(converted.values[1], 2500.0));
        assert_eq!(converted.unit.symbol(), "mJy");
    }
}
