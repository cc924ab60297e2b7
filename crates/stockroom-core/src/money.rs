//! # Money Module
//!
//! Provides the `Money` type plus the display formatting used across the
//! English, French and Arabic interfaces.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Adding prices as f64                                                   │
//! │                                                                         │
//! │  bought_price 0.1 + shipment_fees 0.2 = 0.30000000000000004  ❌         │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    10 + 20 = 30 cents, exactly                                          │
//! │                                                                         │
//! │  Floats only appear at the edge: `format_currency(1234.5, ...)`         │
//! │  converts once, rounding to the nearest cent.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locale Formatting
//! ```text
//! ┌──────────┬────────────────┬─────────────────────┬──────────────────────┐
//! │  Locale  │  Grouping      │  Decimal separator  │  Symbol position     │
//! ├──────────┼────────────────┼─────────────────────┼──────────────────────┤
//! │  en      │  1,234         │  .                  │  before  ($1,234.50) │
//! │  fr      │  1 234 (U+202F)│  ,                  │  after   (1 234,50 €)│
//! │  ar      │  1.234         │  ,                  │  after   (1.234,50 …)│
//! └──────────┴────────────────┴─────────────────────┴──────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::money::{Currency, Locale, Money};
//!
//! let price = Money::from_cents(123450);
//! assert_eq!(price.format(Currency::Usd, Locale::En), "$1,234.50");
//! assert_eq!(price.format(Currency::Eur, Locale::Fr), "1\u{202F}234,50\u{A0}€");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;

/// Narrow no-break space, used by French digit grouping.
const NARROW_NBSP: &str = "\u{202F}";

/// No-break space between an amount and its currency symbol.
const NBSP: char = '\u{A0}';

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents, centimes).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for corrections and refunds
/// - **No currency inside**: items carry their currency code separately,
///   the same way the rows store it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Wraps an amount already expressed in cents.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Note
    /// A negative amount carries its sign on `major` only.
    /// `from_major_minor(-5, 50)` = -5.50, not -4.50
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Converts a decimal amount to Money, rounding to the nearest cent.
    ///
    /// This is the only place a float enters the money path. It exists for
    /// display helpers that receive amounts the way a form field holds them.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(1234.5).cents(), 123450);
    /// assert_eq!(Money::from_decimal(0.125).cents(), 13);
    /// ```
    pub fn from_decimal(amount: f64) -> Self {
        Money((amount * 100.0).round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// No money.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// True when the amount is exactly zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The amount without its sign.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Price times quantity, as for an order line.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Formats the amount for display in the given currency and locale.
    ///
    /// ## Examples
    /// ```text
    /// Money(123450).format(Usd, En)  →  "$1,234.50"
    /// Money(123450).format(Mad, Fr)  →  "1 234,50 MAD"
    /// Money(123450).format(Mad, Ar)  →  "1.234,50 د.م."
    /// Money(-550).format(Usd, En)    →  "-$5.50"
    /// ```
    pub fn format(&self, currency: Currency, locale: Locale) -> String {
        let style = currency_style(currency, locale);
        let number = format_minor_units(self.0.unsigned_abs(), 2, locale);
        assemble(self.is_negative(), &number, style.symbol, style.position, style.spaced)
    }
}

/// Display shows the bare decimal amount, without a currency.
///
/// ## Note
/// This is for logs and debugging. Use [`Money::format`] for the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Currencies the back office prices items in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
    /// Moroccan dirham.
    Mad,
}

impl Currency {
    /// All supported currencies, in the order settings screens list them.
    pub const ALL: [Currency; 4] = [Currency::Mad, Currency::Usd, Currency::Eur, Currency::Gbp];

    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Mad => "MAD",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Mad
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "MAD" => Ok(Currency::Mad),
            _ => Err(CoreError::UnsupportedCurrency(s.to_string())),
        }
    }
}

// =============================================================================
// Locale
// =============================================================================

/// Interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Fr,
    Ar,
}

impl Locale {
    /// Primary language subtag.
    pub const fn tag(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
            Locale::Ar => "ar",
        }
    }

    /// Arabic screens are laid out right-to-left.
    pub const fn is_rtl(&self) -> bool {
        matches!(self, Locale::Ar)
    }

    fn group_separator(&self) -> &'static str {
        match self {
            Locale::En => ",",
            Locale::Fr => NARROW_NBSP,
            Locale::Ar => ".",
        }
    }

    fn decimal_separator(&self) -> char {
        match self {
            Locale::En => '.',
            Locale::Fr | Locale::Ar => ',',
        }
    }

    fn default_position(&self) -> SymbolPosition {
        match self {
            Locale::En => SymbolPosition::Prefix,
            Locale::Fr | Locale::Ar => SymbolPosition::Suffix,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parses a language tag; region subtags are ignored (`fr-MA` → `Fr`).
impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match primary.as_str() {
            "en" => Ok(Locale::En),
            "fr" => Ok(Locale::Fr),
            "ar" => Ok(Locale::Ar),
            _ => Err(CoreError::UnsupportedLocale(s.to_string())),
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolPosition {
    Prefix,
    Suffix,
}

struct CurrencyStyle {
    symbol: &'static str,
    position: SymbolPosition,
    spaced: bool,
}

/// Symbol and placement for a currency/locale pairing.
fn currency_style(currency: Currency, locale: Locale) -> CurrencyStyle {
    use Currency::*;
    use Locale::*;

    let (symbol, position, spaced) = match (currency, locale) {
        (Usd, En) => ("$", SymbolPosition::Prefix, false),
        (Eur, En) => ("€", SymbolPosition::Prefix, false),
        (Gbp, En) => ("£", SymbolPosition::Prefix, false),
        (Mad, En) => ("MAD", SymbolPosition::Prefix, true),
        (Usd, Fr) => ("$US", SymbolPosition::Suffix, true),
        (Eur, Fr) => ("€", SymbolPosition::Suffix, true),
        (Gbp, Fr) => ("£GB", SymbolPosition::Suffix, true),
        (Mad, Fr) => ("MAD", SymbolPosition::Suffix, true),
        (Usd, Ar) => ("US$", SymbolPosition::Suffix, true),
        (Eur, Ar) => ("€", SymbolPosition::Suffix, true),
        (Gbp, Ar) => ("UK£", SymbolPosition::Suffix, true),
        (Mad, Ar) => ("د.م.", SymbolPosition::Suffix, true),
    };

    CurrencyStyle {
        symbol,
        position,
        spaced,
    }
}

fn assemble(
    negative: bool,
    number: &str,
    symbol: &str,
    position: SymbolPosition,
    spaced: bool,
) -> String {
    let sign = if negative { "-" } else { "" };
    let gap = if spaced { NBSP.to_string() } else { String::new() };

    match position {
        SymbolPosition::Prefix => format!("{sign}{symbol}{gap}{number}"),
        SymbolPosition::Suffix => format!("{sign}{number}{gap}{symbol}"),
    }
}

/// Inserts the locale's group separator every three digits.
fn group_digits(value: u64, separator: &str) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }

    out
}

/// Formats an unsigned amount expressed in `10^-decimals` units.
fn format_minor_units(units: u64, decimals: u32, locale: Locale) -> String {
    let scale = 10_u64.pow(decimals);
    let whole = group_digits(units / scale, locale.group_separator());

    if decimals == 0 {
        return whole;
    }

    format!(
        "{}{}{:0width$}",
        whole,
        locale.decimal_separator(),
        units % scale,
        width = decimals as usize
    )
}

/// Formats an amount with a currency for the given locale tag.
///
/// Unknown locales fall back to English. Unknown currency codes are shown
/// as their upper-cased code in the locale's default symbol position.
///
/// ## Example
/// ```rust
/// use stockroom_core::money::format_currency;
///
/// assert_eq!(format_currency(1234.5, "USD", "en"), "$1,234.50");
/// assert_eq!(format_currency(1234.5, "MAD", "fr"), "1\u{202F}234,50\u{A0}MAD");
/// ```
pub fn format_currency(amount: f64, currency: &str, locale: &str) -> String {
    let locale = locale.parse::<Locale>().unwrap_or_default();
    let money = Money::from_decimal(amount);

    match currency.parse::<Currency>() {
        Ok(currency) => money.format(currency, locale),
        Err(_) => {
            let code = currency.trim().to_ascii_uppercase();
            let number = format_minor_units(money.cents().unsigned_abs(), 2, locale);
            assemble(
                money.is_negative(),
                &number,
                &code,
                locale.default_position(),
                true,
            )
        }
    }
}

/// Formats a plain number with locale grouping and a fixed number of decimals.
///
/// ## Example
/// ```rust
/// use stockroom_core::money::format_number;
///
/// assert_eq!(format_number(1234567.891, "en", 2), "1,234,567.89");
/// assert_eq!(format_number(42.0, "ar", 0), "42");
/// ```
pub fn format_number(value: f64, locale: &str, decimals: u32) -> String {
    let locale = locale.parse::<Locale>().unwrap_or_default();
    let scale = 10_f64.powi(decimals as i32);
    let units = (value.abs() * scale).round() as u64;
    let number = format_minor_units(units, decimals, locale);

    if value < 0.0 && units > 0 {
        format!("-{number}")
    } else {
        number
    }
}

/// Formats a date the way each interface language writes it.
///
/// - en: `MM/DD/YYYY`
/// - fr, ar: `DD/MM/YYYY`
pub fn format_date(date: DateTime<Utc>, locale: Locale) -> String {
    match locale {
        Locale::En => date.format("%m/%d/%Y").to_string(),
        Locale::Fr | Locale::Ar => date.format("%d/%m/%Y").to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
    }

    #[test]
    fn test_major_minor_construction() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3_i64).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_currency_symbols_do_not_cross() {
        let mad_fr = format_currency(1234.5, "MAD", "fr");
        let usd_en = format_currency(1234.5, "USD", "en");

        assert_eq!(mad_fr, "1\u{202F}234,50\u{A0}MAD");
        assert_eq!(usd_en, "$1,234.50");
        assert!(!mad_fr.contains('$'));
        assert!(!usd_en.contains("MAD"));
    }

    #[test]
    fn test_format_arabic() {
        assert_eq!(
            format_currency(1234.5, "MAD", "ar"),
            "1.234,50\u{A0}د.م."
        );
        assert_eq!(format_currency(1234.5, "USD", "ar-MA"), "1.234,50\u{A0}US$");
    }

    #[test]
    fn test_format_negative_and_small() {
        assert_eq!(format_currency(-5.5, "USD", "en"), "-$5.50");
        assert_eq!(format_currency(0.07, "EUR", "fr"), "0,07\u{A0}€");
        assert_eq!(format_currency(999.0, "GBP", "en"), "£999.00");
    }

    #[test]
    fn test_format_unknown_inputs_fall_back() {
        assert_eq!(format_currency(10.0, "USD", "de"), "$10.00");
        assert_eq!(format_currency(10.0, "jpy", "en"), "JPY\u{A0}10.00");
        assert_eq!(format_currency(10.0, "jpy", "fr"), "10,00\u{A0}JPY");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0, ","), "0");
        assert_eq!(group_digits(999, ","), "999");
        assert_eq!(group_digits(1000, ","), "1,000");
        assert_eq!(group_digits(1234567, "."), "1.234.567");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, "en", 2), "1,234,567.89");
        assert_eq!(format_number(1234.0, "fr", 0), "1\u{202F}234");
        assert_eq!(format_number(-0.001, "en", 2), "0.00");
        assert_eq!(format_number(-12.5, "en", 1), "-12.5");
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!("fr-FR".parse::<Locale>().unwrap(), Locale::Fr);
        assert_eq!("AR_ma".parse::<Locale>().unwrap(), Locale::Ar);
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert!("es".parse::<Locale>().is_err());
        assert!(Locale::Ar.is_rtl());
        assert!(!Locale::Fr.is_rtl());
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("mad".parse::<Currency>().unwrap(), Currency::Mad);
        assert_eq!(" USD ".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(format_date(date, Locale::En), "03/07/2024");
        assert_eq!(format_date(date, Locale::Fr), "07/03/2024");
    }
}
