//! Database dialect selection.
//!
//! A [`DialectSet`] chooses which dialect-specific detection patterns are
//! compiled into a [`PatternSet`](crate::detect::patterns::PatternSet). It is
//! a small `Copy` value type with the usual set algebra, so it can key caches
//! and be built from configuration (`["mssql", "mysql"]` or `"all"`).

use std::fmt;
use std::ops::{BitAnd, BitOr, Not, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SqlFirewallError;

/// A database or query-language family whose catalog names and operator
/// syntax shape which detection patterns apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    /// Microsoft SQL Server.
    MsSql = 0,
    /// MySQL / MariaDB.
    MySql = 1,
    /// PostgreSQL.
    PgSql = 2,
    /// Oracle Database.
    Oracle = 3,
    /// IBM Db2.
    Db2 = 4,
    /// Document stores with JavaScript-style query operators (MongoDB).
    NoSql = 5,
}

impl Dialect {
    /// Every dialect, in pattern-emission order.
    pub const ALL: [Dialect; 6] = [
        Dialect::MsSql,
        Dialect::MySql,
        Dialect::PgSql,
        Dialect::Oracle,
        Dialect::Db2,
        Dialect::NoSql,
    ];

    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::MsSql => "mssql",
            Dialect::MySql => "mysql",
            Dialect::PgSql => "pgsql",
            Dialect::Oracle => "oracle",
            Dialect::Db2 => "db2",
            Dialect::NoSql => "nosql",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqlFirewallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Dialect::PgSql),
            "oracle" => Ok(Dialect::Oracle),
            "db2" => Ok(Dialect::Db2),
            "nosql" | "mongodb" => Ok(Dialect::NoSql),
            _ => Err(SqlFirewallError::InvalidDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = SqlFirewallError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(d: Dialect) -> Self {
        d.name().to_string()
    }
}

/// An immutable set of enabled [`Dialect`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "DialectSpec", into = "Vec<Dialect>")]
pub struct DialectSet {
    bits: u8,
}

const ALL_BITS: u8 = 0b0011_1111;

impl DialectSet {
    /// The set with no dialects enabled; only the baseline patterns apply.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every supported dialect.
    pub const fn all() -> Self {
        Self { bits: ALL_BITS }
    }

    /// A set holding exactly one dialect.
    pub fn only(dialect: Dialect) -> Self {
        Self { bits: dialect.bit() }
    }

    pub fn contains(self, dialect: Dialect) -> bool {
        self.bits & dialect.bit() != 0
    }

    pub fn with(self, dialect: Dialect) -> Self {
        Self {
            bits: self.bits | dialect.bit(),
        }
    }

    pub fn without(self, dialect: Dialect) -> Self {
        Self {
            bits: self.bits & !dialect.bit(),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    pub fn intersection(self, other: Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    pub fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Dialects not in this set, relative to [`DialectSet::all`].
    pub fn complement(self) -> Self {
        Self {
            bits: !self.bits & ALL_BITS,
        }
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterate the enabled dialects in [`Dialect::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = Dialect> {
        Dialect::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl From<Dialect> for DialectSet {
    fn from(d: Dialect) -> Self {
        Self::only(d)
    }
}

impl FromIterator<Dialect> for DialectSet {
    fn from_iter<I: IntoIterator<Item = Dialect>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), DialectSet::with)
    }
}

impl From<DialectSet> for Vec<Dialect> {
    fn from(set: DialectSet) -> Self {
        set.iter().collect()
    }
}

impl BitOr for DialectSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<Dialect> for DialectSet {
    type Output = Self;
    fn bitor(self, rhs: Dialect) -> Self {
        self.with(rhs)
    }
}

impl BitOr for Dialect {
    type Output = DialectSet;
    fn bitor(self, rhs: Self) -> DialectSet {
        DialectSet::only(self).with(rhs)
    }
}

impl BitAnd for DialectSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Sub for DialectSet {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl Not for DialectSet {
    type Output = Self;
    fn not(self) -> Self {
        self.complement()
    }
}

impl fmt::Display for DialectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::all() {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Dialect::name).collect();
        f.write_str(&names.join(","))
    }
}

/// Parses `"all"`, `"none"`, or a comma-separated list such as `"mssql,mysql"`.
impl FromStr for DialectSet {
    type Err = SqlFirewallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::empty());
        }
        trimmed
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<Dialect>)
            .collect()
    }
}

/// Configuration shape accepted for a dialect set.
#[derive(Deserialize)]
#[serde(untagged)]
enum DialectSpec {
    Named(String),
    List(Vec<Dialect>),
}

impl TryFrom<DialectSpec> for DialectSet {
    type Error = SqlFirewallError;

    fn try_from(spec: DialectSpec) -> Result<Self, Self::Error> {
        match spec {
            DialectSpec::Named(s) => s.parse(),
            DialectSpec::List(list) => Ok(list.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_dialect() {
        let all = DialectSet::all();
        for d in Dialect::ALL {
            assert!(all.contains(d), "{} missing from ALL", d);
        }
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn complement_excludes_selected() {
        let selected = DialectSet::only(Dialect::MsSql);
        let excluded = !selected;
        assert!(!excluded.contains(Dialect::MsSql));
        assert!(excluded.contains(Dialect::NoSql));
        assert_eq!(excluded.len(), 5);
        assert_eq!(excluded | selected, DialectSet::all());
        assert!((excluded & selected).is_empty());
    }

    #[test]
    fn difference_removes_members() {
        let set = DialectSet::all() - (Dialect::Oracle | Dialect::Db2);
        assert!(!set.contains(Dialect::Oracle));
        assert!(!set.contains(Dialect::Db2));
        assert!(set.contains(Dialect::MySql));
    }

    #[test]
    fn empty_complement_is_all() {
        assert_eq!(DialectSet::empty().complement(), DialectSet::all());
        assert_eq!(DialectSet::all().complement(), DialectSet::empty());
    }

    #[test]
    fn iter_follows_fixed_order() {
        let set = Dialect::NoSql | Dialect::MsSql;
        let order: Vec<Dialect> = set.with(Dialect::PgSql).iter().collect();
        assert_eq!(order, vec![Dialect::MsSql, Dialect::PgSql, Dialect::NoSql]);
    }

    #[test]
    fn parses_comma_list_case_insensitive() {
        let set: DialectSet = "MsSQL, postgres".parse().unwrap();
        assert_eq!(set, Dialect::MsSql | Dialect::PgSql);
        assert_eq!("ALL".parse::<DialectSet>().unwrap(), DialectSet::all());
        assert!("".parse::<DialectSet>().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_dialect() {
        let err = "mssql,sybase".parse::<DialectSet>().unwrap_err();
        assert!(matches!(err, SqlFirewallError::InvalidDialect(ref name) if name == "sybase"));
    }

    #[test]
    fn display_round_trips() {
        let set = Dialect::MySql | Dialect::NoSql;
        assert_eq!(set.to_string(), "mysql,nosql");
        assert_eq!(set.to_string().parse::<DialectSet>().unwrap(), set);
        assert_eq!(DialectSet::all().to_string(), "all");
    }

    #[test]
    fn deserializes_from_list_or_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            dialects: DialectSet,
        }

        let w: Wrapper = toml::from_str(r#"dialects = ["mssql", "nosql"]"#).unwrap();
        assert_eq!(w.dialects, Dialect::MsSql | Dialect::NoSql);

        let w: Wrapper = toml::from_str(r#"dialects = "all""#).unwrap();
        assert_eq!(w.dialects, DialectSet::all());

        assert!(toml::from_str::<Wrapper>(r#"dialects = ["informix"]"#).is_err());
    }
}
