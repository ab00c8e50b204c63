use std::fmt;
use std::ops::{Range, RangeInclusive};

use itertools::Itertools;

// values of these options are read by gnuplot only when quoted
const QUOTED_OPTIONS: &[&str] = &[
    "title",
    "output",
    "xlabel",
    "x2label",
    "ylabel",
    "y2label",
    "clabel",
    "cblabel",
    "zlabel",
    "rgb",
    "font",
    "background",
];

/// A single option value, as given to `set <key> <value>` or to a dataset clause.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// `[begin:end]`
    Range(Box<OptionValue>, Box<OptionValue>),
    Seq(Vec<OptionValue>),
    Map(Options),
}

impl OptionValue {
    pub fn range<A: Into<OptionValue>, B: Into<OptionValue>>(begin: A, end: B) -> Self {
        Self::Range(Box::new(begin.into()), Box::new(end.into()))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Everything except `false` enables an option.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(i) => Some(i as f64),
            Self::Float(f) => Some(f),
            _ => None,
        }
    }

    /// The first word of the value: the value itself for text, the first element for sequences.
    /// Used to read the terminal name out of `term: ("png", ...)`.
    pub fn head(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Seq(items) => items.first().and_then(Self::head),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Range(begin, end) => write!(f, "[{}:{}]", begin, end),
            Self::Seq(items) => {
                let separator = match items.first() {
                    Some(first) if first.is_numeric() => ",",
                    _ => " ",
                };
                let joined = items
                    .iter()
                    .map(|item| serialize(None, item))
                    .filter(|s| !s.is_empty())
                    .join(separator);
                f.write_str(&joined)
            }
            Self::Map(options) => {
                let joined = options
                    .iter()
                    .map(|(key, value)| serialize(Some(key), value))
                    .filter(|s| !s.is_empty())
                    .join(" ");
                f.write_str(&joined)
            }
        }
    }
}

/// Converts option keys into gnuplot keys: `style_data` becomes `style data`.
///
/// This lets one mapping hold several options that share the same first word
/// (`style_data` and `style_fill`).
pub fn string_key(key: &str) -> String {
    key.replace('_', " ")
}

/// Converts a (possibly nested) option into gnuplot syntax.
///
/// ```
/// use rsgnuplot::options::{serialize, OptionValue};
/// use rsgnuplot::options;
///
/// assert_eq!(serialize(Some("xrange"), &(0..=100).into()), "xrange [0:100]");
/// assert_eq!(
///     serialize(Some("term"), &("png", options! { size: [300, 300] }).into()),
///     "term png size 300,300"
/// );
/// assert_eq!(serialize(Some("multiplot"), &true.into()), "multiplot");
/// ```
pub fn serialize(key: Option<&str>, value: &OptionValue) -> String {
    if let OptionValue::Bool(enabled) = value {
        return match key {
            Some(key) if *enabled => string_key(key),
            _ => String::new(),
        };
    }

    let mut text = value.to_string();

    match key {
        Some(key) => {
            if QUOTED_OPTIONS.contains(&key) {
                text = format!("'{}'", text.replace('\'', "''"));
            }
            format!("{} {}", string_key(key), text)
        }
        None => text,
    }
}

/// Insertion-ordered option mapping.
///
/// Re-inserting an existing key keeps its position and replaces the value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Options {
    entries: Vec<(String, OptionValue)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<OptionValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<OptionValue> {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, old)) => Some(std::mem::replace(old, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn with<K: Into<String>, V: Into<OptionValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New mapping where the keys of `other` win.
    pub fn merge(&self, other: &Options) -> Options {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    pub fn merge_from(&mut self, other: &Options) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }

    pub fn without(&self, keys: &[&str]) -> Options {
        self.iter()
            .filter(|(key, _)| !keys.contains(key))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Splits into (matching, rest), both keeping their relative order.
    pub fn partition<F>(&self, mut predicate: F) -> (Options, Options)
    where
        F: FnMut(&str) -> bool,
    {
        let (matching, rest): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .cloned()
            .partition(|(key, _)| predicate(key));

        (Options { entries: matching }, Options { entries: rest })
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

impl<'a> IntoIterator for &'a Options {
    type Item = (&'a str, &'a OptionValue);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! int_option_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for OptionValue {
                fn from(i: $t) -> Self {
                    Self::Int(i as i64)
                }
            }
        )*
    };
}

int_option_value!(i8, i16, i32, i64, u8, u16, u32);

// above i64::MAX only a float can hold the value
macro_rules! wide_option_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for OptionValue {
                fn from(i: $t) -> Self {
                    i64::try_from(i).map_or(Self::Float(i as f64), Self::Int)
                }
            }
        )*
    };
}

wide_option_value!(u64, usize);

impl From<f32> for OptionValue {
    fn from(f: f32) -> Self {
        Self::Float(f as f64)
    }
}

impl From<f64> for OptionValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for OptionValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl<T: Into<OptionValue>> From<Range<T>> for OptionValue {
    fn from(r: Range<T>) -> Self {
        Self::range(r.start, r.end)
    }
}

impl<T: Into<OptionValue>> From<RangeInclusive<T>> for OptionValue {
    fn from(r: RangeInclusive<T>) -> Self {
        let (start, end) = r.into_inner();
        Self::range(start, end)
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(v: Vec<T>) -> Self {
        Self::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<OptionValue>, const N: usize> From<[T; N]> for OptionValue {
    fn from(a: [T; N]) -> Self {
        Self::Seq(a.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<OptionValue>, B: Into<OptionValue>> From<(A, B)> for OptionValue {
    fn from((a, b): (A, B)) -> Self {
        Self::Seq(vec![a.into(), b.into()])
    }
}

impl<A: Into<OptionValue>, B: Into<OptionValue>, C: Into<OptionValue>> From<(A, B, C)>
    for OptionValue
{
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Seq(vec![a.into(), b.into(), c.into()])
    }
}

impl From<Options> for OptionValue {
    fn from(o: Options) -> Self {
        Self::Map(o)
    }
}

/// Builds an [`Options`] mapping, keeping the written order.
///
/// ```
/// use rsgnuplot::options;
///
/// let opts = options! { title: "Sin", xrange: -10..=10, style_data: "lines" };
/// assert_eq!(opts.keys().collect::<Vec<_>>(), vec!["title", "xrange", "style_data"]);
/// ```
#[macro_export]
macro_rules! options {
    () => {
        $crate::options::Options::new()
    };
    ($($key:tt : $value:expr),+ $(,)?) => {{
        let mut options = $crate::options::Options::new();
        $(
            options.insert($crate::__option_key!($key), $value);
        )+
        options
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __option_key {
    ($key:ident) => {
        stringify!($key)
    };
    ($key:literal) => {
        $key
    };
}
