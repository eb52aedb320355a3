use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;

/// Tag names mapped to their values.
///
/// Insertion order is kept, but every rendering of a tag set sorts it first.
pub type Tags = IndexMap<String, String>;

/// Combines two tag sets, with values from `overrides` replacing duplicate keys.
pub(crate) fn combine(original: &Tags, overrides: &[(&str, &str)]) -> Tags {
    let mut combined = Tags::with_capacity(original.len() + overrides.len());
    combined.extend(original.iter().map(|(k, v)| (k.clone(), v.clone())));
    for (k, v) in overrides {
        combined.insert((*k).to_string(), (*v).to_string());
    }
    combined
}

/// Renders a tag set as `key:value` strings sorted ascending.
pub fn tags_to_strings(tags: &Tags) -> Vec<String> {
    let mut rendered: Vec<String> = tags.iter().map(|(k, v)| build_tag(k, v)).collect();
    rendered.sort();
    rendered
}

pub(crate) fn build_tag(key: &str, value: &str) -> String {
    let mut tag = String::with_capacity(key.len() + value.len() + 1);
    tag.push_str(key);
    tag.push(':');
    tag.push_str(value);
    tag
}

/// Returns whether an occurrence at the given sample rate should be emitted.
pub(crate) fn sampled(rate: f64) -> bool {
    rate >= 1.0 || rand::random::<f64>() < rate
}

/// Conversion of the numeric kinds accepted by the client API into a metric value.
///
/// Only integers, floats, and [`Duration`] (as nanoseconds) are metric values; anything
/// else is rejected at compile time.
pub trait ToFloat64 {
    fn to_f64(self) -> f64;

    /// The value as the caller wrote it, for query history and failure messages.
    fn describe(&self) -> String;
}

macro_rules! impl_to_float64 {
    ($($t:ty),*) => {
        $(
            impl ToFloat64 for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn describe(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_to_float64!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToFloat64 for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    fn describe(&self) -> String {
        CompactFloat(*self).to_string()
    }
}

impl ToFloat64 for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    // widening 4.3f32 directly would print 4.300000190734863
    fn describe(&self) -> String {
        let shortest = self.to_string().parse().unwrap_or(*self as f64);
        CompactFloat(shortest).to_string()
    }
}

impl ToFloat64 for Duration {
    #[inline]
    fn to_f64(self) -> f64 {
        self.as_nanos() as f64
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

impl<T: ToFloat64 + Copy> ToFloat64 for &T {
    #[inline]
    fn to_f64(self) -> f64 {
        (*self).to_f64()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Displays a float in its shortest form, switching to an exponent (`1e+06`, `1.5e-05`)
/// when the decimal exponent is below -4 or at least 6.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CompactFloat(pub f64);

impl fmt::Display for CompactFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("NaN");
        }
        if v.is_infinite() {
            return f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" });
        }
        if v == 0.0 {
            return write!(f, "{}", v);
        }

        // `{:e}` yields the shortest round-trip mantissa, e.g. `1.234567e6`
        let scientific = format!("{:e}", v);
        let Some((mantissa, exponent)) = scientific.split_once('e') else {
            return write!(f, "{}", v);
        };
        let Ok(exponent) = exponent.parse::<i32>() else {
            return write!(f, "{}", v);
        };

        if (-4..6).contains(&exponent) {
            write!(f, "{}", v)
        } else {
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(f, "{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
        }
    }
}

/// Returns the trimmed text of line `lineno` (1-based) in `path`, or an empty string if
/// the file or line can't be read.
pub(crate) fn source_line(path: &Path, lineno: usize) -> String {
    let Ok(file) = File::open(path) else {
        return String::new();
    };

    BufReader::new(file)
        .lines()
        .nth(lineno.saturating_sub(1))
        .and_then(Result::ok)
        .map(|line| line.trim_matches(|c| c == ' ' || c == '\t').to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        combine(&Tags::new(), pairs)
    }

    #[test]
    fn test_combine_overrides() {
        let base = tags(&[("tag1", "value1"), ("tag2", "value2")]);
        let combined = combine(&base, &[("tag1", "override"), ("tag3", "value3")]);

        assert_eq!(combined.len(), 3);
        assert_eq!(combined["tag1"], "override");
        assert_eq!(combined["tag2"], "value2");
        assert_eq!(combined["tag3"], "value3");
        // the original is untouched
        assert_eq!(base["tag1"], "value1");
    }

    #[test]
    fn test_combine_is_associative() {
        let a = [("x", "1"), ("y", "1")];
        let b = [("y", "2"), ("z", "2")];
        let c = [("z", "3"), ("x", "3")];

        let left = combine(&combine(&combine(&Tags::new(), &a), &b), &c);
        let bc = combine(&tags(&b), &c);
        let bc: Vec<(&str, &str)> = bc.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let right = combine(&tags(&a), &bc);

        assert_eq!(tags_to_strings(&left), tags_to_strings(&right));
        assert_eq!(tags_to_strings(&left), ["x:3", "y:2", "z:3"]);
    }

    #[test]
    fn test_tags_to_strings_sorted() {
        let tags = tags(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(tags_to_strings(&tags), ["a:1", "b:2", "c:3"]);
        assert!(tags_to_strings(&Tags::new()).is_empty());
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(5i64.to_f64(), 5.0);
        assert_eq!((-1i32).to_f64(), -1.0);
        assert_eq!(7u8.to_f64(), 7.0);
        assert_eq!(4.3f64.to_f64(), 4.3);
        assert_eq!(Duration::from_secs(3).to_f64(), 3_000_000_000.0);
        assert_eq!((&12u64).to_f64(), 12.0);
    }

    #[test]
    fn test_describe_keeps_input_kind() {
        assert_eq!(5i64.describe(), "5");
        assert_eq!(u64::MAX.describe(), "18446744073709551615");
        assert_eq!(4.3f64.describe(), "4.3");
        assert_eq!(4.3f32.describe(), "4.3");
        assert_eq!(1_000_000.0f64.describe(), "1e+06");
        assert_eq!(Duration::from_secs(3).describe(), "3s");
        assert_eq!(Duration::from_millis(1500).describe(), "1.5s");
        assert_eq!((&7u8).describe(), "7");
    }

    #[test]
    fn test_compact_float() {
        let cases: &[(f64, &str)] = &[
            (0.0, "0"),
            (5.0, "5"),
            (-1.0, "-1"),
            (4.3, "4.3"),
            (0.1, "0.1"),
            (0.0001, "0.0001"),
            (123456.0, "123456"),
            (1_000_000.0, "1e+06"),
            (1_234_567.0, "1.234567e+06"),
            (3_000_000_000.0, "3e+09"),
            (-2.5e10, "-2.5e+10"),
            (0.00001, "1e-05"),
            (0.000015, "1.5e-05"),
            (1e100, "1e+100"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "+Inf"),
            (f64::NEG_INFINITY, "-Inf"),
        ];
        for (value, expected) in cases {
            assert_eq!(CompactFloat(*value).to_string(), *expected, "for {:?}", value);
        }
    }

    #[test]
    fn test_sampled_bounds() {
        assert!(sampled(1.0));
        assert!(sampled(2.0));
        assert!(!sampled(0.0));
    }

    #[test]
    fn test_source_line() {
        let path = Path::new(file!());
        assert_eq!(source_line(path, 1), "use std::fmt;");
        assert_eq!(source_line(path, 1_000_000), "");
        assert_eq!(source_line(Path::new("does/not/exist.rs"), 1), "");
    }
}
