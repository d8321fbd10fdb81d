use std::fmt;

use num_bigint::BigUint;
use serde::{Serialize, Serializer};

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Exact number of valid configurations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelCount(BigUint);

impl ModelCount {
    pub fn new(count: BigUint) -> Self {
        Self(count)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::ZERO
    }

    /// Render with at most `digits` significant digits.
    ///
    /// Numbers that fit are rendered exactly. Longer ones are rounded, e.g.
    /// `1.2346e105 (approx)` for `digits = 5`.
    pub fn to_scientific(&self, digits: usize) -> String {
        let digits = digits.max(1);
        let exact = self.0.to_string();
        if exact.len() <= digits {
            return exact;
        }

        let mut exponent = exact.len() - 1;
        let mut mantissa: Vec<u8> = exact.bytes().take(digits).map(|b| b - b'0').collect();
        if exact.as_bytes()[digits] >= b'5' {
            // Propagate the carry from the last kept digit.
            let mut i = digits;
            loop {
                if i == 0 {
                    mantissa.insert(0, 1);
                    mantissa.pop();
                    exponent += 1;
                    break;
                }
                i -= 1;
                if mantissa[i] == 9 {
                    mantissa[i] = 0;
                } else {
                    mantissa[i] += 1;
                    break;
                }
            }
        }

        let mut s = String::with_capacity(digits + 24);
        s.push((b'0' + mantissa[0]) as char);
        if digits > 1 {
            s.push('.');
            s.extend(mantissa[1..].iter().map(|&d| (b'0' + d) as char));
        }
        s.push_str(&format!("e{} (approx)", exponent));
        s
    }
}

impl fmt::Display for ModelCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BigUint> for ModelCount {
    fn from(count: BigUint) -> Self {
        Self(count)
    }
}

impl Serialize for ModelCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

/// Size and model count of a built diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Nodes reachable from the root, terminal included.
    pub node_count: u64,
    pub model_count: ModelCount,
}

impl Metrics {
    pub fn compute(bdd: &Bdd, root: Ref) -> Self {
        Self {
            node_count: bdd.size(root),
            model_count: ModelCount(bdd.sat_count(root, bdd.num_vars())),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::Lit;

    fn count(s: &str) -> ModelCount {
        ModelCount::new(s.parse().unwrap())
    }

    #[test]
    fn test_metrics() {
        let bdd = Bdd::with_num_vars(3);
        let x1 = bdd.mk_lit(Lit::from_dimacs(1)).unwrap();
        let x2 = bdd.mk_lit(Lit::from_dimacs(2)).unwrap();
        let f = bdd.apply_xor(x1, x2).unwrap();

        let metrics = Metrics::compute(&bdd, f);
        assert_eq!(metrics.node_count, 3);
        assert_eq!(metrics.model_count, count("4"));
        assert_eq!(Metrics::compute(&bdd, f), metrics);
    }

    #[test]
    fn test_metrics_of_constants() {
        let bdd = Bdd::with_num_vars(10);

        let zero = Metrics::compute(&bdd, bdd.zero());
        assert_eq!(zero.node_count, 1);
        assert!(zero.model_count.is_zero());

        let one = Metrics::compute(&bdd, bdd.one());
        assert_eq!(one.model_count, count("1024"));
    }

    #[test]
    fn test_to_scientific() {
        assert_eq!(count("12345").to_scientific(5), "12345");
        assert_eq!(count("0").to_scientific(3), "0");
        assert_eq!(count("123456").to_scientific(5), "1.2346e5 (approx)");
        assert_eq!(count("123449").to_scientific(5), "1.2345e5 (approx)");
        assert_eq!(count("99999").to_scientific(3), "1.00e5 (approx)");
        assert_eq!(count("987").to_scientific(1), "1e3 (approx)");

        let big = BigUint::from(123456u32) * BigUint::from(10u32).pow(100);
        assert_eq!(ModelCount::new(big).to_scientific(5), "1.2346e105 (approx)");
    }

    #[test]
    fn test_serialize_as_string() {
        let metrics = Metrics {
            node_count: 7,
            model_count: count("340282366920938463463374607431768211456"),
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(
            json,
            r#"{"node_count":7,"model_count":"340282366920938463463374607431768211456"}"#
        );
    }
}
